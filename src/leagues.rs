use std::collections::HashSet;

use once_cell::sync::Lazy;

/// One covered league. Ids follow the fixture feed the CSVs were exported
/// from; env overrides exist so a dataset with different ids still maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct League {
    pub id: u32,
    pub name: &'static str,
    pub slug: &'static str,
    env_key: &'static str,
}

pub static LEAGUES: Lazy<Vec<League>> = Lazy::new(|| {
    vec![
        League {
            id: 47,
            name: "Premier League",
            slug: "premier_league",
            env_key: "APP_LEAGUE_PREMIER_ID",
        },
        League {
            id: 87,
            name: "La Liga",
            slug: "la_liga",
            env_key: "APP_LEAGUE_LALIGA_ID",
        },
        League {
            id: 55,
            name: "Serie A",
            slug: "serie_a",
            env_key: "APP_LEAGUE_SERIE_A_ID",
        },
        League {
            id: 54,
            name: "Bundesliga",
            slug: "bundesliga",
            env_key: "APP_LEAGUE_BUNDESLIGA_ID",
        },
        League {
            id: 53,
            name: "Ligue 1",
            slug: "ligue1",
            env_key: "APP_LEAGUE_LIGUE1_ID",
        },
        League {
            id: 189,
            name: "Romania Liga 1",
            slug: "romania_liga1",
            env_key: "APP_LEAGUE_ROMANIA_ID",
        },
    ]
});

pub fn league_by_id(id: u32) -> Option<League> {
    configured_leagues().into_iter().find(|l| l.id == id)
}

pub fn league_by_slug(slug: &str) -> Option<League> {
    let want = slug.trim().to_ascii_lowercase();
    configured_leagues()
        .into_iter()
        .find(|l| l.slug == want || l.name.eq_ignore_ascii_case(&want))
}

pub fn league_name(id: u32) -> String {
    match league_by_id(id) {
        Some(l) => l.name.to_string(),
        None => format!("League {id}"),
    }
}

/// The registry with per-league env-var id overrides applied.
pub fn configured_leagues() -> Vec<League> {
    LEAGUES
        .iter()
        .map(|l| {
            let id = std::env::var(l.env_key)
                .ok()
                .and_then(|raw| raw.trim().parse::<u32>().ok())
                .filter(|id| *id != 0)
                .unwrap_or(l.id);
            League { id, ..*l }
        })
        .collect()
}

pub fn default_league_ids() -> Vec<u32> {
    dedup_ids(configured_leagues().iter().map(|l| l.id).collect())
}

pub fn parse_ids(raw: &str) -> Vec<u32> {
    let ids = raw
        .split([',', ';', ' '])
        .filter_map(|part| part.trim().parse::<u32>().ok())
        .filter(|id| *id != 0)
        .collect::<Vec<_>>();
    dedup_ids(ids)
}

pub fn dedup_ids(ids: Vec<u32>) -> Vec<u32> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for id in ids {
        if seen.insert(id) {
            out.push(id);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_six_leagues() {
        assert_eq!(LEAGUES.len(), 6);
        let ids = default_league_ids();
        assert_eq!(ids.len(), 6);
    }

    #[test]
    fn parse_ids_dedups_and_skips_zero() {
        assert_eq!(parse_ids("47, 87;47 0 189"), vec![47, 87, 189]);
        assert!(parse_ids("nope").is_empty());
    }

    #[test]
    fn slug_lookup_is_case_insensitive() {
        assert_eq!(league_by_slug("Premier_League").map(|l| l.id), Some(47));
        // Display names match too, case-insensitively.
        assert_eq!(league_by_slug("la liga").map(|l| l.id), Some(87));
        assert!(league_by_slug("serie_a").is_some());
        assert_eq!(league_by_slug("eredivisie"), None);
    }

    #[test]
    fn unknown_league_gets_numeric_name() {
        assert_eq!(league_name(9999), "League 9999");
    }
}
