use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, anyhow};

use crate::dataset::{StoredFixture, split_csv_line};
use crate::metrics::Prob3;

/// A frozen model's per-fixture outcome probabilities, keyed by fixture id.
#[derive(Debug, Clone)]
pub struct PredictionSet {
    pub name: String,
    by_fixture: HashMap<u64, Prob3>,
}

impl PredictionSet {
    pub fn new(name: impl Into<String>, probs: HashMap<u64, Prob3>) -> Self {
        Self {
            name: name.into(),
            by_fixture: probs,
        }
    }

    pub fn len(&self) -> usize {
        self.by_fixture.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_fixture.is_empty()
    }

    pub fn get(&self, fixture_id: u64) -> Option<Prob3> {
        self.by_fixture.get(&fixture_id).copied()
    }

    /// Probabilities in fixture order; every fixture must be covered.
    pub fn aligned(&self, fixtures: &[StoredFixture]) -> Result<Vec<Prob3>> {
        let mut out = Vec::with_capacity(fixtures.len());
        let mut missing = 0usize;
        for f in fixtures {
            match self.get(f.fixture_id) {
                Some(p) => out.push(p),
                None => missing += 1,
            }
        }
        if missing > 0 {
            return Err(anyhow!(
                "prediction set `{}` missing {missing} of {} fixtures",
                self.name,
                fixtures.len()
            ));
        }
        Ok(out)
    }
}

pub fn load_prediction_csv(path: &Path) -> Result<PredictionSet> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read prediction csv {}", path.display()))?;
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("predictions")
        .to_string();
    parse_prediction_csv(&raw, name)
}

/// Parse a `fixture_id,p_home,p_draw,p_away` CSV. Triples are renormalized so
/// models that emit raw scores still align; rows that do not parse are fatal
/// because a frozen model file with holes cannot be validated.
pub fn parse_prediction_csv(raw: &str, name: impl Into<String>) -> Result<PredictionSet> {
    let mut lines = raw.lines().enumerate();
    let header = lines
        .next()
        .map(|(_, line)| line)
        .ok_or_else(|| anyhow!("prediction csv is empty"))?;

    let columns = split_csv_line(header)
        .into_iter()
        .map(|c| c.trim().to_ascii_lowercase())
        .collect::<Vec<_>>();
    let col = |name: &str| -> Result<usize> {
        columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| anyhow!("prediction csv missing column `{name}`"))
    };

    let idx_id = col("fixture_id")?;
    let idx_home = col("p_home")?;
    let idx_draw = col("p_draw")?;
    let idx_away = col("p_away")?;

    let mut by_fixture = HashMap::new();
    for (line_no, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        let cells = split_csv_line(line);
        let cell = |idx: usize| -> Result<&str> {
            cells
                .get(idx)
                .map(|s| s.trim())
                .ok_or_else(|| anyhow!("line {}: missing column {idx}", line_no + 1))
        };

        let fixture_id = cell(idx_id)?
            .parse::<u64>()
            .with_context(|| format!("line {}: bad fixture_id", line_no + 1))?;
        let parse_prob = |idx: usize, name: &str| -> Result<f64> {
            let v = cell(idx)?
                .parse::<f64>()
                .with_context(|| format!("line {}: bad {name}", line_no + 1))?;
            if !v.is_finite() || v < 0.0 {
                return Err(anyhow!("line {}: negative {name}", line_no + 1));
            }
            Ok(v)
        };

        let p = Prob3 {
            home: parse_prob(idx_home, "p_home")?,
            draw: parse_prob(idx_draw, "p_draw")?,
            away: parse_prob(idx_away, "p_away")?,
        };
        if p.sum() <= 1e-12 {
            return Err(anyhow!("line {}: all-zero probabilities", line_no + 1));
        }
        if by_fixture.insert(fixture_id, p.normalized()).is_some() {
            return Err(anyhow!(
                "line {}: duplicate fixture_id {fixture_id}",
                line_no + 1
            ));
        }
    }

    if by_fixture.is_empty() {
        return Err(anyhow!("prediction csv has no data rows"));
    }
    Ok(PredictionSet::new(name, by_fixture))
}

/// Bookmaker-implied probabilities as a baseline prediction set.
pub fn implied_prediction_set(fixtures: &[StoredFixture]) -> PredictionSet {
    let by_fixture = fixtures
        .iter()
        .map(|f| (f.fixture_id, f.odds().implied_probs()))
        .collect();
    PredictionSet::new("implied_odds", by_fixture)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(id: u64, date: &str) -> StoredFixture {
        StoredFixture {
            fixture_id: id,
            league_id: 47,
            date: date.to_string(),
            home_team: "H".to_string(),
            away_team: "A".to_string(),
            home_odds: 2.0,
            draw_odds: 3.4,
            away_odds: 3.9,
            outcome_code: Some(0),
        }
    }

    #[test]
    fn parse_prediction_csv_normalizes_rows() {
        let raw = "fixture_id,p_home,p_draw,p_away\n1,0.6,0.2,0.2\n2,6.0,2.0,2.0\n";
        let set = parse_prediction_csv(raw, "m1").unwrap();
        assert_eq!(set.len(), 2);
        let p = set.get(2).unwrap();
        assert!((p.home - 0.6).abs() < 1e-12);
        assert!((p.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn duplicate_fixture_ids_are_rejected() {
        let raw = "fixture_id,p_home,p_draw,p_away\n1,0.5,0.3,0.2\n1,0.4,0.3,0.3\n";
        assert!(parse_prediction_csv(raw, "m1").is_err());
    }

    #[test]
    fn aligned_requires_full_coverage() {
        let raw = "fixture_id,p_home,p_draw,p_away\n1,0.5,0.3,0.2\n";
        let set = parse_prediction_csv(raw, "m1").unwrap();
        let fixtures = vec![fixture(1, "2024-01-01"), fixture(2, "2024-01-02")];
        assert!(set.aligned(&fixtures).is_err());
        assert_eq!(set.aligned(&fixtures[..1]).unwrap().len(), 1);
    }

    #[test]
    fn implied_set_covers_all_fixtures() {
        let fixtures = vec![fixture(1, "2024-01-01"), fixture(2, "2024-01-02")];
        let set = implied_prediction_set(&fixtures);
        let probs = set.aligned(&fixtures).unwrap();
        assert_eq!(probs.len(), 2);
        assert!((probs[0].sum() - 1.0).abs() < 1e-9);
    }
}
