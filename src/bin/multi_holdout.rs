use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use rayon::prelude::*;

use oddslab::dataset::{self, StoredFixture};
use oddslab::holdout::{self, GateCriteria, HoldoutReport};
use oddslab::leagues;
use oddslab::metrics::Prob3;
use oddslab::predictions;
use oddslab::thresholds::{self, BetThresholds};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let league_ids = parse_league_ids_arg().unwrap_or_else(leagues::default_league_ids);
    if league_ids.is_empty() {
        return Err(anyhow!("no league ids resolved"));
    }

    let db_path = parse_path_arg("--db")
        .or_else(|| std::env::var("ODDSLAB_DB_PATH").ok().map(PathBuf::from))
        .or_else(dataset::default_db_path)
        .context("unable to resolve sqlite path")?;

    let apply = has_flag("--apply");
    let force_apply = has_flag("--force-apply");
    let predictions_dir = parse_path_arg("--predictions-dir");

    let conn = dataset::open_db(&db_path)?;

    let mut inputs: Vec<(u32, Vec<StoredFixture>, Vec<Prob3>)> = Vec::new();
    let mut skipped = Vec::new();
    for league_id in &league_ids {
        let fixtures = dataset::load_settled_fixtures(&conn, *league_id)?;
        if fixtures.len() < 2 {
            skipped.push(*league_id);
            continue;
        }
        let probs = league_predictions(*league_id, &fixtures, predictions_dir.as_deref())?;
        inputs.push((*league_id, fixtures, probs));
    }
    drop(conn);

    if inputs.is_empty() {
        return Err(anyhow!(
            "no league has enough settled fixtures in {}",
            db_path.display()
        ));
    }

    let gate = GateCriteria::default();
    let outcomes: Vec<Result<HoldoutReport>> = inputs
        .par_iter()
        .map(|(league_id, fixtures, probs)| {
            let t = thresholds::thresholds_for(*league_id).clamped();
            holdout::run_holdout(*league_id, fixtures, probs, t, gate)
        })
        .collect();

    let mut reports = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(report) => reports.push(report),
            Err(err) => println!("league run failed: {err:#}"),
        }
    }
    reports.sort_by_key(|r| r.league_id);

    println!(
        "{:<18} {:>7} {:>7} {:>5} {:>5} {:>6} {:>8} {:>9}  gate",
        "league", "samples", "holdout", "bets", "wins", "hit%", "roi%", "profit"
    );
    let mut total_bets = 0usize;
    let mut total_wins = 0usize;
    let mut total_staked = 0.0;
    let mut total_profit = 0.0;
    let mut passing = 0usize;

    for r in &reports {
        let s = &r.simulation.summary;
        println!(
            "{:<18} {:>7} {:>7} {:>5} {:>5} {:>6.1} {:>+8.2} {:>+9.2}  {}",
            leagues::league_name(r.league_id),
            r.samples,
            r.holdout_len,
            s.bets,
            s.wins,
            s.hit_rate * 100.0,
            s.roi * 100.0,
            s.net_profit,
            if r.gate_passed { "PASS" } else { "fail" }
        );
        total_bets += s.bets;
        total_wins += s.wins;
        total_staked += s.total_staked;
        total_profit += s.net_profit;
        if r.gate_passed {
            passing += 1;
        }
    }

    let total_roi = if total_staked > 0.0 {
        total_profit / total_staked
    } else {
        0.0
    };
    let total_hit = if total_bets > 0 {
        total_wins as f64 / total_bets as f64
    } else {
        0.0
    };
    println!(
        "{:<18} {:>7} {:>7} {:>5} {:>5} {:>6.1} {:>+8.2} {:>+9.2}  {}/{} pass",
        "TOTAL",
        reports.iter().map(|r| r.samples).sum::<usize>(),
        reports.iter().map(|r| r.holdout_len).sum::<usize>(),
        total_bets,
        total_wins,
        total_hit * 100.0,
        total_roi * 100.0,
        total_profit,
        passing,
        reports.len()
    );

    for league_id in &skipped {
        println!(
            "skipped {}: not enough settled fixtures",
            leagues::league_name(*league_id)
        );
    }

    if apply || force_apply {
        let mut cached = thresholds::load_cached_thresholds();
        let mut applied = 0usize;
        for r in &reports {
            if !r.gate_passed && !force_apply {
                continue;
            }
            cached.insert(
                r.league_id,
                BetThresholds {
                    sample_fixtures: r.samples,
                    ..r.thresholds
                },
            );
            applied += 1;
        }
        if applied > 0 {
            thresholds::save_cached_thresholds(&cached)?;
        }
        println!("Applied thresholds for {applied} league(s).");
    }

    Ok(())
}

/// `<slug>.csv` in the predictions dir when present, implied-odds baseline
/// otherwise.
fn league_predictions(
    league_id: u32,
    fixtures: &[StoredFixture],
    dir: Option<&std::path::Path>,
) -> Result<Vec<Prob3>> {
    if let Some(dir) = dir {
        let slug = leagues::league_by_id(league_id)
            .map(|l| l.slug.to_string())
            .unwrap_or_else(|| format!("league_{league_id}"));
        let path = dir.join(format!("{slug}.csv"));
        if path.exists() {
            let set = predictions::load_prediction_csv(&path)?;
            return set.aligned(fixtures);
        }
    }
    predictions::implied_prediction_set(fixtures).aligned(fixtures)
}

fn parse_league_ids_arg() -> Option<Vec<u32>> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix("--league-ids=") {
            let ids = leagues::parse_ids(raw);
            if !ids.is_empty() {
                return Some(ids);
            }
        }
        if arg == "--league-ids"
            && let Some(next) = args.get(idx + 1)
        {
            let ids = leagues::parse_ids(next);
            if !ids.is_empty() {
                return Some(ids);
            }
        }
    }
    None
}

fn parse_path_arg(name: &str) -> Option<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let prefix = format!("{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix(&prefix) {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        if arg == name {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(PathBuf::from(next));
            }
        }
    }
    None
}

fn has_flag(name: &str) -> bool {
    std::env::args().skip(1).any(|arg| arg == name)
}
