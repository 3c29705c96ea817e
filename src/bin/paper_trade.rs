use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use oddslab::dataset::{self, StoredFixture};
use oddslab::leagues;
use oddslab::metrics::Prob3;
use oddslab::predictions;
use oddslab::report;
use oddslab::simulation;
use oddslab::thresholds;

const BOOTSTRAP_RESAMPLES: usize = 1000;
const BOOTSTRAP_SEED: u64 = 1912;

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

    let predictions_dir = parse_path_arg("--predictions-dir");
    let conn = dataset::open_db(&db_path)?;

    let mut all_records = Vec::new();
    let mut skipped = Vec::new();

    for league_id in &league_ids {
        let fixtures = dataset::load_settled_fixtures(&conn, *league_id)?;
        if fixtures.is_empty() {
            skipped.push(*league_id);
            continue;
        }
        let probs = league_predictions(*league_id, &fixtures, predictions_dir.as_deref())?;
        let t = thresholds::thresholds_for(*league_id).clamped();
        let result = simulation::simulate(&fixtures, &probs, &t)?;
        let s = &result.summary;

        println!("{}:", leagues::league_name(*league_id));
        println!(
            "  fixtures={} bets={} wins={} hit={:.1}%",
            s.fixtures,
            s.bets,
            s.wins,
            s.hit_rate * 100.0
        );
        println!(
            "  staked={:.2} profit={:+.2} roi={:+.2}%",
            s.total_staked,
            s.net_profit,
            s.roi * 100.0
        );
        if let Some((lo, hi)) = simulation::bootstrap_roi_interval(
            &result.records,
            BOOTSTRAP_RESAMPLES,
            BOOTSTRAP_SEED,
        ) {
            println!(
                "  roi 95% bootstrap interval: [{:+.2}%, {:+.2}%]",
                lo * 100.0,
                hi * 100.0
            );
        }
        println!(
            "  bankroll {:.2} -> {:.2} (max drawdown {:.2})",
            s.starting_bankroll, s.final_bankroll, s.max_drawdown
        );

        all_records.extend(result.records);
    }

    for league_id in &skipped {
        println!("skipped {}: no settled fixtures", leagues::league_name(*league_id));
    }

    if all_records.is_empty() {
        println!("No qualifying bets; ledger not written.");
        return Ok(());
    }

    let out = match parse_path_arg("--out") {
        Some(path) => path,
        None => {
            let dir = report::default_reports_dir().context("unable to resolve reports dir")?;
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("create reports dir {}", dir.display()))?;
            report::timestamped_path(&dir, "paper_ledger", "xlsx")
        }
    };
    report::export_ledger_xlsx(&out, &all_records)?;
    println!();
    println!("Ledger ({} bets): {}", all_records.len(), out.display());

    Ok(())
}

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
