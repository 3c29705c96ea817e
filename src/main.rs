use std::path::PathBuf;

use anyhow::{Context, Result};

use oddslab::dataset;
use oddslab::leagues;
use oddslab::report;
use oddslab::thresholds;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let db_path = parse_db_path_arg()
        .or_else(|| std::env::var("ODDSLAB_DB_PATH").ok().map(PathBuf::from))
        .or_else(dataset::default_db_path)
        .context("unable to resolve sqlite path")?;

    println!("oddslab status");
    println!("DB: {}", db_path.display());

    if !db_path.exists() {
        println!("No fixture store yet; run csv_ingest first.");
        return Ok(());
    }

    let conn = dataset::open_db(&db_path)?;
    let counts = dataset::count_fixtures_by_league(&conn)?;
    if counts.is_empty() {
        println!("Fixture store is empty.");
    } else {
        println!();
        println!("Fixtures:");
        for (league_id, count, latest) in &counts {
            println!(
                "  {:<18} {:>6} rows  latest={}",
                leagues::league_name(*league_id),
                count,
                latest.as_deref().unwrap_or("n/a")
            );
        }
    }

    let cached = thresholds::load_cached_thresholds();
    if !cached.is_empty() {
        let mut league_keys = cached.keys().copied().collect::<Vec<_>>();
        league_keys.sort_unstable();
        println!();
        println!("Cached bet thresholds:");
        for league_id in league_keys {
            let Some(t) = cached.get(&league_id) else {
                continue;
            };
            println!(
                "  {:<18} conf>={:.2} odds>={:.2} stake={:.2} (fitted on {} fixtures)",
                leagues::league_name(league_id),
                t.min_confidence,
                t.min_odds,
                t.stake,
                t.sample_fixtures
            );
        }
    }

    if let Some(dir) = report::default_reports_dir()
        && dir.exists()
    {
        let mut any = false;
        for league in leagues::configured_leagues() {
            let prefix = format!("{}_holdout", league.slug);
            if let Some(path) = report::latest_report(&dir, &prefix, "md") {
                if !any {
                    println!();
                    println!("Latest holdout reports:");
                    any = true;
                }
                println!("  {:<18} {}", league.name, path.display());
            }
        }
    }

    Ok(())
}

fn parse_db_path_arg() -> Option<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix("--db=") {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        if arg == "--db" {
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
