use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use oddslab::dataset;
use oddslab::integrity::{self, Manifest};
use oddslab::leagues;

const VALUE_FLAGS: &[&str] = &["--db", "--lock", "--verify"];

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let jobs = parse_jobs()?;
    if jobs.is_empty() {
        return Err(anyhow!(
            "usage: csv_ingest <league>=<fixtures.csv> [...] [--db PATH] [--lock MANIFEST] [--verify MANIFEST]"
        ));
    }

    let db_path = parse_path_arg("--db")
        .or_else(|| std::env::var("ODDSLAB_DB_PATH").ok().map(PathBuf::from))
        .or_else(dataset::default_db_path)
        .context("unable to resolve sqlite path")?;

    if let Some(manifest_path) = parse_path_arg("--verify") {
        verify_against_manifest(&manifest_path, &jobs)?;
        println!("Manifest check OK ({})", manifest_path.display());
    }

    let mut conn = dataset::open_db(&db_path)?;
    let summary = dataset::ingest_csv_files(&mut conn, db_path.clone(), &jobs)?;

    println!("Fixture ingest complete");
    println!("DB: {}", summary.db_path.display());
    println!("Files: {}", summary.files);
    println!(
        "Rows upserted: {} (skipped {})",
        summary.rows_upserted, summary.rows_skipped
    );

    let mut league_keys = summary.per_league.keys().copied().collect::<Vec<_>>();
    league_keys.sort_unstable();
    for league_id in league_keys {
        let Some(item) = summary.per_league.get(&league_id) else {
            continue;
        };
        println!(
            "{}: rows={} upserted={} skipped={} latest={}",
            leagues::league_name(league_id),
            item.rows_total,
            item.rows_upserted,
            item.rows_skipped,
            item.latest_date.as_deref().unwrap_or("n/a")
        );
        if !item.errors.is_empty() {
            println!("  errors: {}", item.errors.len());
            for err in item.errors.iter().take(6) {
                println!("   - {err}");
            }
        }
    }

    if let Some(manifest_path) = parse_path_arg("--lock") {
        let paths = jobs.iter().map(|(_, p)| p.clone()).collect::<Vec<_>>();
        let manifest = Manifest::from_files(&paths)?;
        manifest.save(&manifest_path)?;
        println!(
            "Locked {} source file(s) into {}",
            manifest.files.len(),
            manifest_path.display()
        );
    }

    Ok(())
}

/// Positional `<league>=<path>` pairs; the league part is an id or a slug.
fn parse_jobs() -> Result<Vec<(u32, PathBuf)>> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut jobs = Vec::new();
    let mut skip_next = false;

    for arg in &args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if VALUE_FLAGS.contains(&arg.as_str()) {
            skip_next = true;
            continue;
        }
        if arg.starts_with("--") {
            continue;
        }

        let Some((league_raw, path_raw)) = arg.split_once('=') else {
            return Err(anyhow!("expected <league>=<path>, got `{arg}`"));
        };
        let league_id = resolve_league(league_raw)
            .ok_or_else(|| anyhow!("unknown league `{league_raw}` in `{arg}`"))?;
        let path = PathBuf::from(path_raw.trim());
        if path_raw.trim().is_empty() {
            return Err(anyhow!("empty path in `{arg}`"));
        }
        jobs.push((league_id, path));
    }

    Ok(jobs)
}

fn resolve_league(raw: &str) -> Option<u32> {
    let trimmed = raw.trim();
    if let Ok(id) = trimmed.parse::<u32>() {
        return (id != 0).then_some(id);
    }
    leagues::league_by_slug(trimmed).map(|l| l.id)
}

fn verify_against_manifest(manifest_path: &PathBuf, jobs: &[(u32, PathBuf)]) -> Result<()> {
    let manifest = Manifest::load(manifest_path)?;
    let mut failures = Vec::new();

    for (_, path) in jobs {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            failures.push(format!("{}: unusable file name", path.display()));
            continue;
        };
        match manifest.files.get(name) {
            None => failures.push(format!("{name}: not in manifest")),
            Some(expected) => {
                let actual = integrity::file_sha256(path)?;
                if actual != *expected {
                    failures.push(format!("{name}: checksum changed"));
                }
            }
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        for failure in &failures {
            eprintln!("manifest mismatch - {failure}");
        }
        Err(anyhow!(
            "{} file(s) failed manifest verification",
            failures.len()
        ))
    }
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
