use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use oddslab::dataset;
use oddslab::ensemble;
use oddslab::holdout::{self, GateCriteria, HoldoutReport};
use oddslab::leagues;
use oddslab::metrics::{self, Metrics, Outcome, Prob3};
use oddslab::predictions;
use oddslab::report;
use oddslab::thresholds::{self, BetThresholds};

const DEFAULT_LEAGUE_ID: u32 = 47;
const DEFAULT_SWEEP_CONFIDENCES: [f64; 5] = [0.50, 0.55, 0.60, 0.65, 0.70];
const DEFAULT_SWEEP_ODDS: [f64; 4] = [1.30, 1.50, 1.80, 2.10];
const DEFAULT_SWEEP_TOP: usize = 8;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let league_id = parse_league_arg()?.unwrap_or(DEFAULT_LEAGUE_ID);

    let db_path = parse_path_arg("--db")
        .or_else(|| std::env::var("ODDSLAB_DB_PATH").ok().map(PathBuf::from))
        .or_else(dataset::default_db_path)
        .context("unable to resolve sqlite path")?;

    let apply = has_flag("--apply");
    let force_apply = has_flag("--force-apply");
    let sweep = has_flag("--sweep");
    let write_report = has_flag("--report");

    let conn = dataset::open_db(&db_path)?;
    let fixtures = dataset::load_settled_fixtures(&conn, league_id)?;
    if fixtures.len() < 2 {
        return Err(anyhow!(
            "league {league_id}: {} settled fixture(s) in {}; need at least 2",
            fixtures.len(),
            db_path.display()
        ));
    }

    let probs = resolve_predictions(&fixtures)?;

    let mut base = thresholds::thresholds_for(league_id);
    if let Some(v) = parse_f64_arg("--min-confidence") {
        base.min_confidence = v;
    }
    if let Some(v) = parse_f64_arg("--min-odds") {
        base.min_odds = v;
    }
    if let Some(v) = parse_f64_arg("--stake") {
        base.stake = v;
    }
    if let Some(v) = parse_f64_arg("--bankroll") {
        base.starting_bankroll = v;
    }
    let mut chosen = base.clamped();

    if sweep {
        let confidences = parse_f64_list_arg("--sweep-confidences")
            .unwrap_or_else(|| DEFAULT_SWEEP_CONFIDENCES.to_vec());
        let odds_floors =
            parse_f64_list_arg("--sweep-odds").unwrap_or_else(|| DEFAULT_SWEEP_ODDS.to_vec());
        let sweep_top = parse_usize_arg("--sweep-top")
            .unwrap_or(DEFAULT_SWEEP_TOP)
            .clamp(1, 100);

        let entries = holdout::sweep_thresholds(&fixtures, &probs, chosen, &confidences, &odds_floors)?;
        println!("Threshold sweep (train slice only):");
        for entry in entries.iter().take(sweep_top) {
            let s = &entry.train_summary;
            println!(
                "  conf>={:.2} odds>={:.2}: bets={} hit={:.1}% roi={:+.2}%",
                entry.thresholds.min_confidence,
                entry.thresholds.min_odds,
                s.bets,
                s.hit_rate * 100.0,
                s.roi * 100.0
            );
        }
        if let Some(best) = entries.first() {
            chosen = best.thresholds;
            println!(
                "Scoring holdout once with best train config conf>={:.2} odds>={:.2}",
                chosen.min_confidence, chosen.min_odds
            );
        }
        println!();
    }

    let result = holdout::run_holdout(
        league_id,
        &fixtures,
        &probs,
        chosen,
        GateCriteria::default(),
    )?;
    print_report(&fixtures, &result);

    if write_report {
        let dir = parse_path_arg("--report-dir")
            .or_else(report::default_reports_dir)
            .context("unable to resolve reports dir")?;
        let slug = league_slug(league_id);
        let (md, json) = report::write_report_files(&dir, &slug, &result)?;
        println!();
        println!("Report: {}", md.display());
        println!("Report: {}", json.display());
    }

    if apply || force_apply {
        apply_thresholds(&result, force_apply)?;
    }

    Ok(())
}

/// Probabilities aligned to the fixture list. With no `--predictions` file the
/// bookmaker-implied baseline is used; multiple files are blended.
fn resolve_predictions(fixtures: &[dataset::StoredFixture]) -> Result<Vec<Prob3>> {
    let paths = parse_multi_path_arg("--predictions");
    if paths.is_empty() {
        println!("No prediction files given; using implied-odds baseline as the model.");
        return predictions::implied_prediction_set(fixtures).aligned(fixtures);
    }

    let mut sets = Vec::with_capacity(paths.len());
    for path in &paths {
        let set = predictions::load_prediction_csv(path)?;
        println!("Loaded `{}` ({} fixtures)", set.name, set.len());
        sets.push(set.aligned(fixtures)?);
    }
    if sets.len() == 1 {
        return Ok(sets.remove(0));
    }

    let blend = parse_string_arg("--blend").unwrap_or_else(|| "weighted".to_string());
    let spread = ensemble::disagreement(&sets)?;
    println!(
        "Blending {} models ({blend}, disagreement={:.5})",
        sets.len(),
        spread
    );
    match blend.as_str() {
        "mean" => ensemble::mean_blend(&sets),
        "weighted" => ensemble::inverse_variance_blend(&sets),
        other => Err(anyhow!("unknown --blend `{other}` (mean|weighted)")),
    }
}

fn print_report(fixtures: &[dataset::StoredFixture], r: &HoldoutReport) {
    let s = &r.simulation.summary;

    println!("Holdout validation: {}", leagues::league_name(r.league_id));
    println!(
        "samples={} train={} holdout={} ({} -> {})",
        r.samples, r.train_len, r.holdout_len, r.holdout_range.0, r.holdout_range.1
    );

    let train_outcomes: Vec<Outcome> = fixtures[..r.train_len]
        .iter()
        .filter_map(|f| f.outcome())
        .collect();
    let empirical = metrics::empirical_outcome_probs(&train_outcomes);
    println!(
        "train outcome split: H={:.3} D={:.3} A={:.3}",
        empirical.home, empirical.draw, empirical.away
    );

    let holdout_slice = &fixtures[r.train_len..];
    if !holdout_slice.is_empty() {
        let mean_overround = holdout_slice
            .iter()
            .map(|f| f.odds().overround())
            .sum::<f64>()
            / holdout_slice.len() as f64;
        println!("mean holdout overround: {:.4}", mean_overround);
    }

    println!();
    print_metrics("model (holdout)", r.model_metrics);
    print_metrics("implied odds (holdout)", r.implied_metrics);
    println!("ece={:.4}", r.ece);

    println!();
    println!(
        "Paper trading: conf>={:.2} odds>={:.2} stake={:.2}",
        r.thresholds.min_confidence, r.thresholds.min_odds, r.thresholds.stake
    );
    println!(
        "  bets={} wins={} losses={} hit={:.1}%",
        s.bets,
        s.wins,
        s.losses,
        s.hit_rate * 100.0
    );
    println!(
        "  staked={:.2} profit={:+.2} roi={:+.2}%",
        s.total_staked,
        s.net_profit,
        s.roi * 100.0
    );
    if let Some((lo, hi)) = r.roi_interval {
        println!(
            "  roi 95% bootstrap interval: [{:+.2}%, {:+.2}%]",
            lo * 100.0,
            hi * 100.0
        );
    }
    println!(
        "  bankroll {:.2} -> {:.2} (peak {:.2}, max drawdown {:.2})",
        s.starting_bankroll, s.final_bankroll, s.peak_bankroll, s.max_drawdown
    );
    println!(
        "  streaks: best {:+} worst {:+}",
        s.best_streak, s.worst_streak
    );

    println!();
    println!(
        "GATE: {} (roi>0, hit>55%, bets>=5)",
        if r.gate_passed { "PASS" } else { "FAIL" }
    );
}

fn apply_thresholds(r: &HoldoutReport, force: bool) -> Result<()> {
    if !r.gate_passed && !force {
        println!("Gate failed; thresholds not applied (use --force-apply to override).");
        return Ok(());
    }

    let mut cached = thresholds::load_cached_thresholds();
    cached.insert(
        r.league_id,
        BetThresholds {
            sample_fixtures: r.samples,
            ..r.thresholds
        },
    );
    thresholds::save_cached_thresholds(&cached)?;
    println!(
        "Applied thresholds to cache for league {} (sample_fixtures={})",
        r.league_id, r.samples
    );
    Ok(())
}

fn print_metrics(label: &str, metrics: Metrics) {
    println!(
        "{label}: samples={} brier={:.4} log_loss={:.4} accuracy={:.3}",
        metrics.samples, metrics.brier, metrics.log_loss, metrics.accuracy
    );
}

fn league_slug(league_id: u32) -> String {
    leagues::league_by_id(league_id)
        .map(|l| l.slug.to_string())
        .unwrap_or_else(|| format!("league_{league_id}"))
}

fn parse_league_arg() -> Result<Option<u32>> {
    let Some(raw) = parse_string_arg("--league") else {
        return Ok(None);
    };
    if let Ok(id) = raw.trim().parse::<u32>() {
        if id == 0 {
            return Err(anyhow!("league id cannot be 0"));
        }
        return Ok(Some(id));
    }
    leagues::league_by_slug(&raw)
        .map(|l| Some(l.id))
        .ok_or_else(|| anyhow!("unknown league `{raw}`"))
}

fn parse_string_arg(name: &str) -> Option<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let prefix = format!("{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == name {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(next.trim().to_string());
            }
        }
    }
    None
}

fn parse_path_arg(name: &str) -> Option<PathBuf> {
    parse_string_arg(name).map(PathBuf::from)
}

fn parse_multi_path_arg(name: &str) -> Vec<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let prefix = format!("{name}=");
    let mut out = Vec::new();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                out.push(PathBuf::from(trimmed));
            }
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            out.push(PathBuf::from(next.trim()));
        }
    }
    out
}

fn parse_f64_arg(name: &str) -> Option<f64> {
    parse_string_arg(name).and_then(|raw| raw.parse::<f64>().ok())
}

fn parse_usize_arg(name: &str) -> Option<usize> {
    parse_string_arg(name).and_then(|raw| raw.parse::<usize>().ok())
}

fn parse_f64_list_arg(name: &str) -> Option<Vec<f64>> {
    let raw = parse_string_arg(name)?;
    let values = raw
        .split([',', ';', ' '])
        .filter_map(|part| part.trim().parse::<f64>().ok())
        .collect::<Vec<_>>();
    (!values.is_empty()).then_some(values)
}

fn has_flag(name: &str) -> bool {
    std::env::args().skip(1).any(|arg| arg == name)
}
