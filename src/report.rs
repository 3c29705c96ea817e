use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use rust_xlsxwriter::Workbook;
use serde::Serialize;

use crate::dataset::app_cache_dir;
use crate::holdout::HoldoutReport;
use crate::leagues;
use crate::simulation::BetRecord;

pub fn default_reports_dir() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join("reports"))
}

/// `<prefix>_<UTC timestamp>.<ext>`; timestamps sort lexicographically, so the
/// newest artifact is the max filename.
pub fn timestamped_path(dir: &Path, prefix: &str, ext: &str) -> PathBuf {
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    dir.join(format!("{prefix}_{stamp}.{ext}"))
}

pub fn latest_report(dir: &Path, prefix: &str, ext: &str) -> Option<PathBuf> {
    let want_prefix = format!("{prefix}_");
    let want_suffix = format!(".{ext}");
    let mut best: Option<(String, PathBuf)> = None;

    for entry in fs::read_dir(dir).ok()? {
        let Ok(entry) = entry else {
            continue;
        };
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.starts_with(&want_prefix) || !name.ends_with(&want_suffix) {
            continue;
        }
        let name = name.to_string();
        if best.as_ref().is_none_or(|(b, _)| name > *b) {
            best = Some((name, path));
        }
    }

    best.map(|(_, path)| path)
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    league_id: u32,
    league: String,
    generated_at: String,
    samples: usize,
    train_len: usize,
    holdout_len: usize,
    holdout_from: &'a str,
    holdout_to: &'a str,
    min_confidence: f64,
    min_odds: f64,
    stake: f64,
    brier: f64,
    log_loss: f64,
    accuracy: f64,
    implied_brier: f64,
    implied_log_loss: f64,
    ece: f64,
    bets: usize,
    wins: usize,
    hit_rate: f64,
    total_staked: f64,
    net_profit: f64,
    roi: f64,
    roi_ci_low: Option<f64>,
    roi_ci_high: Option<f64>,
    starting_bankroll: f64,
    final_bankroll: f64,
    max_drawdown: f64,
    gate_passed: bool,
}

pub fn render_json(report: &HoldoutReport) -> Result<String> {
    let s = &report.simulation.summary;
    let json = JsonReport {
        league_id: report.league_id,
        league: leagues::league_name(report.league_id),
        generated_at: Utc::now().to_rfc3339(),
        samples: report.samples,
        train_len: report.train_len,
        holdout_len: report.holdout_len,
        holdout_from: &report.holdout_range.0,
        holdout_to: &report.holdout_range.1,
        min_confidence: report.thresholds.min_confidence,
        min_odds: report.thresholds.min_odds,
        stake: report.thresholds.stake,
        brier: report.model_metrics.brier,
        log_loss: report.model_metrics.log_loss,
        accuracy: report.model_metrics.accuracy,
        implied_brier: report.implied_metrics.brier,
        implied_log_loss: report.implied_metrics.log_loss,
        ece: report.ece,
        bets: s.bets,
        wins: s.wins,
        hit_rate: s.hit_rate,
        total_staked: s.total_staked,
        net_profit: s.net_profit,
        roi: s.roi,
        roi_ci_low: report.roi_interval.map(|(lo, _)| lo),
        roi_ci_high: report.roi_interval.map(|(_, hi)| hi),
        starting_bankroll: s.starting_bankroll,
        final_bankroll: s.final_bankroll,
        max_drawdown: s.max_drawdown,
        gate_passed: report.gate_passed,
    };
    serde_json::to_string_pretty(&json).context("serialize holdout report")
}

pub fn render_markdown(report: &HoldoutReport) -> String {
    let s = &report.simulation.summary;
    let league = leagues::league_name(report.league_id);
    let mut out = String::new();

    out.push_str(&format!("# Holdout validation: {league}\n\n"));
    out.push_str(&format!(
        "Generated {} UTC. {} settled fixtures, train {} / holdout {} ({} -> {}).\n\n",
        Utc::now().format("%Y-%m-%d %H:%M:%S"),
        report.samples,
        report.train_len,
        report.holdout_len,
        report.holdout_range.0,
        report.holdout_range.1,
    ));

    out.push_str("## Model quality (holdout)\n\n");
    out.push_str("| metric | model | implied odds |\n|---|---|---|\n");
    out.push_str(&format!(
        "| brier | {:.4} | {:.4} |\n",
        report.model_metrics.brier, report.implied_metrics.brier
    ));
    out.push_str(&format!(
        "| log loss | {:.4} | {:.4} |\n",
        report.model_metrics.log_loss, report.implied_metrics.log_loss
    ));
    out.push_str(&format!(
        "| accuracy | {:.3} | {:.3} |\n",
        report.model_metrics.accuracy, report.implied_metrics.accuracy
    ));
    out.push_str(&format!("| ece | {:.4} | |\n\n", report.ece));

    out.push_str("## Paper trading (holdout)\n\n");
    out.push_str(&format!(
        "Filter: confidence >= {:.2}, odds >= {:.2}, stake {:.2}.\n\n",
        report.thresholds.min_confidence, report.thresholds.min_odds, report.thresholds.stake
    ));
    out.push_str(&format!(
        "- bets: {} ({} won, hit rate {:.1}%)\n",
        s.bets,
        s.wins,
        s.hit_rate * 100.0
    ));
    out.push_str(&format!(
        "- staked {:.2}, net profit {:+.2}, ROI {:+.2}%\n",
        s.total_staked,
        s.net_profit,
        s.roi * 100.0
    ));
    if let Some((lo, hi)) = report.roi_interval {
        out.push_str(&format!(
            "- ROI 95% bootstrap interval: [{:+.2}%, {:+.2}%]\n",
            lo * 100.0,
            hi * 100.0
        ));
    }
    out.push_str(&format!(
        "- bankroll {:.2} -> {:.2} (peak {:.2}, max drawdown {:.2})\n",
        s.starting_bankroll, s.final_bankroll, s.peak_bankroll, s.max_drawdown
    ));
    out.push_str(&format!(
        "- streaks: best {:+}, worst {:+}\n\n",
        s.best_streak, s.worst_streak
    ));

    out.push_str(&format!(
        "## Gate: {}\n\nROI > 0, hit rate > 55%, bets >= 5.\n",
        if report.gate_passed { "PASS" } else { "FAIL" }
    ));

    out
}

pub fn write_report_files(
    dir: &Path,
    slug: &str,
    report: &HoldoutReport,
) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(dir).with_context(|| format!("create reports dir {}", dir.display()))?;

    let md_path = timestamped_path(dir, &format!("{slug}_holdout"), "md");
    write_atomic(&md_path, render_markdown(report).as_bytes())?;

    let json_path = timestamped_path(dir, &format!("{slug}_holdout"), "json");
    write_atomic(&json_path, render_json(report)?.as_bytes())?;

    Ok((md_path, json_path))
}

pub fn export_ledger_xlsx(path: &Path, records: &[BetRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok();
    }

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    let headers = [
        "Fixture ID",
        "League",
        "Date",
        "Home",
        "Away",
        "Pick",
        "Confidence",
        "Odds",
        "Stake",
        "Actual",
        "Won",
        "Profit",
        "Bankroll",
    ];
    for (col, header) in headers.iter().enumerate() {
        worksheet
            .write_string(0, col as u16, *header)
            .context("write ledger header")?;
    }

    for (i, r) in records.iter().enumerate() {
        let row = (i + 1) as u32;
        worksheet
            .write_number(row, 0, r.fixture_id as f64)
            .and_then(|ws| ws.write_string(row, 1, leagues::league_name(r.league_id)))
            .and_then(|ws| ws.write_string(row, 2, &r.date))
            .and_then(|ws| ws.write_string(row, 3, &r.home_team))
            .and_then(|ws| ws.write_string(row, 4, &r.away_team))
            .and_then(|ws| ws.write_string(row, 5, r.pick.label()))
            .and_then(|ws| ws.write_number(row, 6, r.confidence))
            .and_then(|ws| ws.write_number(row, 7, r.odds))
            .and_then(|ws| ws.write_number(row, 8, r.stake))
            .and_then(|ws| ws.write_string(row, 9, r.actual.label()))
            .and_then(|ws| ws.write_string(row, 10, if r.won { "yes" } else { "no" }))
            .and_then(|ws| ws.write_number(row, 11, r.profit))
            .and_then(|ws| ws.write_number(row, 12, r.bankroll_after))
            .context("write ledger row")?;
    }

    workbook
        .save(path)
        .with_context(|| format!("save ledger xlsx {}", path.display()))?;
    Ok(())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("swap {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_report_picks_max_timestamp() {
        let dir = std::env::temp_dir().join(format!("oddslab_report_test_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("pl_holdout_20240101_000000.md"), "a").unwrap();
        fs::write(dir.join("pl_holdout_20250101_000000.md"), "b").unwrap();
        fs::write(dir.join("pl_holdout_20250101_000000.json"), "c").unwrap();
        fs::write(dir.join("other_20260101_000000.md"), "d").unwrap();

        let latest = latest_report(&dir, "pl_holdout", "md").unwrap();
        assert!(
            latest
                .file_name()
                .unwrap()
                .to_str()
                .unwrap()
                .contains("20250101")
        );

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn timestamped_path_keeps_prefix_and_ext() {
        let p = timestamped_path(Path::new("/tmp"), "serie_a_holdout", "json");
        let name = p.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("serie_a_holdout_"));
        assert!(name.ends_with(".json"));
    }
}
