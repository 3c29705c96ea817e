use anyhow::{Result, anyhow};

use crate::dataset::StoredFixture;
use crate::metrics::{self, Metrics, Outcome, Prob3};
use crate::predictions::implied_prediction_set;
use crate::simulation::{self, SimulationResult, SimulationSummary};
use crate::thresholds::BetThresholds;

const BOOTSTRAP_RESAMPLES: usize = 1000;
const BOOTSTRAP_SEED: u64 = 1912;

/// Pass/fail criteria for a holdout run.
#[derive(Debug, Clone, Copy)]
pub struct GateCriteria {
    pub min_roi: f64,
    pub min_hit_rate: f64,
    pub min_bets: usize,
}

impl Default for GateCriteria {
    fn default() -> Self {
        Self {
            min_roi: 0.0,
            min_hit_rate: 0.55,
            min_bets: 5,
        }
    }
}

impl GateCriteria {
    /// ROI and hit rate are strict inequalities; bet count is inclusive.
    pub fn passes(&self, summary: &SimulationSummary) -> bool {
        summary.roi > self.min_roi
            && summary.hit_rate > self.min_hit_rate
            && summary.bets >= self.min_bets
    }
}

#[derive(Debug, Clone)]
pub struct HoldoutReport {
    pub league_id: u32,
    pub samples: usize,
    pub train_len: usize,
    pub holdout_len: usize,
    pub holdout_range: (String, String),
    pub model_metrics: Metrics,
    pub implied_metrics: Metrics,
    pub ece: f64,
    pub simulation: SimulationResult,
    pub thresholds: BetThresholds,
    pub roi_interval: Option<(f64, f64)>,
    pub gate_passed: bool,
}

#[derive(Debug, Clone)]
pub struct SweepEntry {
    pub thresholds: BetThresholds,
    pub train_summary: SimulationSummary,
}

/// Train-slice length for a chronological 80/20 split. The most recent
/// `ceil(0.20 * n)` fixtures form the holdout; both slices stay non-empty.
pub fn train_split_index(n: usize) -> usize {
    if n <= 2 {
        return 1;
    }
    let holdout = ((n as f64) * 0.20).ceil() as usize;
    (n - holdout).clamp(1, n - 1)
}

/// Evaluate frozen predictions on the most recent 20% of fixtures and run the
/// paper-trading gate over that slice.
pub fn run_holdout(
    league_id: u32,
    fixtures: &[StoredFixture],
    predictions: &[Prob3],
    thresholds: BetThresholds,
    gate: GateCriteria,
) -> Result<HoldoutReport> {
    if fixtures.len() != predictions.len() {
        return Err(anyhow!(
            "fixtures/predictions misaligned ({} vs {})",
            fixtures.len(),
            predictions.len()
        ));
    }
    if fixtures.len() < 2 {
        return Err(anyhow!(
            "league {league_id}: need at least 2 settled fixtures, got {}",
            fixtures.len()
        ));
    }

    let split_idx = train_split_index(fixtures.len());
    let holdout_fixtures = &fixtures[split_idx..];
    let holdout_preds = &predictions[split_idx..];

    let outcomes = outcomes_of(holdout_fixtures)?;
    let model_metrics = metrics::evaluate_probs(holdout_preds, &outcomes);

    let implied = implied_prediction_set(holdout_fixtures).aligned(holdout_fixtures)?;
    let implied_metrics = metrics::evaluate_probs(&implied, &outcomes);

    let ece = metrics::ece_1x2(holdout_preds, &outcomes, 10);

    let simulation = simulation::simulate(holdout_fixtures, holdout_preds, &thresholds)?;
    let roi_interval = simulation::bootstrap_roi_interval(
        &simulation.records,
        BOOTSTRAP_RESAMPLES,
        BOOTSTRAP_SEED,
    );
    let gate_passed = gate.passes(&simulation.summary);

    let holdout_range = (
        holdout_fixtures
            .first()
            .map(|f| f.date.clone())
            .unwrap_or_default(),
        holdout_fixtures
            .last()
            .map(|f| f.date.clone())
            .unwrap_or_default(),
    );

    Ok(HoldoutReport {
        league_id,
        samples: fixtures.len(),
        train_len: split_idx,
        holdout_len: fixtures.len() - split_idx,
        holdout_range,
        model_metrics,
        implied_metrics,
        ece,
        simulation,
        thresholds,
        roi_interval,
        gate_passed,
    })
}

/// Grid sweep over confidence/odds thresholds on the train slice only.
/// Ranked by train ROI, ties broken by bet count; the winner is meant to be
/// scored exactly once on the holdout afterwards.
pub fn sweep_thresholds(
    fixtures: &[StoredFixture],
    predictions: &[Prob3],
    base: BetThresholds,
    confidences: &[f64],
    odds_floors: &[f64],
) -> Result<Vec<SweepEntry>> {
    if confidences.is_empty() || odds_floors.is_empty() {
        return Err(anyhow!("empty sweep grid"));
    }
    if fixtures.len() != predictions.len() {
        return Err(anyhow!(
            "fixtures/predictions misaligned ({} vs {})",
            fixtures.len(),
            predictions.len()
        ));
    }
    if fixtures.len() < 2 {
        return Err(anyhow!(
            "need at least 2 settled fixtures to sweep, got {}",
            fixtures.len()
        ));
    }

    let split_idx = train_split_index(fixtures.len());
    let train_fixtures = &fixtures[..split_idx];
    let train_preds = &predictions[..split_idx];

    let mut entries = Vec::with_capacity(confidences.len() * odds_floors.len());
    for conf in confidences {
        for floor in odds_floors {
            let t = BetThresholds {
                min_confidence: *conf,
                min_odds: *floor,
                ..base
            }
            .clamped();
            let result = simulation::simulate(train_fixtures, train_preds, &t)?;
            entries.push(SweepEntry {
                thresholds: t,
                train_summary: result.summary,
            });
        }
    }

    entries.sort_by(|a, b| {
        b.train_summary
            .roi
            .partial_cmp(&a.train_summary.roi)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.train_summary.bets.cmp(&a.train_summary.bets))
    });
    Ok(entries)
}

fn outcomes_of(fixtures: &[StoredFixture]) -> Result<Vec<Outcome>> {
    let outcomes: Vec<Outcome> = fixtures.iter().filter_map(|f| f.outcome()).collect();
    if outcomes.len() != fixtures.len() {
        return Err(anyhow!("unsettled fixtures in holdout slice"));
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_withholds_the_last_fifth() {
        assert_eq!(train_split_index(100), 80);
        assert_eq!(train_split_index(10), 8);
        // ceil(0.2 * 11) = 3 held out.
        assert_eq!(train_split_index(11), 8);
        assert_eq!(train_split_index(2), 1);
        assert_eq!(train_split_index(3), 2);
    }

    #[test]
    fn sweep_rejects_undersized_inputs() {
        let base = BetThresholds::defaults(47);
        // Too few fixtures is an error, not a slice panic.
        assert!(sweep_thresholds(&[], &[], base, &[0.60], &[1.50]).is_err());
        assert!(sweep_thresholds(&[], &[Prob3::uniform()], base, &[0.60], &[1.50]).is_err());
    }

    #[test]
    fn gate_requires_all_three_criteria() {
        let gate = GateCriteria::default();
        let mut s = SimulationSummary {
            fixtures: 100,
            bets: 10,
            wins: 6,
            losses: 4,
            total_staked: 100.0,
            net_profit: 20.0,
            roi: 0.2,
            hit_rate: 0.6,
            starting_bankroll: 1000.0,
            final_bankroll: 1020.0,
            peak_bankroll: 1020.0,
            max_drawdown: 10.0,
            best_streak: 3,
            worst_streak: -2,
        };
        assert!(gate.passes(&s));

        s.hit_rate = 0.55; // strict inequality
        assert!(!gate.passes(&s));
        s.hit_rate = 0.6;
        s.roi = 0.0;
        assert!(!gate.passes(&s));
        s.roi = 0.2;
        s.bets = 4;
        assert!(!gate.passes(&s));
    }
}
