use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::dataset::app_cache_dir;

/// Per-league betting thresholds. A qualifying bet needs model confidence at
/// or above `min_confidence` AND decimal odds for the picked outcome at or
/// above `min_odds`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BetThresholds {
    pub league_id: u32,
    /// Fixtures the thresholds were last fitted on (0 = never fitted).
    pub sample_fixtures: usize,
    pub min_confidence: f64,
    pub min_odds: f64,
    pub stake: f64,
    pub starting_bankroll: f64,
}

impl BetThresholds {
    pub fn defaults(league_id: u32) -> Self {
        Self {
            league_id,
            sample_fixtures: 0,
            min_confidence: 0.60,
            min_odds: 1.50,
            stake: 10.0,
            starting_bankroll: 1000.0,
        }
    }

    pub fn clamped(mut self) -> Self {
        self.min_confidence = self.min_confidence.clamp(1.0 / 3.0, 0.99);
        self.min_odds = self.min_odds.clamp(1.01, 20.0);
        self.stake = self.stake.clamp(0.01, 1000.0);
        self.starting_bankroll = self.starting_bankroll.max(self.stake);
        self
    }
}

pub fn thresholds_for(league_id: u32) -> BetThresholds {
    load_cached_thresholds()
        .get(&league_id)
        .copied()
        .unwrap_or_else(|| BetThresholds::defaults(league_id))
}

pub fn load_cached_thresholds() -> HashMap<u32, BetThresholds> {
    let Some(path) = thresholds_path() else {
        return HashMap::new();
    };
    let Ok(raw) = fs::read_to_string(path) else {
        return HashMap::new();
    };
    serde_json::from_str::<HashMap<u32, BetThresholds>>(&raw).unwrap_or_default()
}

pub fn save_cached_thresholds(thresholds: &HashMap<u32, BetThresholds>) -> Result<()> {
    let Some(path) = thresholds_path() else {
        return Ok(());
    };
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string(thresholds).context("serialize bet thresholds")?;
    fs::write(&tmp, json).context("write bet thresholds")?;
    fs::rename(&tmp, &path).context("swap bet thresholds")?;
    Ok(())
}

fn thresholds_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join("bet_thresholds.json"))
}
