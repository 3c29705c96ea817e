#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Home,
    Draw,
    Away,
}

impl Outcome {
    /// Dataset encoding: 0 = home win, 1 = draw, 2 = away win.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Outcome::Home),
            1 => Some(Outcome::Draw),
            2 => Some(Outcome::Away),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Outcome::Home => 0,
            Outcome::Draw => 1,
            Outcome::Away => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Outcome::Home => "H",
            Outcome::Draw => "D",
            Outcome::Away => "A",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Prob3 {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

impl Prob3 {
    pub fn uniform() -> Self {
        Self {
            home: 1.0 / 3.0,
            draw: 1.0 / 3.0,
            away: 1.0 / 3.0,
        }
    }

    pub fn get(&self, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::Home => self.home,
            Outcome::Draw => self.draw,
            Outcome::Away => self.away,
        }
    }

    pub fn sum(&self) -> f64 {
        self.home + self.draw + self.away
    }

    /// Rescale so the triple sums to exactly 1.0; degenerate input becomes uniform.
    pub fn normalized(self) -> Self {
        let sum = self.sum();
        if sum <= 1e-12 || !sum.is_finite() {
            return Self::uniform();
        }
        Self {
            home: self.home / sum,
            draw: self.draw / sum,
            away: self.away / sum,
        }
    }

    /// Most likely outcome; ties resolve home over draw over away.
    pub fn argmax(&self) -> Outcome {
        if self.home >= self.draw && self.home >= self.away {
            Outcome::Home
        } else if self.draw >= self.away {
            Outcome::Draw
        } else {
            Outcome::Away
        }
    }

    pub fn max_prob(&self) -> f64 {
        self.home.max(self.draw).max(self.away)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Metrics {
    pub samples: usize,
    pub brier: f64,
    pub log_loss: f64,
    pub accuracy: f64,
}

impl Metrics {
    pub fn empty() -> Self {
        Self {
            samples: 0,
            brier: 0.0,
            log_loss: 0.0,
            accuracy: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CalibrationBin {
    pub bucket_start: f64,
    pub bucket_end: f64,
    pub count: usize,
    pub avg_pred: f64,
    pub actual_rate: f64,
}

pub fn empirical_outcome_probs(outcomes: &[Outcome]) -> Prob3 {
    if outcomes.is_empty() {
        return Prob3::uniform();
    }

    let mut home = 0usize;
    let mut draw = 0usize;
    let mut away = 0usize;
    for outcome in outcomes {
        match outcome {
            Outcome::Home => home += 1,
            Outcome::Draw => draw += 1,
            Outcome::Away => away += 1,
        }
    }
    let n = outcomes.len() as f64;
    Prob3 {
        home: home as f64 / n,
        draw: draw as f64 / n,
        away: away as f64 / n,
    }
}

pub fn evaluate_probs(predictions: &[Prob3], outcomes: &[Outcome]) -> Metrics {
    if predictions.is_empty() || outcomes.is_empty() || predictions.len() != outcomes.len() {
        return Metrics::empty();
    }

    let mut brier_sum = 0.0_f64;
    let mut log_loss_sum = 0.0_f64;
    let mut correct = 0usize;

    for (p, outcome) in predictions.iter().zip(outcomes) {
        let y = one_hot(*outcome);
        brier_sum +=
            (p.home - y.home).powi(2) + (p.draw - y.draw).powi(2) + (p.away - y.away).powi(2);

        let actual_prob = p.get(*outcome).clamp(1e-12, 1.0);
        log_loss_sum += -actual_prob.ln();

        if p.argmax() == *outcome {
            correct += 1;
        }
    }

    let n = predictions.len() as f64;
    Metrics {
        samples: predictions.len(),
        brier: brier_sum / n,
        log_loss: log_loss_sum / n,
        accuracy: correct as f64 / n,
    }
}

pub fn calibration_bins(
    predictions: &[Prob3],
    outcomes: &[Outcome],
    class: Outcome,
    bins: usize,
) -> Vec<CalibrationBin> {
    let bins = bins.max(2);
    let mut counts = vec![0usize; bins];
    let mut pred_sum = vec![0.0_f64; bins];
    let mut actual_sum = vec![0.0_f64; bins];

    for (p, outcome) in predictions.iter().zip(outcomes) {
        let class_prob = p.get(class).clamp(0.0, 1.0);
        let idx = ((class_prob * bins as f64).floor() as usize).min(bins - 1);
        counts[idx] += 1;
        pred_sum[idx] += class_prob;
        if *outcome == class {
            actual_sum[idx] += 1.0;
        }
    }

    let mut out = Vec::with_capacity(bins);
    for i in 0..bins {
        let start = i as f64 / bins as f64;
        let end = (i + 1) as f64 / bins as f64;
        let count = counts[i];
        let (avg_pred, actual_rate) = if count > 0 {
            (pred_sum[i] / count as f64, actual_sum[i] / count as f64)
        } else {
            (0.0, 0.0)
        };
        out.push(CalibrationBin {
            bucket_start: start,
            bucket_end: end,
            count,
            avg_pred,
            actual_rate,
        });
    }
    out
}

/// Expected calibration error averaged over the three outcome classes.
pub fn ece_1x2(predictions: &[Prob3], outcomes: &[Outcome], bins: usize) -> f64 {
    if predictions.is_empty() || predictions.len() != outcomes.len() || bins == 0 {
        return 0.0;
    }
    let mut sum = 0.0;
    let n = predictions.len() as f64;

    for class in [Outcome::Home, Outcome::Draw, Outcome::Away] {
        for b in calibration_bins(predictions, outcomes, class, bins) {
            if b.count == 0 {
                continue;
            }
            let w = b.count as f64 / n;
            sum += w * (b.avg_pred - b.actual_rate).abs();
        }
    }

    sum / 3.0
}

fn one_hot(outcome: Outcome) -> Prob3 {
    match outcome {
        Outcome::Home => Prob3 {
            home: 1.0,
            draw: 0.0,
            away: 0.0,
        },
        Outcome::Draw => Prob3 {
            home: 0.0,
            draw: 1.0,
            away: 0.0,
        },
        Outcome::Away => Prob3 {
            home: 0.0,
            draw: 0.0,
            away: 1.0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_predictions_have_zero_brier() {
        let preds = vec![
            Prob3 {
                home: 1.0,
                draw: 0.0,
                away: 0.0,
            },
            Prob3 {
                home: 0.0,
                draw: 1.0,
                away: 0.0,
            },
            Prob3 {
                home: 0.0,
                draw: 0.0,
                away: 1.0,
            },
        ];
        let outcomes = vec![Outcome::Home, Outcome::Draw, Outcome::Away];
        let m = evaluate_probs(&preds, &outcomes);
        assert_eq!(m.samples, 3);
        assert!(m.brier < 1e-12);
        assert_eq!(m.accuracy, 1.0);
    }

    #[test]
    fn outcome_code_roundtrip() {
        for code in 0..3u8 {
            assert_eq!(Outcome::from_code(code).unwrap().code(), code);
        }
        assert!(Outcome::from_code(3).is_none());
    }

    #[test]
    fn argmax_prefers_home_on_ties() {
        let p = Prob3 {
            home: 0.4,
            draw: 0.4,
            away: 0.2,
        };
        assert_eq!(p.argmax(), Outcome::Home);
    }

    #[test]
    fn normalized_handles_degenerate_triples() {
        let p = Prob3 {
            home: 0.0,
            draw: 0.0,
            away: 0.0,
        }
        .normalized();
        assert!((p.sum() - 1.0).abs() < 1e-12);

        let q = Prob3 {
            home: 2.0,
            draw: 1.0,
            away: 1.0,
        }
        .normalized();
        assert!((q.sum() - 1.0).abs() < 1e-12);
        assert!((q.home - 0.5).abs() < 1e-12);
    }

    #[test]
    fn empirical_probs_match_counts() {
        let outcomes = vec![
            Outcome::Home,
            Outcome::Home,
            Outcome::Draw,
            Outcome::Away,
        ];
        let p = empirical_outcome_probs(&outcomes);
        assert!((p.home - 0.5).abs() < 1e-12);
        assert!((p.draw - 0.25).abs() < 1e-12);
    }

    #[test]
    fn calibration_bins_count_everything() {
        let preds = vec![Prob3::uniform(); 10];
        let outcomes = vec![Outcome::Home; 10];
        let bins = calibration_bins(&preds, &outcomes, Outcome::Home, 10);
        let total: usize = bins.iter().map(|b| b.count).sum();
        assert_eq!(total, 10);
    }
}
