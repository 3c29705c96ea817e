use crate::metrics::{Outcome, Prob3};

/// Decimal odds for the three 1X2 outcomes of a fixture.
#[derive(Debug, Clone, Copy)]
pub struct OddsTriple {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

impl OddsTriple {
    pub fn get(&self, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::Home => self.home,
            Outcome::Draw => self.draw,
            Outcome::Away => self.away,
        }
    }

    pub fn is_valid(&self) -> bool {
        [self.home, self.draw, self.away]
            .iter()
            .all(|o| o.is_finite() && *o > 1.0)
    }

    /// Raw inverse odds. These sum to the overround, not to 1.0.
    pub fn inverse(&self) -> Prob3 {
        Prob3 {
            home: 1.0 / self.home,
            draw: 1.0 / self.draw,
            away: 1.0 / self.away,
        }
    }

    pub fn overround(&self) -> f64 {
        self.inverse().sum()
    }

    /// Implied outcome probabilities with the bookmaker margin divided out.
    pub fn implied_probs(&self) -> Prob3 {
        self.inverse().normalized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> OddsTriple {
        OddsTriple {
            home: 2.10,
            draw: 3.40,
            away: 3.80,
        }
    }

    #[test]
    fn inverse_sums_to_overround() {
        let odds = sample();
        let inv = odds.inverse();
        assert!((inv.sum() - odds.overround()).abs() < 1e-12);
        assert!(odds.overround() > 1.0);
    }

    #[test]
    fn implied_probs_are_normalized() {
        let p = sample().implied_probs();
        assert!((p.sum() - 1.0).abs() < 1e-12);
        assert!(p.home > p.draw && p.draw > p.away);
    }

    #[test]
    fn validity_rejects_sub_even_odds() {
        let mut odds = sample();
        assert!(odds.is_valid());
        odds.draw = 1.0;
        assert!(!odds.is_valid());
        odds.draw = f64::NAN;
        assert!(!odds.is_valid());
    }

    #[test]
    fn get_follows_outcome() {
        let odds = sample();
        assert_eq!(odds.get(Outcome::Home), 2.10);
        assert_eq!(odds.get(Outcome::Away), 3.80);
    }
}
