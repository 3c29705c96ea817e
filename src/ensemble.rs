use anyhow::{Result, anyhow};

use crate::metrics::Prob3;

const VAR_EPS: f64 = 1e-4;

/// Equal-weight average of aligned prediction vectors.
pub fn mean_blend(sets: &[Vec<Prob3>]) -> Result<Vec<Prob3>> {
    let n = check_aligned(sets)?;
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let mut home = 0.0;
        let mut draw = 0.0;
        let mut away = 0.0;
        for set in sets {
            home += set[i].home;
            draw += set[i].draw;
            away += set[i].away;
        }
        out.push(
            Prob3 {
                home,
                draw,
                away,
            }
            .normalized(),
        );
    }
    Ok(out)
}

/// Variance-weighted blend: per fixture, a model that strays far from the
/// cross-model mean gets down-weighted by the inverse of its squared distance.
pub fn inverse_variance_blend(sets: &[Vec<Prob3>]) -> Result<Vec<Prob3>> {
    let n = check_aligned(sets)?;
    if sets.len() == 1 {
        return Ok(sets[0].clone());
    }

    let mean = mean_blend(sets)?;
    let mut out = Vec::with_capacity(n);

    for i in 0..n {
        let m = mean[i];
        let mut home = 0.0;
        let mut draw = 0.0;
        let mut away = 0.0;
        for set in sets {
            let p = set[i];
            let var = ((p.home - m.home).powi(2)
                + (p.draw - m.draw).powi(2)
                + (p.away - m.away).powi(2))
                / 3.0;
            let w = 1.0 / (VAR_EPS + var);
            home += w * p.home;
            draw += w * p.draw;
            away += w * p.away;
        }
        out.push(
            Prob3 {
                home,
                draw,
                away,
            }
            .normalized(),
        );
    }
    Ok(out)
}

/// Mean per-fixture spread between models; 0.0 means full agreement.
pub fn disagreement(sets: &[Vec<Prob3>]) -> Result<f64> {
    let n = check_aligned(sets)?;
    if sets.len() < 2 || n == 0 {
        return Ok(0.0);
    }
    let mean = mean_blend(sets)?;
    let mut sum = 0.0;
    for i in 0..n {
        let m = mean[i];
        for set in sets {
            let p = set[i];
            sum += ((p.home - m.home).powi(2)
                + (p.draw - m.draw).powi(2)
                + (p.away - m.away).powi(2))
                / 3.0;
        }
    }
    Ok(sum / (n as f64 * sets.len() as f64))
}

fn check_aligned(sets: &[Vec<Prob3>]) -> Result<usize> {
    let Some(first) = sets.first() else {
        return Err(anyhow!("no prediction sets to blend"));
    };
    let n = first.len();
    if sets.iter().any(|s| s.len() != n) {
        return Err(anyhow!("prediction sets are not aligned"));
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(home: f64, draw: f64, away: f64) -> Prob3 {
        Prob3 { home, draw, away }
    }

    #[test]
    fn mean_blend_averages() {
        let a = vec![p(0.6, 0.2, 0.2)];
        let b = vec![p(0.2, 0.2, 0.6)];
        let out = mean_blend(&[a, b]).unwrap();
        assert!((out[0].home - 0.4).abs() < 1e-12);
        assert!((out[0].sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn outlier_model_gets_downweighted() {
        let a = vec![p(0.5, 0.3, 0.2)];
        let b = vec![p(0.5, 0.3, 0.2)];
        let c = vec![p(0.05, 0.05, 0.9)];
        let blended = inverse_variance_blend(&[a, b, c]).unwrap();
        let mean = mean_blend(&[
            vec![p(0.5, 0.3, 0.2)],
            vec![p(0.5, 0.3, 0.2)],
            vec![p(0.05, 0.05, 0.9)],
        ])
        .unwrap();
        // The agreeing pair should pull the blend closer to them than the mean is.
        assert!(blended[0].home > mean[0].home);
        assert!(blended[0].away < mean[0].away);
        assert!((blended[0].sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn single_set_passes_through() {
        let a = vec![p(0.7, 0.2, 0.1), p(0.1, 0.2, 0.7)];
        let out = inverse_variance_blend(&[a.clone()]).unwrap();
        assert_eq!(out.len(), 2);
        assert!((out[0].home - a[0].home).abs() < 1e-12);
    }

    #[test]
    fn misaligned_sets_error() {
        let a = vec![p(0.5, 0.3, 0.2)];
        let b = vec![p(0.5, 0.3, 0.2), p(0.2, 0.3, 0.5)];
        assert!(mean_blend(&[a, b]).is_err());
    }

    #[test]
    fn identical_models_have_zero_disagreement() {
        let a = vec![p(0.5, 0.3, 0.2)];
        let b = vec![p(0.5, 0.3, 0.2)];
        assert!(disagreement(&[a, b]).unwrap() < 1e-15);
    }
}
