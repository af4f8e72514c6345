//! Utilities.
use serde::{Deserialize, Serialize};

/// Critic loss type.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Copy)]
pub enum CriticLoss {
    /// Mean squared error.
    Mse,

    /// Smooth L1 loss.
    SmoothL1,
}

impl CriticLoss {
    /// Loss of a single error.
    pub fn value(&self, err: f32) -> f32 {
        match self {
            Self::Mse => err * err,
            Self::SmoothL1 => {
                if err.abs() < 1.0 {
                    0.5 * err * err
                } else {
                    err.abs() - 0.5
                }
            }
        }
    }

    /// Derivative of [`CriticLoss::value`] with respect to the error.
    pub fn grad(&self, err: f32) -> f32 {
        match self {
            Self::Mse => 2.0 * err,
            Self::SmoothL1 => err.clamp(-1.0, 1.0),
        }
    }
}

/// Midpoints `(2j + 1) / 2n` of `n` equal fractions of the unit interval.
pub fn quantile_fractions(n: usize) -> Vec<f32> {
    (0..n)
        .map(|j| (2 * j + 1) as f32 / (2 * n) as f32)
        .collect()
}

/// Quantile Huber loss of the error `u = target - prediction` at fraction `tau`.
///
/// Errors below zero are weighted with `1 - tau`, the others with `tau`. The Huber
/// threshold is 1.
pub fn quantile_huber(u: f32, tau: f32) -> f32 {
    quantile_weight(u, tau) * CriticLoss::SmoothL1.value(u)
}

/// Derivative of [`quantile_huber`] with respect to the prediction.
pub fn quantile_huber_grad(u: f32, tau: f32) -> f32 {
    -quantile_weight(u, tau) * CriticLoss::SmoothL1.grad(u)
}

fn quantile_weight(u: f32, tau: f32) -> f32 {
    if u < 0.0 {
        1.0 - tau
    } else {
        tau
    }
}

/// Index of the largest value, the first one on ties. Returns 0 for an empty slice.
pub fn argmax(xs: &[f32]) -> usize {
    let mut best = 0;
    for (i, x) in xs.iter().enumerate() {
        if *x > xs[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smooth_l1_is_quadratic_then_linear() {
        let l = CriticLoss::SmoothL1;
        assert_eq!(l.value(0.5), 0.125);
        assert_eq!(l.value(-3.0), 2.5);
        assert_eq!(l.grad(0.5), 0.5);
        assert_eq!(l.grad(-3.0), -1.0);
    }

    #[test]
    fn quantile_huber_is_asymmetric() {
        assert_eq!(quantile_fractions(4), vec![0.125, 0.375, 0.625, 0.875]);
        // Over-estimates of a low quantile cost more than under-estimates.
        assert_eq!(quantile_huber(-0.5, 0.25), 0.75 * 0.125);
        assert_eq!(quantile_huber(0.5, 0.25), 0.25 * 0.125);
        assert_eq!(quantile_huber_grad(-3.0, 0.25), 0.75);
        assert_eq!(quantile_huber_grad(3.0, 0.25), -0.25);
    }

    #[test]
    fn argmax_prefers_first_tie() {
        assert_eq!(argmax(&[1.0, 3.0, 3.0, -1.0]), 1);
        assert_eq!(argmax(&[]), 0);
    }
}
