//! Curve shapes and per-line parameterization.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Named curve shape. Selected once per request; unknown selectors fall
/// back to [`Curve::Sin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Curve {
    /// Decaying training-loss shape.
    Loss,
    /// Two sine periods.
    #[default]
    Sin,
    /// Saturating accuracy shape capped at 1.
    Accuracy,
    /// Straight ramp to 100.
    Linear,
    /// Exponential growth.
    Exponential,
    /// `log1p` growth.
    Logarithmic,
    /// Two cosine periods.
    Cosine,
    /// Cubic centred on 0.5.
    Polynomial,
    /// Per-line accumulated random walk.
    RandomWalk,
    /// Five discrete steps.
    Step,
    /// Logistic sigmoid with additive noise.
    Sigmoid,
    /// Hyperbolic tangent.
    Tanh,
    /// Exponentially damped sine.
    DampedSine,
    /// Four sawtooth periods.
    Sawtooth,
    /// Gaussian bump centred on 0.5.
    Gaussian,
    /// Logistic sigmoid with multiplicative noise.
    Logistic,
}

impl Curve {
    /// Every curve, in selector-table order.
    pub const ALL: [Self; 16] = [
        Self::Loss,
        Self::Sin,
        Self::Accuracy,
        Self::Linear,
        Self::Exponential,
        Self::Logarithmic,
        Self::Cosine,
        Self::Polynomial,
        Self::RandomWalk,
        Self::Step,
        Self::Sigmoid,
        Self::Tanh,
        Self::DampedSine,
        Self::Sawtooth,
        Self::Gaussian,
        Self::Logistic,
    ];

    /// Match a selector exactly.
    #[must_use]
    pub fn parse(selector: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == selector)
    }

    /// Match a selector, falling back to the default curve.
    #[must_use]
    pub fn from_selector(selector: &str) -> Self {
        Self::parse(selector).unwrap_or_default()
    }

    /// Wire name of this curve.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Loss => "loss",
            Self::Sin => "sin",
            Self::Accuracy => "accuracy",
            Self::Linear => "linear",
            Self::Exponential => "exponential",
            Self::Logarithmic => "logarithmic",
            Self::Cosine => "cosine",
            Self::Polynomial => "polynomial",
            Self::RandomWalk => "randomWalk",
            Self::Step => "step",
            Self::Sigmoid => "sigmoid",
            Self::Tanh => "tanh",
            Self::DampedSine => "dampedSine",
            Self::Sawtooth => "sawtooth",
            Self::Gaussian => "gaussian",
            Self::Logistic => "logistic",
        }
    }

    /// Spread factor for line offsets.
    #[must_use]
    pub const fn separation(self) -> f64 {
        match self {
            Self::Loss | Self::Accuracy => 0.08,
            Self::RandomWalk => 2.5,
            _ => 1.0,
        }
    }

    /// Raw value at position `t` with centered `noise`. `walk` is the
    /// line's accumulator and is only touched by [`Curve::RandomWalk`].
    #[must_use]
    pub fn sample(self, t: f64, noise: f64, walk: &mut f64) -> f64 {
        match self {
            Self::Loss => (-3.0 * t).exp() * 0.3f64.mul_add(noise, 0.85),
            Self::Sin => (4.0 * PI * t).sin() * 0.3f64.mul_add(noise, 0.85),
            Self::Accuracy => {
                (0.5 + 0.4 * t + 0.1 * (2.0 * PI * t).sin() + 0.08 * noise).min(1.0)
            }
            Self::Linear => 100.0f64.mul_add(t, 5.0 * noise),
            Self::Exponential => 10.0f64.mul_add((4.0 * t).exp(), 20.0 * noise),
            Self::Logarithmic => 2.0f64.mul_add((10.0 * t).ln_1p(), 0.5 * noise),
            Self::Cosine => (4.0 * PI * t).cos() * 0.3f64.mul_add(noise, 0.85),
            Self::Polynomial => 50.0f64.mul_add(2.0f64.mul_add(t, -1.0).powi(3), 5.0 * noise),
            Self::RandomWalk => {
                *walk += 2.0 * noise;
                *walk
            }
            Self::Step => 2.0f64.mul_add((5.0 * t).floor(), 0.3 * noise),
            Self::Sigmoid => logistic(t) + 0.05 * noise,
            Self::Tanh => (6.0 * (t - 0.5)).tanh() + 0.1 * noise,
            Self::DampedSine => {
                (-2.0 * t).exp() * (8.0 * PI * t).sin() * 0.2f64.mul_add(noise.abs(), 0.9)
            }
            Self::Sawtooth => 2.0f64.mul_add((4.0 * t).rem_euclid(1.0), -1.0) + 0.1 * noise,
            Self::Gaussian => (-(t - 0.5).powi(2) / 0.045).exp() + 0.05 * noise,
            Self::Logistic => logistic(t) * 0.1f64.mul_add(noise.abs(), 0.95),
        }
    }
}

fn logistic(t: f64) -> f64 {
    1.0 / (1.0 + (-10.0 * (t - 0.5)).exp())
}

/// Per-line shaping computed once before the main loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineParams {
    /// Multiplier applied to the raw curve value.
    pub amplitude_mul: f64,
    /// Multiplier applied to the normalized position.
    pub frequency_mul: f64,
    /// Shift added to the scaled position.
    pub phase_add: f64,
    /// Vertical offset separating lines.
    pub offset: f64,
}

impl LineParams {
    /// Parameters for line `index` of `line_count`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn for_line(index: usize, line_count: usize, separation: f64) -> Self {
        let frac = if line_count > 1 {
            index as f64 / (line_count - 1) as f64
        } else {
            0.0
        };
        let phase = frac * 2.0 * PI;
        Self {
            amplitude_mul: frac.mul_add(0.3, 0.85),
            frequency_mul: (phase * 0.7).sin().mul_add(0.12, 0.9),
            phase_add: phase * 0.15,
            offset: (frac - 0.5) * separation * 10.0,
        }
    }

    /// Line-local position for global position `t`.
    #[must_use]
    pub fn position(&self, t: f64) -> f64 {
        t.mul_add(self.frequency_mul, self.phase_add)
    }

    /// Scale and shift a raw curve value.
    #[must_use]
    pub fn apply(&self, raw: f64) -> f64 {
        raw.mul_add(self.amplitude_mul, self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_selector_round_trips() {
        for curve in Curve::ALL {
            assert_eq!(Curve::parse(curve.as_str()), Some(curve));
        }
    }

    #[test]
    fn unknown_selector_falls_back_to_sin() {
        assert_eq!(Curve::parse("zigzag"), None);
        assert_eq!(Curve::from_selector("zigzag"), Curve::Sin);
        assert_eq!(Curve::from_selector(""), Curve::Sin);
    }

    #[test]
    fn serde_names_match_selectors() {
        for curve in Curve::ALL {
            let json = serde_json::to_string(&curve).unwrap();
            assert_eq!(json, format!("\"{}\"", curve.as_str()));
        }
    }

    #[test]
    fn noiseless_values() {
        let mut walk = 0.0;
        assert!((Curve::Linear.sample(0.5, 0.0, &mut walk) - 50.0).abs() < 1e-12);
        assert!((Curve::Loss.sample(0.0, 0.0, &mut walk) - 0.85).abs() < 1e-12);
        assert!((Curve::Sigmoid.sample(0.5, 0.0, &mut walk) - 0.5).abs() < 1e-12);
        assert!((Curve::Gaussian.sample(0.5, 0.0, &mut walk) - 1.0).abs() < 1e-12);
        assert!((Curve::Step.sample(0.99, 0.0, &mut walk) - 8.0).abs() < 1e-12);
        assert!((Curve::Sawtooth.sample(0.125, 0.0, &mut walk) - 0.0).abs() < 1e-12);
        assert!(Curve::Polynomial.sample(0.0, 0.0, &mut walk) + 50.0 < 1e-12);
        assert!(Curve::Accuracy.sample(10.0, 0.5, &mut walk) <= 1.0);
        assert!(walk.abs() < f64::EPSILON);
    }

    #[test]
    fn random_walk_accumulates() {
        let mut walk = 0.0;
        assert!((Curve::RandomWalk.sample(0.0, 0.25, &mut walk) - 0.5).abs() < 1e-12);
        assert!((Curve::RandomWalk.sample(0.1, -0.5, &mut walk) + 0.5).abs() < 1e-12);
        assert!((walk + 0.5).abs() < 1e-12);
    }

    #[test]
    fn separation_per_curve() {
        assert!((Curve::Loss.separation() - 0.08).abs() < f64::EPSILON);
        assert!((Curve::Accuracy.separation() - 0.08).abs() < f64::EPSILON);
        assert!((Curve::RandomWalk.separation() - 2.5).abs() < f64::EPSILON);
        assert!((Curve::Tanh.separation() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn single_line_params() {
        let p = LineParams::for_line(0, 1, 1.0);
        assert!((p.amplitude_mul - 0.85).abs() < 1e-12);
        assert!((p.frequency_mul - 0.9).abs() < 1e-12);
        assert!(p.phase_add.abs() < 1e-12);
        assert!((p.offset + 5.0).abs() < 1e-12);
        assert!((p.position(0.5) - 0.45).abs() < 1e-12);
        assert!((p.apply(2.0) - (1.7 - 5.0)).abs() < 1e-12);
    }

    #[test]
    fn last_line_params() {
        let p = LineParams::for_line(3, 4, 2.5);
        assert!((p.amplitude_mul - 1.15).abs() < 1e-12);
        assert!((p.phase_add - 2.0 * PI * 0.15).abs() < 1e-12);
        assert!((p.offset - 12.5).abs() < 1e-12);
    }
}
