//! Log-scale normalisation of raw solver output.
//!
//! Abundances, fluxes and complexity span many orders of magnitude, so the
//! UI works with `log10` interpolated scores instead.

use serde::{Deserialize, Serialize};

/// What happens above the upper bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Overflow {
    /// Hard clamp to 1.
    Clamp,
    /// Keep growing proportionally, `value / max`.
    Extrapolate,
}

/// Maps `[min, max]` onto `[0, 1]` linearly in log10-space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogScale {
    pub min: f64,
    pub max: f64,
    pub overflow: Overflow,
}

impl LogScale {
    pub fn new(min: f64, max: f64, overflow: Overflow) -> Self {
        LogScale { min, max, overflow }
    }

    /// Non-finite input counts as degenerate and maps to 0.
    pub fn normalise(&self, value: f64) -> f64 {
        if !value.is_finite() || value <= self.min {
            return 0.0;
        }
        if value >= self.max {
            return match self.overflow {
                Overflow::Clamp => 1.0,
                Overflow::Extrapolate => value / self.max,
            };
        }
        let (lo, hi) = (self.min.log10(), self.max.log10());
        (value.log10() - lo) / (hi - lo)
    }

    /// Negative values go through the same curve on their magnitude and come
    /// back negated. Non-finite input is maximally infeasible.
    pub fn normalise_signed(&self, value: f64) -> f64 {
        if !value.is_finite() {
            return -self.normalise(self.max);
        }
        if value > 0.0 {
            self.normalise(value)
        } else {
            -self.normalise(-value)
        }
    }
}

/// log10-space interpolation, `min^(1-t) · max^t`.
pub fn unnormalise_on_log_scale(normalised: f64, min: f64, max: f64) -> f64 {
    min.powf(1.0 - normalised) * max.powf(normalised)
}
