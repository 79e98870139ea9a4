/// Maps launches to the usage weight used for ranking. Pluggable because the
/// exact curve is a tuning decision.
pub trait WeightStrategy: Send + Sync {
    /// New weight of the item that was just launched.
    fn launched(&self, weight: f64, launch_count: u32) -> f64;

    /// New weight of every other item after a launch.
    fn decayed(&self, weight: f64) -> f64;
}

/// Exponential moving average: recently launched items outrank items that
/// were merely launched often a long time ago.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialAverage {
    pub alpha: f64,
}

const NEGLIGIBLE_WEIGHT: f64 = 0.001;

impl ExponentialAverage {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
        }
    }
}

impl Default for ExponentialAverage {
    fn default() -> Self {
        Self::new(0.03)
    }
}

impl WeightStrategy for ExponentialAverage {
    fn launched(&self, weight: f64, _launch_count: u32) -> f64 {
        weight + self.alpha * (1.0 - weight)
    }

    fn decayed(&self, weight: f64) -> f64 {
        if weight > NEGLIGIBLE_WEIGHT {
            weight * (1.0 - self.alpha)
        } else {
            weight
        }
    }
}
