//! # Timing Estimator
//!
//! Smoothed oracle latency per search horizon, with power-law extrapolation
//! to horizons not yet tried. Display only: estimates never gate a query.

use crate::config::{
    DEFAULT_TIMING_TABLE, TIMING_EMA_WEIGHT, TIMING_REFERENCE_HORIZON, TIMING_REFERENCE_MS,
};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lowest sample value used in log-log fits.
const MIN_SAMPLE_MS: f64 = 1.0;

/// Exponent of the fallback power law (cost grows as horizon⁴).
const FALLBACK_EXPONENT: f64 = 4.0;

/// Session-scoped latency table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimingEstimator {
    samples: BTreeMap<u32, f64>,
}

impl TimingEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds a measured latency into the smoothed sample for `horizon`.
    pub fn record_sample(&mut self, horizon: u32, ms: f64) {
        if !ms.is_finite() || ms < 0.0 {
            debug!("Ignoring timing sample {} ms for horizon {}", ms, horizon);
            return;
        }

        let smoothed = match self.samples.get(&horizon) {
            Some(&old) => (1.0 - TIMING_EMA_WEIGHT) * old + TIMING_EMA_WEIGHT * ms,
            None => ms,
        };
        debug!("Horizon {} now estimated at {:.1} ms", horizon, smoothed);
        self.samples.insert(horizon, smoothed);
    }

    /// Smoothed sample for exactly this horizon, if any.
    pub fn sample(&self, horizon: u32) -> Option<f64> {
        self.samples.get(&horizon).copied()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Expected latency in milliseconds for `target`.
    pub fn estimate(&self, target: u32) -> f64 {
        if let Some(ms) = self.sample(target) {
            return ms;
        }

        match self.samples.len() {
            0 => DEFAULT_TIMING_TABLE
                .iter()
                .find(|(horizon, _)| *horizon == target)
                .map(|&(_, ms)| ms)
                .unwrap_or_else(|| {
                    quartic(TIMING_REFERENCE_HORIZON, TIMING_REFERENCE_MS, target)
                }),
            1 => {
                let (&horizon, &ms) = self.nearest(target);
                quartic(horizon, ms, target)
            }
            _ => self.power_law(target),
        }
    }

    fn nearest(&self, target: u32) -> (&u32, &f64) {
        // Callers guarantee at least one sample.
        self.samples
            .iter()
            .min_by_key(|(horizon, _)| horizon.abs_diff(target))
            .unwrap_or((&TIMING_REFERENCE_HORIZON, &TIMING_REFERENCE_MS))
    }

    /// Fits `ms = c * horizon^p` through two observed horizons.
    fn power_law(&self, target: u32) -> f64 {
        let below = self.samples.range(..target).next_back();
        let above = self.samples.range(target..).next();

        let (a, b) = match (below, above) {
            (Some(lo), Some(hi)) => (lo, hi),
            (Some(_), None) => {
                let mut it = self.samples.iter().rev();
                match (it.next(), it.next()) {
                    (Some(hi), Some(lo)) => (lo, hi),
                    _ => return self.fallback(target),
                }
            }
            (None, Some(_)) => {
                let mut it = self.samples.iter();
                match (it.next(), it.next()) {
                    (Some(lo), Some(hi)) => (lo, hi),
                    _ => return self.fallback(target),
                }
            }
            (None, None) => return self.fallback(target),
        };

        let (h1, m1) = (f64::from(*a.0), a.1.max(MIN_SAMPLE_MS));
        let (h2, m2) = (f64::from(*b.0), b.1.max(MIN_SAMPLE_MS));
        let exponent = (m2.ln() - m1.ln()) / (h2.ln() - h1.ln());
        let estimate = m1 * (f64::from(target) / h1).powf(exponent);

        if estimate.is_finite() {
            estimate
        } else {
            self.fallback(target)
        }
    }

    fn fallback(&self, target: u32) -> f64 {
        let (&horizon, &ms) = self.nearest(target);
        quartic(horizon, ms, target)
    }
}

fn quartic(horizon: u32, ms: f64, target: u32) -> f64 {
    if horizon == 0 {
        return ms;
    }
    ms * (f64::from(target) / f64::from(horizon)).powf(FALLBACK_EXPONENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ema_smoothing() {
        let mut timing = TimingEstimator::new();
        timing.record_sample(25, 1000.0);
        assert_eq!(timing.sample(25), Some(1000.0));

        timing.record_sample(25, 2000.0);
        assert!((timing.sample(25).unwrap() - 1300.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_uses_table_then_quartic() {
        let timing = TimingEstimator::new();
        assert_eq!(timing.estimate(15), 250.0);
        assert_eq!(timing.estimate(35), 3500.0);
        assert!((timing.estimate(50) - 16000.0).abs() < 1e-6);
    }

    #[test]
    fn test_single_sample_scales_quartically() {
        let mut timing = TimingEstimator::new();
        timing.record_sample(10, 100.0);
        assert!((timing.estimate(20) - 1600.0).abs() < 1e-6);
    }

    #[test]
    fn test_bracketing_fit() {
        let mut timing = TimingEstimator::new();
        timing.record_sample(25, 1000.0);
        timing.record_sample(50, 16000.0);

        let estimate = timing.estimate(35);
        assert!(estimate > 1000.0 && estimate < 16000.0);
        assert!(timing.estimate(30) < estimate);
        assert!(estimate < timing.estimate(40));
    }

    #[test]
    fn test_extrapolates_outside_range() {
        let mut timing = TimingEstimator::new();
        timing.record_sample(10, 10.0);
        timing.record_sample(20, 40.0);
        timing.record_sample(30, 90.0);

        // Two highest samples: 40 ms @ 20 and 90 ms @ 30, exponent 2.
        assert!((timing.estimate(60) - 360.0).abs() < 1e-6);
        // Two lowest samples for targets below the range.
        assert!((timing.estimate(5) - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_zero_latency_samples_stay_finite() {
        let mut timing = TimingEstimator::new();
        timing.record_sample(10, 0.0);
        timing.record_sample(20, 0.0);
        assert!(timing.estimate(15).is_finite());
    }

    #[test]
    fn test_rejects_invalid_samples() {
        let mut timing = TimingEstimator::new();
        timing.record_sample(10, f64::NAN);
        timing.record_sample(10, -5.0);
        assert_eq!(timing.sample_count(), 0);
    }
}
