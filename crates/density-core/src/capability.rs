//! Numeric backends for optional statistics and their negotiation.
//!
//! Each optional statistic is backed by an injected strategy. A statistic
//! whose strategy is missing is switched off for the run with a single
//! advisory instead of failing.

use crate::config::StatisticsSettings;
use crate::error::Advisory;
use std::fmt;
use std::sync::Arc;

/// Inverse CDF of the chi-squared distribution.
pub trait ChiSquaredQuantile: Send + Sync {
    /// Quantile `p` of a chi-squared distribution with `dof` degrees of freedom.
    fn quantile(&self, p: f64, dof: f64) -> Option<f64>;
}

/// Order-preserving grouped maximum.
pub trait GroupedMax: Send + Sync {
    /// Maximum of `values` per group id; groups with no values yield `f64::NEG_INFINITY`.
    fn grouped_max(&self, values: &[f64], groups: &[usize], group_count: usize) -> Vec<f64>;
}

/// Plain single-pass reduction.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortableGroupedMax;

impl GroupedMax for PortableGroupedMax {
    fn grouped_max(&self, values: &[f64], groups: &[usize], group_count: usize) -> Vec<f64> {
        let mut out = vec![f64::NEG_INFINITY; group_count];
        for (value, group) in values.iter().zip(groups) {
            if let Some(slot) = out.get_mut(*group) {
                if *value > *slot {
                    *slot = *value;
                }
            }
        }
        out
    }
}

#[cfg(feature = "statrs")]
#[derive(Debug, Clone, Copy, Default)]
pub struct StatrsChiSquared;

#[cfg(feature = "statrs")]
impl ChiSquaredQuantile for StatrsChiSquared {
    fn quantile(&self, p: f64, dof: f64) -> Option<f64> {
        use statrs::distribution::{ChiSquared, ContinuousCDF};

        if !(0.0..1.0).contains(&p) || !dof.is_finite() || dof <= 0.0 {
            return None;
        }
        let dist = ChiSquared::new(dof).ok()?;
        let value = dist.inverse_cdf(p);
        value.is_finite().then_some(value)
    }
}

/// Strategies available to a run.
#[derive(Clone)]
pub struct Capabilities {
    pub chi_squared: Option<Arc<dyn ChiSquaredQuantile>>,
    pub grouped_max: Option<Arc<dyn GroupedMax>>,
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("chi_squared", &self.chi_squared.is_some())
            .field("grouped_max", &self.grouped_max.is_some())
            .finish()
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            chi_squared: default_chi_squared(),
            grouped_max: Some(Arc::new(PortableGroupedMax)),
        }
    }
}

#[cfg(feature = "statrs")]
fn default_chi_squared() -> Option<Arc<dyn ChiSquaredQuantile>> {
    Some(Arc::new(StatrsChiSquared))
}

#[cfg(not(feature = "statrs"))]
fn default_chi_squared() -> Option<Arc<dyn ChiSquaredQuantile>> {
    None
}

impl Capabilities {
    /// No optional backends at all.
    pub fn none() -> Self {
        Self {
            chi_squared: None,
            grouped_max: None,
        }
    }

    /// Settings actually honoured by this backend set, plus one advisory per
    /// statistic that had to be switched off.
    pub fn negotiate(&self, requested: &StatisticsSettings) -> (StatisticsSettings, Vec<Advisory>) {
        let mut effective = requested.clone();
        let mut advisories = Vec::new();

        if requested.compute_ub && self.chi_squared.is_none() {
            effective.compute_ub = false;
            advisories.push(Advisory::CapabilityUnavailable {
                statistic: "computeub".to_string(),
            });
        }
        if requested.compute_max && self.grouped_max.is_none() {
            effective.compute_max = false;
            advisories.push(Advisory::CapabilityUnavailable {
                statistic: "computemax".to_string(),
            });
        }

        for advisory in &advisories {
            advisory.log();
        }
        if requested.any() {
            tracing::info!(
                "Statistics negotiated: ub={} max={} std={}",
                effective.compute_ub,
                effective.compute_max,
                effective.compute_std
            );
        }
        (effective, advisories)
    }
}
