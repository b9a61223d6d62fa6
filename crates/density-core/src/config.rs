//! Run configuration.
//!
//! Value types that carry invariants (`AreaBounds`, `CollisionGeometry`,
//! `Track`) validate at construction and on deserialisation. Plain setting
//! bags are checked together by `RunConfig::validate` before any work starts.

use crate::error::{DensityError, Result};
use crate::grid::AltitudeBoundaryRule;
use crate::track::Track;
use serde::{Deserialize, Serialize};

/// Geographic rectangle plus an optional subset of altitude bins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AreaBoundsSpec", into = "AreaBoundsSpec")]
pub struct AreaBounds {
    lat_min: f64,
    lat_max: f64,
    lon_min: f64,
    lon_max: f64,
    altitude_bins: Option<Vec<usize>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AreaBoundsSpec {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude_bins: Option<Vec<usize>>,
}

impl TryFrom<AreaBoundsSpec> for AreaBounds {
    type Error = DensityError;

    fn try_from(spec: AreaBoundsSpec) -> Result<Self> {
        let bounds = AreaBounds::new(spec.lat_min, spec.lat_max, spec.lon_min, spec.lon_max)?;
        match spec.altitude_bins {
            Some(bins) => bounds.with_altitude_bins(bins),
            None => Ok(bounds),
        }
    }
}

impl From<AreaBounds> for AreaBoundsSpec {
    fn from(bounds: AreaBounds) -> Self {
        Self {
            lat_min: bounds.lat_min,
            lat_max: bounds.lat_max,
            lon_min: bounds.lon_min,
            lon_max: bounds.lon_max,
            altitude_bins: bounds.altitude_bins,
        }
    }
}

impl AreaBounds {
    pub fn new(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> Result<Self> {
        let finite = [lat_min, lat_max, lon_min, lon_max]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err(DensityError::config("area bounds must be finite"));
        }
        if !(-90.0..=90.0).contains(&lat_min) || !(-90.0..=90.0).contains(&lat_max) {
            return Err(DensityError::config("area latitude outside [-90, 90]"));
        }
        if lat_min >= lat_max || lon_min >= lon_max {
            return Err(DensityError::config(format!(
                "area bounds are empty: lat [{}, {}], lon [{}, {}]",
                lat_min, lat_max, lon_min, lon_max
            )));
        }
        Ok(Self {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
            altitude_bins: None,
        })
    }

    /// Restrict the area to the given altitude bins.
    pub fn with_altitude_bins(mut self, mut bins: Vec<usize>) -> Result<Self> {
        bins.sort_unstable();
        bins.dedup();
        if bins.is_empty() {
            return Err(DensityError::config("altitude bin selection is empty"));
        }
        self.altitude_bins = Some(bins);
        Ok(self)
    }

    pub fn lat_min(&self) -> f64 {
        self.lat_min
    }

    pub fn lat_max(&self) -> f64 {
        self.lat_max
    }

    pub fn lon_min(&self) -> f64 {
        self.lon_min
    }

    pub fn lon_max(&self) -> f64 {
        self.lon_max
    }

    pub fn altitude_bins(&self) -> Option<&[usize]> {
        self.altitude_bins.as_deref()
    }
}

/// Selection along one table axis. `None` selects every index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AxisFilter(Option<Vec<usize>>);

impl AxisFilter {
    pub fn all() -> Self {
        Self(None)
    }

    pub fn only(indices: impl IntoIterator<Item = usize>) -> Self {
        Self(Some(indices.into_iter().collect()))
    }

    /// Sorted, de-duplicated indices for an axis of `len` entries.
    pub fn indices(&self, axis: &str, len: usize) -> Result<Vec<usize>> {
        let Some(selected) = &self.0 else {
            return Ok((0..len).collect());
        };
        let mut indices = selected.clone();
        indices.sort_unstable();
        indices.dedup();
        if indices.is_empty() {
            return Err(DensityError::config(format!("{} filter selects nothing", axis)));
        }
        if let Some(bad) = indices.iter().find(|i| **i >= len) {
            return Err(DensityError::config(format!(
                "{} filter index {} outside 0..{}",
                axis, bad, len
            )));
        }
        Ok(indices)
    }
}

/// Filters over the table's reduction axes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeFilters {
    #[serde(alias = "timeofday")]
    pub time_of_day: AxisFilter,
    #[serde(alias = "dayofweek")]
    pub day_of_week: AxisFilter,
    #[serde(alias = "monthofyear")]
    pub month_of_year: AxisFilter,
    #[serde(alias = "ACcategory")]
    pub categories: AxisFilter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageSettings {
    /// Inflate counts by the inverse coverage fraction.
    #[serde(alias = "correctcoverage")]
    pub correct: bool,
    /// Cells with coverage below this are excluded; 0 admits every cell.
    #[serde(alias = "noCoverageThreshold")]
    pub no_coverage_threshold: f64,
}

impl Default for CoverageSettings {
    fn default() -> Self {
        Self {
            correct: false,
            no_coverage_threshold: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoncoopSettings {
    #[serde(alias = "processNoncoop")]
    pub enabled: bool,
    /// Scale applied to 1200-code counts when enabled.
    #[serde(alias = "noncoopFactor")]
    pub factor: f64,
}

impl Default for NoncoopSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            factor: 1.0,
        }
    }
}

impl NoncoopSettings {
    /// Weight of 1200-code counts in the blended count.
    pub fn code1200_weight(&self) -> f64 {
        if self.enabled {
            self.factor
        } else {
            1.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsSettings {
    #[serde(alias = "computeub")]
    pub compute_ub: bool,
    #[serde(alias = "computemax")]
    pub compute_max: bool,
    #[serde(alias = "computestd")]
    pub compute_std: bool,
    /// Significance level of the two-sided Poisson interval.
    #[serde(alias = "cialpha")]
    pub ci_alpha: f64,
    /// Independent observations per observed hour.
    #[serde(alias = "ciIndObsPerHr")]
    pub ci_ind_obs_per_hr: f64,
}

impl Default for StatisticsSettings {
    fn default() -> Self {
        Self {
            compute_ub: false,
            compute_max: false,
            compute_std: false,
            ci_alpha: 0.05,
            ci_ind_obs_per_hr: 60.0,
        }
    }
}

impl StatisticsSettings {
    pub fn any(&self) -> bool {
        self.compute_ub || self.compute_max || self.compute_std
    }
}

/// Conflict cylinder: radius is the sum of half-wingspans, height the sum of half-heights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CollisionGeometrySpec", into = "CollisionGeometrySpec")]
pub struct CollisionGeometry {
    radius_ft: f64,
    height_ft: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CollisionGeometrySpec {
    #[serde(alias = "macR")]
    pub radius_ft: f64,
    #[serde(alias = "macH")]
    pub height_ft: f64,
}

impl TryFrom<CollisionGeometrySpec> for CollisionGeometry {
    type Error = DensityError;

    fn try_from(spec: CollisionGeometrySpec) -> Result<Self> {
        CollisionGeometry::new(spec.radius_ft, spec.height_ft)
    }
}

impl From<CollisionGeometry> for CollisionGeometrySpec {
    fn from(geometry: CollisionGeometry) -> Self {
        Self {
            radius_ft: geometry.radius_ft,
            height_ft: geometry.height_ft,
        }
    }
}

impl Default for CollisionGeometry {
    fn default() -> Self {
        // 2 * 500 ft wide, 200 ft tall: the NMAC cross-section
        Self {
            radius_ft: 500.0,
            height_ft: 200.0,
        }
    }
}

impl CollisionGeometry {
    pub fn new(radius_ft: f64, height_ft: f64) -> Result<Self> {
        let valid = radius_ft.is_finite() && height_ft.is_finite() && radius_ft > 0.0 && height_ft > 0.0;
        if !valid {
            return Err(DensityError::config(format!(
                "collision cylinder must be positive: macR={} macH={}",
                radius_ft, height_ft
            )));
        }
        Ok(Self {
            radius_ft,
            height_ft,
        })
    }

    pub fn radius_ft(&self) -> f64 {
        self.radius_ft
    }

    pub fn height_ft(&self) -> f64 {
        self.height_ft
    }
}

/// Airspace-class selection on the per-cell class fractions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirspaceClassFilter {
    pub classes: Vec<String>,
    /// Minimum summed fraction of the named classes for a cell to count.
    #[serde(default = "default_min_fraction")]
    pub min_fraction: f64,
}

fn default_min_fraction() -> f64 {
    0.5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationMode {
    Area(AreaBounds),
    Track(Track),
}

/// Everything that drives one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub mode: EvaluationMode,
    #[serde(default)]
    pub filters: TimeFilters,
    #[serde(default)]
    pub coverage: CoverageSettings,
    #[serde(default)]
    pub noncoop: NoncoopSettings,
    /// Overrides model- or track-derived own speed.
    #[serde(default, alias = "ownspeed")]
    pub own_speed_kts: Option<f64>,
    #[serde(default)]
    pub geometry: CollisionGeometry,
    #[serde(default)]
    pub statistics: StatisticsSettings,
    #[serde(default)]
    pub airspace_class: Option<AirspaceClassFilter>,
    #[serde(default)]
    pub altitude_rule: AltitudeBoundaryRule,
}

impl RunConfig {
    pub fn area(bounds: AreaBounds) -> Self {
        Self::with_mode(EvaluationMode::Area(bounds))
    }

    pub fn track(track: Track) -> Self {
        Self::with_mode(EvaluationMode::Track(track))
    }

    fn with_mode(mode: EvaluationMode) -> Self {
        Self {
            mode,
            filters: TimeFilters::default(),
            coverage: CoverageSettings::default(),
            noncoop: NoncoopSettings::default(),
            own_speed_kts: None,
            geometry: CollisionGeometry::default(),
            statistics: StatisticsSettings::default(),
            airspace_class: None,
            altitude_rule: AltitudeBoundaryRule::default(),
        }
    }

    pub fn with_filters(mut self, filters: TimeFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_coverage(mut self, correct: bool, no_coverage_threshold: f64) -> Self {
        self.coverage = CoverageSettings {
            correct,
            no_coverage_threshold,
        };
        self
    }

    pub fn with_noncoop(mut self, factor: f64) -> Self {
        self.noncoop = NoncoopSettings {
            enabled: true,
            factor,
        };
        self
    }

    pub fn with_own_speed(mut self, own_speed_kts: f64) -> Self {
        self.own_speed_kts = Some(own_speed_kts);
        self
    }

    pub fn with_geometry(mut self, geometry: CollisionGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn with_statistics(mut self, statistics: StatisticsSettings) -> Self {
        self.statistics = statistics;
        self
    }

    pub fn with_airspace_class(mut self, filter: AirspaceClassFilter) -> Self {
        self.airspace_class = Some(filter);
        self
    }

    pub fn with_altitude_rule(mut self, rule: AltitudeBoundaryRule) -> Self {
        self.altitude_rule = rule;
        self
    }

    /// Check the setting bags; fails before any computation starts.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.coverage.no_coverage_threshold;
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(DensityError::config(format!(
                "noCoverageThreshold {} outside [0, 1]",
                threshold
            )));
        }
        if !self.noncoop.factor.is_finite() || self.noncoop.factor < 0.0 {
            return Err(DensityError::config(format!(
                "noncoopFactor {} must be non-negative",
                self.noncoop.factor
            )));
        }
        if let Some(speed) = self.own_speed_kts {
            if !speed.is_finite() || speed < 0.0 {
                return Err(DensityError::config(format!(
                    "ownspeed {} must be non-negative",
                    speed
                )));
            }
        }
        let stats = &self.statistics;
        if !(stats.ci_alpha > 0.0 && stats.ci_alpha < 1.0) {
            return Err(DensityError::config(format!(
                "cialpha {} outside (0, 1)",
                stats.ci_alpha
            )));
        }
        if !stats.ci_ind_obs_per_hr.is_finite() || stats.ci_ind_obs_per_hr <= 0.0 {
            return Err(DensityError::config(format!(
                "ciIndObsPerHr {} must be positive",
                stats.ci_ind_obs_per_hr
            )));
        }
        if let Some(filter) = &self.airspace_class {
            if filter.classes.is_empty() {
                return Err(DensityError::config("airspace class filter names no class"));
            }
            if !(0.0..=1.0).contains(&filter.min_fraction) {
                return Err(DensityError::config(format!(
                    "airspace class min_fraction {} outside [0, 1]",
                    filter.min_fraction
                )));
            }
        }
        Ok(())
    }
}
