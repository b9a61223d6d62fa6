//! Result of one evaluation.

use crate::engine::CellDensity;
use crate::error::Advisory;
use crate::filter::ValidityMask;
use crate::grid::AltitudeReference;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeKind {
    Area,
    Track,
}

/// Aircraft count behind a result.
///
/// Area mode: `aircraft` is the mean number of aircraft inside the selected
/// volume. Track mode: `aircraft` is the expected number of encounters along
/// the track. `aircraft_hours` is always the observed aircraft-hours used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Count {
    pub aircraft: f64,
    pub aircraft_hours: f64,
}

/// Cell density plus the collision rate it implies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellResult {
    #[serde(flatten)]
    pub density: CellDensity,
    pub relative_speed_kts: f64,
    /// Encounters per hour for an aircraft flying through this cell.
    pub rate: f64,
}

/// Roll-up of one altitude bin over the evaluated region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AltitudeSummary {
    pub altitude_bin: usize,
    pub reference: AltitudeReference,
    /// Bin edges in the bin's own reference frame (ft).
    pub lower_ft: f64,
    pub upper_ft: f64,
    pub cells: usize,
    pub count: f64,
    pub exposure: f64,
    pub density: f64,
    pub aircraft: f64,
    pub relative_speed_kts: f64,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AirspaceShare {
    pub class: String,
    pub fraction: f64,
}

/// Optional regional statistics; `None` when not requested or unavailable.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RegionStatistics {
    pub density_ub: Option<f64>,
    pub rate_ub: Option<f64>,
    pub density_max: Option<f64>,
}

/// Per-sample detail of a track evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackPoint {
    pub index: usize,
    pub time_s: f64,
    pub cell: Option<(usize, usize)>,
    pub altitude_bin: Option<usize>,
    pub density: f64,
    pub own_speed_kts: f64,
    pub relative_speed_kts: f64,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackResult {
    pub points: Vec<TrackPoint>,
    pub expected_encounters: f64,
    pub duration_hr: f64,
    pub distance_nm: f64,
    pub samples_with_data: usize,
}

/// Everything a reporting collaborator reads after a run.
#[derive(Debug, Clone, Serialize)]
pub struct Output {
    pub mode: ModeKind,
    /// AC/NM³: regional aggregate (area) or time-mean along the track.
    pub density: f64,
    /// Expected encounters per hour.
    pub rate: f64,
    pub count: Count,
    pub summarize: Vec<AltitudeSummary>,
    pub airspace_class: Vec<AirspaceShare>,
    pub statistics: RegionStatistics,
    pub cells: Vec<CellResult>,
    pub track: Option<TrackResult>,
    pub mask: ValidityMask,
    pub lat_cutpoints: Vec<f64>,
    pub lon_cutpoints: Vec<f64>,
    pub advisories: Vec<Advisory>,
}
