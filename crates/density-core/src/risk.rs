//! Collision-rate evaluators.
//!
//! Both modes turn density into encounters per hour with the swept
//! conflict-cylinder model: an aircraft moving at relative speed `v` through
//! traffic of density `ρ` sweeps a cross-section `2·macR × macH`, so
//! `rate = ρ · v · 2·macR·macH` (NM, kts, AC/NM³ → 1/hr).
//!
//! Area mode aggregates over a static region; track mode integrates the
//! instantaneous rate along a time-ordered flight path.

use crate::config::CollisionGeometry;
use crate::dataset::Dataset;
use crate::encounter::TrafficMix;
use crate::engine::{CellDensity, DensityField};
use crate::error::Advisory;
use crate::filter::ValidityMask;
use crate::grid::AltitudeBoundaryRule;
use crate::output::{AirspaceShare, AltitudeSummary, CellResult, TrackPoint, TrackResult};
use crate::spatial::{feet_to_nm, SECONDS_PER_HOUR};
use crate::table::DensityTable;
use crate::track::Track;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Swept cross-section `2·macR·macH` in NM².
pub fn cross_section_nm2(geometry: &CollisionGeometry) -> f64 {
    2.0 * feet_to_nm(geometry.radius_ft()) * feet_to_nm(geometry.height_ft())
}

/// Encounters per hour at density `density_ac_nm3` and closure speed `speed_kts`.
pub fn encounter_rate(density_ac_nm3: f64, speed_kts: f64, cross_section_nm2: f64) -> f64 {
    density_ac_nm3 * speed_kts * cross_section_nm2
}

/// Attach relative speed and rate to every cell of a density field.
pub fn cell_results(
    field: &DensityField,
    dataset: &Dataset,
    own_speed_kts: Option<f64>,
    cross_section: f64,
) -> Vec<CellResult> {
    field
        .cells
        .iter()
        .map(|cell| {
            let altitude_agl_ft = (cell.midpoint_msl_ft() - cell.terrain_ft).max(0.0);
            let mix = TrafficMix::new(cell.discrete_density, cell.code1200_density);
            let speed = dataset
                .encounter()
                .relative_speed(own_speed_kts, altitude_agl_ft, mix);
            CellResult {
                density: cell.clone(),
                relative_speed_kts: speed,
                rate: encounter_rate(cell.density, speed, cross_section),
            }
        })
        .collect()
}

/// Regional rate and its count-weighted relative speed.
///
/// `Σ count·v / Σ hours·volume · cross-section`, so splitting the region and
/// recombining the sums leaves the result unchanged.
pub fn regional_rate(results: &[CellResult], cross_section: f64) -> (f64, f64) {
    let weighted: f64 = results
        .iter()
        .map(|r| r.density.count * r.relative_speed_kts)
        .sum();
    let count: f64 = results.iter().map(|r| r.density.count).sum();
    let exposure: f64 = results.iter().map(|r| r.density.exposure()).sum();

    let speed = if count > 0.0 {
        weighted / count
    } else if results.is_empty() {
        0.0
    } else {
        results.iter().map(|r| r.relative_speed_kts).sum::<f64>() / results.len() as f64
    };
    let rate = if exposure > 0.0 {
        weighted / exposure * cross_section
    } else {
        0.0
    };
    (rate, speed)
}

/// Per-altitude-bin roll-up for plotting.
pub fn summarize(
    results: &[CellResult],
    table: &DensityTable,
    cross_section: f64,
) -> Vec<AltitudeSummary> {
    let mut by_bin: BTreeMap<usize, Vec<&CellResult>> = BTreeMap::new();
    for result in results {
        by_bin
            .entry(result.density.altitude_bin)
            .or_default()
            .push(result);
    }

    let edges = table.grid().altitude_edges_ft();
    by_bin
        .into_iter()
        .map(|(bin, members)| {
            let owned: Vec<CellResult> = members.iter().map(|r| (*r).clone()).collect();
            let (rate, speed) = regional_rate(&owned, cross_section);
            let count: f64 = owned.iter().map(|r| r.density.count).sum();
            let exposure: f64 = owned.iter().map(|r| r.density.exposure()).sum();
            let aircraft: f64 = owned
                .iter()
                .map(|r| r.density.density * r.density.volume_nm3)
                .sum();
            AltitudeSummary {
                altitude_bin: bin,
                reference: table.grid().reference_of(bin),
                lower_ft: edges[bin],
                upper_ft: edges[bin + 1],
                cells: owned.len(),
                count,
                exposure,
                density: if exposure > 0.0 { count / exposure } else { 0.0 },
                aircraft,
                relative_speed_kts: speed,
                rate,
            }
        })
        .collect()
}

/// Weighted mean of per-cell airspace-class fractions.
pub fn airspace_mix(
    table: &DensityTable,
    weighted_cells: impl IntoIterator<Item = ((usize, usize), f64)>,
) -> Vec<AirspaceShare> {
    let classes = table.airspace_classes();
    let mut sums = vec![0.0; classes.len()];
    let mut total_weight = 0.0;
    for ((row, col), weight) in weighted_cells {
        if weight <= 0.0 {
            continue;
        }
        for (sum, fraction) in sums.iter_mut().zip(table.airspace_fractions(row, col)) {
            *sum += weight * fraction;
        }
        total_weight += weight;
    }
    classes
        .iter()
        .zip(sums)
        .map(|(class, sum)| AirspaceShare {
            class: class.clone(),
            fraction: if total_weight > 0.0 {
                sum / total_weight
            } else {
                0.0
            },
        })
        .collect()
}

/// Area-weighted class mix over the cells admitted by a mask.
pub fn area_airspace_mix(table: &DensityTable, mask: &ValidityMask) -> Vec<AirspaceShare> {
    let grid = table.grid();
    let cells = mask
        .cells
        .iter()
        .map(|cell| {
            let area = grid.cell_area_nm2(cell.row, cell.col).unwrap_or(0.0);
            ((cell.row, cell.col), area)
        })
        .collect::<Vec<_>>();
    airspace_mix(table, cells)
}

/// Density at one sample, interpolated between adjacent altitude-bin midpoints.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Interpolated {
    density: f64,
    discrete: f64,
    code1200: f64,
}

/// Linear interpolation on bin midpoints; clamped to the outermost bins.
fn interpolate(column: &[&CellDensity], altitude_msl_ft: f64) -> Option<Interpolated> {
    let first = column.first()?;
    let last = column.last()?;
    let at = |cell: &CellDensity| Interpolated {
        density: cell.density,
        discrete: cell.discrete_density,
        code1200: cell.code1200_density,
    };
    if altitude_msl_ft <= first.midpoint_msl_ft() {
        return Some(at(first));
    }
    if altitude_msl_ft >= last.midpoint_msl_ft() {
        return Some(at(last));
    }
    let upper = column
        .iter()
        .position(|cell| cell.midpoint_msl_ft() > altitude_msl_ft)?;
    let (lo, hi) = (column[upper - 1], column[upper]);
    let span = hi.midpoint_msl_ft() - lo.midpoint_msl_ft();
    let w = if span > 0.0 {
        (altitude_msl_ft - lo.midpoint_msl_ft()) / span
    } else {
        0.0
    };
    let lerp = |a: f64, b: f64| a + (b - a) * w;
    Some(Interpolated {
        density: lerp(lo.density, hi.density),
        discrete: lerp(lo.discrete_density, hi.discrete_density),
        code1200: lerp(lo.code1200_density, hi.code1200_density),
    })
}

/// Track evaluation output before assembly.
pub struct TrackEvaluation {
    pub result: TrackResult,
    pub mean_density: f64,
    pub mean_relative_speed_kts: f64,
    pub airspace_class: Vec<AirspaceShare>,
    pub observed_aircraft_hours: f64,
    pub advisories: Vec<Advisory>,
}

/// Propagate along the track in time order, integrating `rate · dt`.
pub fn evaluate_track(
    track: &Track,
    field: &DensityField,
    dataset: &Dataset,
    own_speed_override: Option<f64>,
    cross_section: f64,
    rule: AltitudeBoundaryRule,
) -> TrackEvaluation {
    let table = dataset.table();
    let grid = table.grid();

    // column of non-empty layers per horizontal cell, bottom to top
    let mut columns: HashMap<(usize, usize), Vec<&CellDensity>> = HashMap::new();
    for cell in field.cells.iter().filter(|c| c.volume_nm3 > 0.0) {
        columns.entry((cell.row, cell.col)).or_default().push(cell);
    }
    for column in columns.values_mut() {
        column.sort_by_key(|cell| cell.altitude_bin);
    }

    let mut points = Vec::with_capacity(track.len());
    for (index, sample) in track.samples().iter().enumerate() {
        let own_speed_kts = own_speed_override.unwrap_or(sample.speed_kts);
        let cell = if grid.contains(sample.lat, sample.lon) {
            grid.cell_index(sample.lat, sample.lon).ok()
        } else {
            None
        };
        let resolved = cell.and_then(|key| {
            let column = columns.get(&key)?;
            interpolate(column, sample.altitude_msl_ft).map(|value| (key, value))
        });

        let point = match resolved {
            Some(((row, col), value)) => {
                let terrain_ft = table.terrain_ft(row, col);
                let altitude_agl_ft = (sample.altitude_msl_ft - terrain_ft).max(0.0);
                let speed = dataset.encounter().relative_speed(
                    Some(own_speed_kts),
                    altitude_agl_ft,
                    TrafficMix::new(value.discrete, value.code1200),
                );
                TrackPoint {
                    index,
                    time_s: sample.time_s,
                    cell: Some((row, col)),
                    altitude_bin: grid
                        .altitude_bin(sample.altitude_msl_ft, terrain_ft, rule)
                        .ok(),
                    density: value.density,
                    own_speed_kts,
                    relative_speed_kts: speed,
                    rate: encounter_rate(value.density, speed, cross_section),
                }
            }
            None => TrackPoint {
                index,
                time_s: sample.time_s,
                cell: None,
                altitude_bin: None,
                density: 0.0,
                own_speed_kts,
                relative_speed_kts: 0.0,
                rate: 0.0,
            },
        };
        points.push(point);
    }

    let mut expected_encounters = 0.0;
    let mut density_integral = 0.0;
    let mut speed_integral = 0.0;
    let mut covered_hours = 0.0;
    // time credited to each sample: half of each adjacent interval
    let mut sample_weights = vec![0.0; points.len()];
    for (i, pair) in points.windows(2).enumerate() {
        let dt_hr = (pair[1].time_s - pair[0].time_s) / SECONDS_PER_HOUR;
        expected_encounters += 0.5 * (pair[0].rate + pair[1].rate) * dt_hr;
        density_integral += 0.5 * (pair[0].density + pair[1].density) * dt_hr;
        for (j, point) in pair.iter().enumerate() {
            if point.cell.is_some() {
                speed_integral += 0.5 * point.relative_speed_kts * dt_hr;
                covered_hours += 0.5 * dt_hr;
                sample_weights[i + j] += 0.5 * dt_hr;
            }
        }
    }

    let duration_hr = track.duration_hr();
    let samples_with_data = points.iter().filter(|p| p.cell.is_some()).count();
    let mut advisories = Vec::new();
    if samples_with_data == 0 {
        advisories.push(Advisory::data_absence(
            "track lies entirely outside the gridded coverage",
        ));
    }

    let airspace_class = airspace_mix(
        table,
        points
            .iter()
            .zip(&sample_weights)
            .filter_map(|(p, w)| p.cell.map(|key| (key, *w)))
            .collect::<Vec<_>>(),
    );

    let touched: HashSet<(usize, usize)> = points.iter().filter_map(|p| p.cell).collect();
    let observed_aircraft_hours = field
        .cells
        .iter()
        .filter(|c| touched.contains(&(c.row, c.col)))
        .map(|c| c.raw_count)
        .sum();

    tracing::debug!(
        "Track: {} samples ({} with data), {:.4e} expected encounters over {:.3} hr",
        points.len(),
        samples_with_data,
        expected_encounters,
        duration_hr
    );

    TrackEvaluation {
        result: TrackResult {
            points,
            expected_encounters,
            duration_hr,
            distance_nm: track.distance_nm(),
            samples_with_data,
        },
        mean_density: if duration_hr > 0.0 {
            density_integral / duration_hr
        } else {
            0.0
        },
        mean_relative_speed_kts: if covered_hours > 0.0 {
            speed_integral / covered_hours
        } else {
            0.0
        },
        airspace_class,
        observed_aircraft_hours,
        advisories,
    }
}

impl TrackEvaluation {
    /// Encounters per hour averaged over the whole track.
    pub fn rate(&self) -> f64 {
        if self.result.duration_hr > 0.0 {
            self.result.expected_encounters / self.result.duration_hr
        } else {
            0.0
        }
    }
}
