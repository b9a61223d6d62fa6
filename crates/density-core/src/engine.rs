//! Density and statistics engine.
//!
//! Counts and hours are summed over the masked slots before dividing, both
//! per cell and for regional totals, so sparsely observed cells never
//! dominate an aggregate.

use crate::capability::Capabilities;
use crate::config::{CoverageSettings, NoncoopSettings, StatisticsSettings};
use crate::error::Advisory;
use crate::filter::ValidityMask;
use crate::grid::AltitudeReference;
use crate::spatial::feet_to_nm;
use crate::table::{DensityTable, TransponderClass};
use serde::Serialize;

/// Density of one masked cell and altitude bin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellDensity {
    pub row: usize,
    pub col: usize,
    pub altitude_bin: usize,
    pub lat: f64,
    pub lon: f64,
    pub reference: AltitudeReference,
    pub lower_msl_ft: f64,
    pub upper_msl_ft: f64,
    pub terrain_ft: f64,
    pub coverage: f64,
    pub volume_nm3: f64,
    /// Observed surveillance hours over the selected slots.
    pub hours: f64,
    /// Observed aircraft-hours before weighting and coverage correction.
    pub raw_count: f64,
    /// Aircraft-hours after 1200-code weighting and coverage correction.
    pub count: f64,
    /// AC/NM³.
    pub density: f64,
    /// Discrete-code share of `density`.
    pub discrete_density: f64,
    /// 1200-code share of `density`.
    pub code1200_density: f64,
    pub density_ub: Option<f64>,
    pub density_max: Option<f64>,
    pub density_std: Option<f64>,
}

impl CellDensity {
    /// `hours · volume`, the denominator of the density.
    pub fn exposure(&self) -> f64 {
        self.hours * self.volume_nm3
    }

    pub fn midpoint_msl_ft(&self) -> f64 {
        0.5 * (self.lower_msl_ft + self.upper_msl_ft)
    }
}

/// Regional aggregate of a density field.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DensityTotals {
    pub raw_count: f64,
    pub count: f64,
    /// Σ hours · volume.
    pub exposure: f64,
    pub volume_nm3: f64,
    /// Σ count / Σ exposure.
    pub density: f64,
    /// Mean number of aircraft in the selected volume.
    pub aircraft: f64,
    pub density_ub: Option<f64>,
    pub density_max: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DensityField {
    pub cells: Vec<CellDensity>,
    pub totals: DensityTotals,
    #[serde(skip)]
    pub advisories: Vec<Advisory>,
}

/// Inputs that shape the count arithmetic.
#[derive(Debug, Clone, Copy)]
pub struct DensitySettings<'a> {
    pub coverage: &'a CoverageSettings,
    pub noncoop: &'a NoncoopSettings,
    /// Already negotiated against the available capabilities.
    pub statistics: &'a StatisticsSettings,
}

/// Convert the masked counts into densities and optional statistics.
pub fn compute_density(
    table: &DensityTable,
    mask: &ValidityMask,
    settings: DensitySettings<'_>,
    capabilities: &Capabilities,
) -> DensityField {
    let grid = table.grid();
    let lat_mid = grid.lat_midpoints();
    let lon_mid = grid.lon_midpoints();
    let code1200_weight = settings.noncoop.code1200_weight();
    let stats = settings.statistics;
    let categories: Vec<(usize, TransponderClass)> = mask
        .selection
        .categories
        .iter()
        .map(|&c| (c, table.categories()[c].transponder))
        .collect();

    let mut cells = Vec::with_capacity(mask.cells.len() * mask.altitude_bins.len());
    // slot occupancies feeding the grouped maximum
    let mut occupancies = Vec::new();
    let mut groups = Vec::new();
    let mut empty_bins = 0usize;

    for (cell_idx, cell) in mask.cells.iter().enumerate() {
        let terrain_ft = table.terrain_ft(cell.row, cell.col);
        let area_nm2 = grid.cell_area_nm2(cell.row, cell.col).unwrap_or(0.0);
        let correction = if settings.coverage.correct && cell.coverage > 0.0 {
            1.0 / cell.coverage
        } else {
            1.0
        };

        for (bin_idx, &h) in mask.altitude_bins.iter().enumerate() {
            let Ok(layer) = grid.altitude_layer(h, terrain_ft) else {
                continue;
            };
            let volume_nm3 = area_nm2 * feet_to_nm(layer.thickness_ft());
            if volume_nm3 <= 0.0 {
                empty_bins += 1;
            }
            let hours = mask.hours(cell_idx, bin_idx);
            let output_idx = cells.len();

            let mut raw_count = 0.0;
            let mut discrete = 0.0;
            let mut code1200 = 0.0;
            let mut slot_occupancy = Vec::new();
            let selected = table
                .observations(cell.row, cell.col, h)
                .filter(|(key, _)| mask.selection.includes(key));
            for (_, slot) in selected {
                let mut slot_discrete = 0.0;
                let mut slot_code1200 = 0.0;
                for &(c, class) in &categories {
                    raw_count += slot.counts[c];
                    match class {
                        TransponderClass::Discrete => slot_discrete += slot.counts[c],
                        TransponderClass::Code1200 => slot_code1200 += slot.counts[c],
                    }
                }
                discrete += slot_discrete;
                code1200 += slot_code1200;

                if slot.hours > 0.0 {
                    let slot_count = (slot_discrete + code1200_weight * slot_code1200) * correction;
                    slot_occupancy.push(slot_count / slot.hours);
                }
            }

            let discrete_count = discrete * correction;
            let code1200_count = code1200_weight * code1200 * correction;
            let count = discrete_count + code1200_count;
            let exposure = hours * volume_nm3;
            let per_exposure = |value: f64| if exposure > 0.0 { value / exposure } else { 0.0 };

            let density_std = if stats.compute_std {
                Some(if volume_nm3 > 0.0 {
                    sample_std(&slot_occupancy) / volume_nm3
                } else {
                    0.0
                })
            } else {
                None
            };
            let density_ub = if stats.compute_ub {
                poisson_upper_density(count, exposure, stats, capabilities)
            } else {
                None
            };
            if stats.compute_max {
                for occupancy in &slot_occupancy {
                    occupancies.push(*occupancy);
                    groups.push(output_idx);
                }
            }

            cells.push(CellDensity {
                row: cell.row,
                col: cell.col,
                altitude_bin: h,
                lat: lat_mid[cell.row],
                lon: lon_mid[cell.col],
                reference: layer.reference,
                lower_msl_ft: layer.lower_msl_ft,
                upper_msl_ft: layer.upper_msl_ft,
                terrain_ft,
                coverage: cell.coverage,
                volume_nm3,
                hours,
                raw_count,
                count,
                density: per_exposure(count),
                discrete_density: per_exposure(discrete_count),
                code1200_density: per_exposure(code1200_count),
                density_ub,
                density_max: None,
                density_std,
            });
        }
    }

    if stats.compute_max {
        if let Some(reducer) = &capabilities.grouped_max {
            let max = reducer.grouped_max(&occupancies, &groups, cells.len());
            for (cell, occupancy) in cells.iter_mut().zip(max) {
                let value = if occupancy.is_finite() && cell.volume_nm3 > 0.0 {
                    occupancy / cell.volume_nm3
                } else {
                    0.0
                };
                cell.density_max = Some(value);
            }
        }
    }

    let mut advisories = Vec::new();
    if empty_bins > 0 {
        advisories.push(Advisory::EmptyAltitudeBins { cells: empty_bins });
    }

    let totals = aggregate(&cells, stats, capabilities);
    tracing::debug!(
        "Density field: {} cell bins, {:.3} AC-hr over {:.3} hr-NM3, density {:.3e} AC/NM3",
        cells.len(),
        totals.count,
        totals.exposure,
        totals.density
    );
    DensityField {
        cells,
        totals,
        advisories,
    }
}

/// Aggregate-then-divide totals over a set of cell densities.
pub fn aggregate(
    cells: &[CellDensity],
    stats: &StatisticsSettings,
    capabilities: &Capabilities,
) -> DensityTotals {
    let raw_count: f64 = cells.iter().map(|c| c.raw_count).sum();
    let count: f64 = cells.iter().map(|c| c.count).sum();
    let exposure: f64 = cells.iter().map(CellDensity::exposure).sum();
    let volume_nm3: f64 = cells.iter().map(|c| c.volume_nm3).sum();
    let aircraft: f64 = cells.iter().map(|c| c.density * c.volume_nm3).sum();
    let density = if exposure > 0.0 { count / exposure } else { 0.0 };

    let density_ub = if stats.compute_ub {
        poisson_upper_density(count, exposure, stats, capabilities)
    } else {
        None
    };
    let density_max = if stats.compute_max && capabilities.grouped_max.is_some() {
        Some(
            cells
                .iter()
                .filter_map(|c| c.density_max)
                .fold(0.0, f64::max),
        )
    } else {
        None
    };

    DensityTotals {
        raw_count,
        count,
        exposure,
        volume_nm3,
        density,
        aircraft,
        density_ub,
        density_max,
    }
}

/// Upper Poisson confidence limit on a density.
///
/// Aircraft-hours are turned into an event count with `ciIndObsPerHr`
/// independent observations per hour; the exact (Garwood) upper limit is
/// `χ²⁻¹(1 − α/2; 2k + 2) / 2`.
pub fn poisson_upper_density(
    count: f64,
    exposure: f64,
    stats: &StatisticsSettings,
    capabilities: &Capabilities,
) -> Option<f64> {
    if exposure <= 0.0 {
        return None;
    }
    let quantile = capabilities.chi_squared.as_ref()?;
    let rate = stats.ci_ind_obs_per_hr;
    let events = count * rate;
    let chi = quantile.quantile(1.0 - stats.ci_alpha / 2.0, 2.0 * events + 2.0)?;
    Some(chi / 2.0 / rate / exposure)
}

/// Sample standard deviation (n − 1); zero with fewer than two values.
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (ss / (n - 1.0)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimeFilters;
    use crate::filter::{Region, ValidityMask};
    use crate::grid::tests::sample_grid;
    use crate::table::tests::{two_categories, uniform_cells};
    use crate::table::DensityRecord;

    fn record(col: usize, time_bin: usize, category: usize, count: f64, hours: f64) -> DensityRecord {
        DensityRecord {
            row: 0,
            col,
            altitude_bin: 1,
            time_bin,
            day: 2,
            month: 7,
            category,
            count,
            hours,
        }
    }

    fn table(coverage: f64) -> DensityTable {
        let grid = sample_grid();
        let cells = uniform_cells(&grid, coverage);
        let records = vec![
            record(0, 0, 0, 2.0, 10.0),
            record(0, 1, 0, 6.0, 10.0),
            record(0, 1, 1, 2.0, 10.0),
            record(1, 0, 1, 1.0, 4.0),
        ];
        DensityTable::new(grid, two_categories(), records, cells).unwrap()
    }

    fn region() -> Region {
        Region {
            lat_min: 41.5,
            lat_max: 42.0,
            lon_min: -72.0,
            lon_max: -71.0,
            altitude_bins: Some(vec![1]),
            anchors: Vec::new(),
        }
    }

    fn field(
        table: &DensityTable,
        coverage: &CoverageSettings,
        noncoop: &NoncoopSettings,
        stats: &StatisticsSettings,
    ) -> DensityField {
        let mask =
            ValidityMask::build(table, &region(), &TimeFilters::default(), coverage, None).unwrap();
        compute_density(
            table,
            &mask,
            DensitySettings {
                coverage,
                noncoop,
                statistics: stats,
            },
            &Capabilities::default(),
        )
    }

    fn defaults() -> (CoverageSettings, NoncoopSettings, StatisticsSettings) {
        (
            CoverageSettings::default(),
            NoncoopSettings::default(),
            StatisticsSettings::default(),
        )
    }

    #[test]
    fn density_is_count_over_hours_and_volume() {
        let table = table(1.0);
        let (coverage, noncoop, stats) = defaults();
        let field = field(&table, &coverage, &noncoop, &stats);
        assert_eq!(field.cells.len(), 2);

        let cell = &field.cells[0];
        let area = table.grid().cell_area_nm2(0, 0).unwrap();
        let volume = area * feet_to_nm(700.0);
        assert!((cell.volume_nm3 - volume).abs() < 1e-9);
        assert_eq!(cell.hours, 20.0);
        assert_eq!(cell.count, 10.0);
        assert!((cell.density - 10.0 / (20.0 * volume)).abs() < 1e-12);
        assert!((cell.discrete_density + cell.code1200_density - cell.density).abs() < 1e-12);
    }

    #[test]
    fn totals_divide_once() {
        let table = table(1.0);
        let (coverage, noncoop, stats) = defaults();
        let field = field(&table, &coverage, &noncoop, &stats);
        let totals = &field.totals;
        let count: f64 = field.cells.iter().map(|c| c.count).sum();
        let exposure: f64 = field.cells.iter().map(|c| c.hours * c.volume_nm3).sum();
        assert!((totals.density - count / exposure).abs() < 1e-15);
        assert_eq!(totals.raw_count, 11.0);
    }

    #[test]
    fn coverage_correction_never_decreases_density() {
        let table = table(0.8);
        let (_, noncoop, stats) = defaults();
        let plain = field(&table, &CoverageSettings::default(), &noncoop, &stats);
        let corrected = CoverageSettings {
            correct: true,
            no_coverage_threshold: 0.0,
        };
        let inflated = field(&table, &corrected, &noncoop, &stats);
        for (a, b) in plain.cells.iter().zip(&inflated.cells) {
            assert!(b.density >= a.density);
            if a.density > 0.0 {
                assert!((b.density / a.density - 1.25).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn zero_coverage_cells_are_left_uncorrected() {
        let table = table(0.0);
        let (_, noncoop, stats) = defaults();
        let corrected = CoverageSettings {
            correct: true,
            no_coverage_threshold: 0.0,
        };
        let field = field(&table, &corrected, &noncoop, &stats);
        assert!(field.cells.iter().all(|c| c.density.is_finite()));
        assert_eq!(field.cells[0].count, 10.0);
    }

    #[test]
    fn noncoop_factor_scales_code1200_only() {
        let table = table(1.0);
        let (coverage, _, stats) = defaults();
        let noncoop = NoncoopSettings {
            enabled: true,
            factor: 3.0,
        };
        let field = field(&table, &coverage, &noncoop, &stats);
        // 8 discrete + 3 * 2 code-1200
        assert_eq!(field.cells[0].count, 14.0);
        assert_eq!(field.cells[0].raw_count, 10.0);
    }

    #[test]
    fn empty_hours_yield_zero_density() {
        let table = table(1.0);
        let (coverage, noncoop, stats) = defaults();
        let mut region = region();
        region.altitude_bins = Some(vec![0]);
        let mask =
            ValidityMask::build(&table, &region, &TimeFilters::default(), &coverage, None).unwrap();
        let field = compute_density(
            &table,
            &mask,
            DensitySettings {
                coverage: &coverage,
                noncoop: &noncoop,
                statistics: &stats,
            },
            &Capabilities::default(),
        );
        assert!(field.cells.iter().all(|c| c.density == 0.0 && c.hours == 0.0));
        assert_eq!(field.totals.density, 0.0);
    }

    #[test]
    fn optional_statistics_follow_slots() {
        let table = table(1.0);
        let (coverage, noncoop, _) = defaults();
        let stats = StatisticsSettings {
            compute_ub: true,
            compute_max: true,
            compute_std: true,
            ..StatisticsSettings::default()
        };
        let field = field(&table, &coverage, &noncoop, &stats);
        let cell = &field.cells[0];
        // slot occupancies 0.2 and 0.8 aircraft
        let max = cell.density_max.unwrap() * cell.volume_nm3;
        assert!((max - 0.8).abs() < 1e-12);
        let std = cell.density_std.unwrap() * cell.volume_nm3;
        assert!((std - sample_std(&[0.2, 0.8])).abs() < 1e-12);

        if cfg!(feature = "statrs") {
            assert!(cell.density_ub.unwrap() > cell.density);
            assert!(field.totals.density_ub.unwrap() > field.totals.density);
        }
        assert!(field.totals.density_max.unwrap() >= cell.density_max.unwrap());
    }

    #[test]
    fn statistics_stay_empty_when_not_requested() {
        let table = table(1.0);
        let (coverage, noncoop, stats) = defaults();
        let field = field(&table, &coverage, &noncoop, &stats);
        assert!(field.cells.iter().all(|c| c.density_ub.is_none()
            && c.density_max.is_none()
            && c.density_std.is_none()));
    }

    #[test]
    fn sample_std_matches_hand_value() {
        assert_eq!(sample_std(&[3.0]), 0.0);
        assert!((sample_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]) - 2.138_089_935).abs() < 1e-6);
    }
}
