//! Validity filter: which cells, altitude bins and table slots take part in a run.
//!
//! Cells at or below a non-zero coverage threshold are dropped entirely. Cells
//! that were surveilled but saw no traffic stay in the mask with zero density.

use crate::config::{AirspaceClassFilter, AreaBounds, CoverageSettings, TimeFilters};
use crate::error::{DensityError, Result};
use crate::grid::{GridSpec, DAYS_PER_WEEK, MONTHS_PER_YEAR};
use crate::table::{DensityTable, SlotKey};
use crate::track::Track;
use serde::Serialize;
use std::collections::BTreeSet;

/// Horizontal selection plus optional altitude-bin subset.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
    pub altitude_bins: Option<Vec<usize>>,
    /// Positions whose containing cell is always admitted, even when they sit
    /// on the southern or eastern edge of the box.
    pub anchors: Vec<(f64, f64)>,
}

impl From<&AreaBounds> for Region {
    fn from(bounds: &AreaBounds) -> Self {
        Self {
            lat_min: bounds.lat_min(),
            lat_max: bounds.lat_max(),
            lon_min: bounds.lon_min(),
            lon_max: bounds.lon_max(),
            altitude_bins: bounds.altitude_bins().map(<[usize]>::to_vec),
            anchors: Vec::new(),
        }
    }
}

impl From<&Track> for Region {
    fn from(track: &Track) -> Self {
        let (lat_min, lat_max, lon_min, lon_max) = track.bounding_box();
        Self {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
            altitude_bins: None,
            anchors: track.samples().iter().map(|s| (s.lat, s.lon)).collect(),
        }
    }
}

/// Resolved indices along the reduction axes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AxisSelection {
    pub times: Vec<usize>,
    pub days: Vec<usize>,
    pub months: Vec<usize>,
    pub categories: Vec<usize>,
}

impl AxisSelection {
    pub fn resolve(filters: &TimeFilters, grid: &GridSpec, category_count: usize) -> Result<Self> {
        Ok(Self {
            times: filters.time_of_day.indices("timeofday", grid.nt())?,
            days: filters.day_of_week.indices("dayofweek", DAYS_PER_WEEK)?,
            months: filters.month_of_year.indices("monthofyear", MONTHS_PER_YEAR)?,
            categories: filters.categories.indices("ACcategory", category_count)?,
        })
    }

    /// Whether a table slot falls inside the selected time, day and month sets.
    pub fn includes(&self, key: &SlotKey) -> bool {
        self.times.binary_search(&key.time_bin).is_ok()
            && self.days.binary_search(&key.day).is_ok()
            && self.months.binary_search(&key.month).is_ok()
    }
}

/// A horizontal cell admitted by the filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MaskedCell {
    pub row: usize,
    pub col: usize,
    pub coverage: f64,
}

/// Selection over (row × col × altitude bin) with reduced observed hours.
#[derive(Debug, Clone, Serialize)]
pub struct ValidityMask {
    nx: usize,
    nh: usize,
    included: Vec<bool>,
    pub cells: Vec<MaskedCell>,
    pub altitude_bins: Vec<usize>,
    pub selection: AxisSelection,
    /// Observed hours summed over the selected slots, `cells × altitude_bins`.
    pub reduced_hours: Vec<f64>,
    pub excluded_by_coverage: usize,
    pub excluded_by_airspace: usize,
}

impl ValidityMask {
    /// Build the mask for the current filter settings.
    pub fn build(
        table: &DensityTable,
        region: &Region,
        filters: &TimeFilters,
        coverage: &CoverageSettings,
        airspace: Option<&AirspaceClassFilter>,
    ) -> Result<Self> {
        let grid = table.grid();
        let selection = AxisSelection::resolve(filters, grid, table.categories().len())?;
        let altitude_bins = match &region.altitude_bins {
            Some(bins) => {
                if let Some(bad) = bins.iter().find(|b| **b >= grid.nh()) {
                    return Err(DensityError::config(format!(
                        "altitude bin {} outside 0..{}",
                        bad,
                        grid.nh()
                    )));
                }
                bins.clone()
            }
            None => (0..grid.nh()).collect(),
        };
        let class_indices = match airspace {
            Some(filter) => Some(resolve_classes(table, filter)?),
            None => None,
        };

        let rows = select_rows(grid, region);
        let cols = select_cols(grid, region);

        let threshold = coverage.no_coverage_threshold;
        let mut cells = Vec::new();
        let mut excluded_by_coverage = 0usize;
        let mut excluded_by_airspace = 0usize;
        for &row in &rows {
            for &col in &cols {
                let fraction = table.coverage(row, col);
                if threshold > 0.0 && fraction <= threshold {
                    excluded_by_coverage += 1;
                    continue;
                }
                if let (Some(filter), Some(indices)) = (airspace, &class_indices) {
                    let fractions = table.airspace_fractions(row, col);
                    let share: f64 = indices.iter().map(|i| fractions[*i]).sum();
                    if share < filter.min_fraction {
                        excluded_by_airspace += 1;
                        continue;
                    }
                }
                cells.push(MaskedCell {
                    row,
                    col,
                    coverage: fraction,
                });
            }
        }

        let nh = grid.nh();
        let mut included = vec![false; grid.cell_count() * nh];
        let mut reduced_hours = Vec::with_capacity(cells.len() * altitude_bins.len());
        for cell in &cells {
            for &h in &altitude_bins {
                included[grid.cell_offset(cell.row, cell.col) * nh + h] = true;
                let hours: f64 = table
                    .observations(cell.row, cell.col, h)
                    .filter(|(key, _)| selection.includes(key))
                    .map(|(_, slot)| slot.hours)
                    .sum();
                reduced_hours.push(hours);
            }
        }

        tracing::debug!(
            "Validity mask: {} cells x {} altitude bins ({} below coverage, {} outside airspace class)",
            cells.len(),
            altitude_bins.len(),
            excluded_by_coverage,
            excluded_by_airspace
        );

        Ok(Self {
            nx: grid.nx(),
            nh,
            included,
            cells,
            altitude_bins,
            selection,
            reduced_hours,
            excluded_by_coverage,
            excluded_by_airspace,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn is_included(&self, row: usize, col: usize, altitude_bin: usize) -> bool {
        if altitude_bin >= self.nh || col >= self.nx {
            return false;
        }
        self.included
            .get((row * self.nx + col) * self.nh + altitude_bin)
            .copied()
            .unwrap_or(false)
    }

    /// Reduced hours for `cells[cell_idx]` and `altitude_bins[bin_idx]`.
    pub fn hours(&self, cell_idx: usize, bin_idx: usize) -> f64 {
        self.reduced_hours[cell_idx * self.altitude_bins.len() + bin_idx]
    }
}

fn resolve_classes(table: &DensityTable, filter: &AirspaceClassFilter) -> Result<Vec<usize>> {
    filter
        .classes
        .iter()
        .map(|name| {
            table
                .airspace_classes()
                .iter()
                .position(|known| known.eq_ignore_ascii_case(name))
                .ok_or_else(|| DensityError::config(format!("unknown airspace class '{}'", name)))
        })
        .collect()
}

fn overlaps(lo: f64, hi: f64, min: f64, max: f64) -> bool {
    lo < max && hi > min
}

/// Cells that [`GridSpec::cell_index`] assigns to the region's anchors.
fn anchor_cells<'a>(
    grid: &'a GridSpec,
    region: &'a Region,
) -> impl Iterator<Item = (usize, usize)> + 'a {
    region
        .anchors
        .iter()
        .filter_map(|&(lat, lon)| grid.cell_index(lat, lon).ok())
}

fn select_rows(grid: &GridSpec, region: &Region) -> Vec<usize> {
    let mut rows: BTreeSet<usize> = if region.lat_max <= region.lat_min {
        grid.cell_index(region.lat_min, grid.metadata().west_lon)
            .map(|(row, _)| row)
            .into_iter()
            .collect()
    } else {
        let cuts = grid.lat_cutpoints();
        (0..grid.ny())
            .filter(|&r| overlaps(cuts[r + 1], cuts[r], region.lat_min, region.lat_max))
            .collect()
    };
    rows.extend(anchor_cells(grid, region).map(|(row, _)| row));
    rows.into_iter().collect()
}

fn select_cols(grid: &GridSpec, region: &Region) -> Vec<usize> {
    let mut cols: BTreeSet<usize> = if region.lon_max <= region.lon_min {
        grid.cell_index(grid.metadata().north_lat, region.lon_min)
            .map(|(_, col)| col)
            .into_iter()
            .collect()
    } else {
        let cuts = grid.lon_cutpoints();
        (0..grid.nx())
            .filter(|&c| overlaps(cuts[c], cuts[c + 1], region.lon_min, region.lon_max))
            .collect()
    };
    cols.extend(anchor_cells(grid, region).map(|(_, col)| col));
    cols.into_iter().collect()
}
