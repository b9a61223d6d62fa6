//! Observed counts and hours aligned to the grid, plus per-cell side tables.
//!
//! Observations are stored sparsely: only (cell, altitude bin, time, day,
//! month) slots named by a loader record take memory, so the footprint follows
//! the record count rather than the size of the grid. Observed hours measure
//! surveillance time, which every category in a slot shares, so each slot
//! holds one hours value and one count per category.

use crate::error::{DensityError, Result};
use crate::grid::{GridSpec, DAYS_PER_WEEK, MONTHS_PER_YEAR};
use crate::spatial::meters_to_feet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Transponder class of an aircraft category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransponderClass {
    /// Discrete beacon code, typically ATC-managed traffic.
    Discrete,
    /// VFR 1200 code, likely outside ATC services.
    Code1200,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AircraftCategory {
    pub name: String,
    pub transponder: TransponderClass,
}

impl AircraftCategory {
    pub fn new(name: impl Into<String>, transponder: TransponderClass) -> Self {
        Self {
            name: name.into(),
            transponder,
        }
    }
}

/// One loader record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DensityRecord {
    pub row: usize,
    pub col: usize,
    pub altitude_bin: usize,
    pub time_bin: usize,
    pub day: usize,
    pub month: usize,
    pub category: usize,
    /// Observed aircraft-hours.
    pub count: f64,
    /// Observed surveillance hours.
    pub hours: f64,
}

/// Per-cell side tables, row-major over (row, col).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CellTables {
    /// Surveillance completeness, 0..=1.
    pub coverage: Vec<f64>,
    /// Terrain elevation in meters.
    pub terrain_m: Vec<f64>,
    pub airspace_classes: Vec<String>,
    /// Fraction of cell area per airspace class, row-major over (row, col, class).
    pub airspace_fractions: Vec<f64>,
}

/// Time slot within one cell and altitude bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SlotKey {
    pub time_bin: usize,
    pub day: usize,
    pub month: usize,
}

impl SlotKey {
    pub fn new(time_bin: usize, day: usize, month: usize) -> Self {
        Self {
            time_bin,
            day,
            month,
        }
    }
}

/// Observations of one slot.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotObservation {
    /// Observed surveillance hours.
    pub hours: f64,
    /// Observed aircraft-hours per category.
    pub counts: Vec<f64>,
}

/// Slots of one (cell offset, altitude bin), ordered by time slot.
type SlotMap = BTreeMap<SlotKey, SlotObservation>;

/// Read-only observation table.
#[derive(Debug, Clone)]
pub struct DensityTable {
    grid: GridSpec,
    categories: Vec<AircraftCategory>,
    observations: BTreeMap<(usize, usize), SlotMap>,
    slot_count: usize,
    cells: CellTables,
}

impl DensityTable {
    /// Build the table from loader records and side tables.
    pub fn new(
        grid: GridSpec,
        categories: Vec<AircraftCategory>,
        records: impl IntoIterator<Item = DensityRecord>,
        cells: CellTables,
    ) -> Result<Self> {
        if categories.is_empty() {
            return Err(DensityError::config("at least one aircraft category is required"));
        }
        validate_cells(&grid, &cells)?;

        let category_count = categories.len();
        let mut table = Self {
            observations: BTreeMap::new(),
            slot_count: 0,
            grid,
            categories,
            cells,
        };

        let mut slot_count = 0usize;
        let mut loaded = 0usize;
        let mut hour_conflicts = 0usize;
        for record in records {
            table.check_record(&record)?;
            let cell = table.grid.cell_offset(record.row, record.col);
            let key = SlotKey::new(record.time_bin, record.day, record.month);
            let slots = table
                .observations
                .entry((cell, record.altitude_bin))
                .or_default();
            let slot = slots.entry(key).or_insert_with(|| {
                slot_count += 1;
                SlotObservation {
                    hours: 0.0,
                    counts: vec![0.0; category_count],
                }
            });
            slot.counts[record.category] += record.count;

            if slot.hours > 0.0 && slot.hours != record.hours {
                hour_conflicts += 1;
            }
            slot.hours = slot.hours.max(record.hours);
            loaded += 1;
        }
        table.slot_count = slot_count;

        if hour_conflicts > 0 {
            tracing::debug!(
                "{} records disagreed on observed hours; kept the maximum per slot",
                hour_conflicts
            );
        }
        tracing::debug!(
            "Loaded {} density records into {} slots",
            loaded,
            table.slot_count
        );
        Ok(table)
    }

    fn check_record(&self, record: &DensityRecord) -> Result<()> {
        let grid = &self.grid;
        let in_range = record.row < grid.ny()
            && record.col < grid.nx()
            && record.altitude_bin < grid.nh()
            && record.time_bin < grid.nt()
            && record.day < DAYS_PER_WEEK
            && record.month < MONTHS_PER_YEAR
            && record.category < self.categories.len();
        if !in_range {
            return Err(DensityError::config(format!(
                "density record index out of range: {:?}",
                record
            )));
        }
        let valid_values = record.count.is_finite()
            && record.count >= 0.0
            && record.hours.is_finite()
            && record.hours >= 0.0;
        if !valid_values {
            return Err(DensityError::config(format!(
                "density record has negative or non-finite values: {:?}",
                record
            )));
        }
        if record.count > 0.0 && record.hours == 0.0 {
            return Err(DensityError::config(format!(
                "density record observes traffic without observed hours: {:?}",
                record
            )));
        }
        Ok(())
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn categories(&self) -> &[AircraftCategory] {
        &self.categories
    }

    pub fn airspace_classes(&self) -> &[String] {
        &self.cells.airspace_classes
    }

    /// Number of slots holding at least one record.
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Observed slots of one cell and altitude bin, in time-slot order.
    pub fn observations(
        &self,
        row: usize,
        col: usize,
        altitude_bin: usize,
    ) -> impl Iterator<Item = (&SlotKey, &SlotObservation)> + '_ {
        self.observations
            .get(&(self.grid.cell_offset(row, col), altitude_bin))
            .into_iter()
            .flat_map(|slots| slots.iter())
    }

    /// One slot; `None` when no record named it.
    pub fn slot(
        &self,
        row: usize,
        col: usize,
        altitude_bin: usize,
        key: SlotKey,
    ) -> Option<&SlotObservation> {
        self.observations
            .get(&(self.grid.cell_offset(row, col), altitude_bin))?
            .get(&key)
    }

    pub fn coverage(&self, row: usize, col: usize) -> f64 {
        self.cells.coverage[self.grid.cell_offset(row, col)]
    }

    pub fn terrain_ft(&self, row: usize, col: usize) -> f64 {
        meters_to_feet(self.cells.terrain_m[self.grid.cell_offset(row, col)])
    }

    pub fn airspace_fractions(&self, row: usize, col: usize) -> &[f64] {
        let n = self.cells.airspace_classes.len();
        let start = self.grid.cell_offset(row, col) * n;
        &self.cells.airspace_fractions[start..start + n]
    }
}

fn validate_cells(grid: &GridSpec, cells: &CellTables) -> Result<()> {
    let n = grid.cell_count();
    if cells.coverage.len() != n {
        return Err(DensityError::config(format!(
            "coverage table has {} entries, grid has {} cells",
            cells.coverage.len(),
            n
        )));
    }
    if cells
        .coverage
        .iter()
        .any(|c| !c.is_finite() || !(0.0..=1.0).contains(c))
    {
        return Err(DensityError::config("coverage fractions must lie in [0, 1]"));
    }
    if cells.terrain_m.len() != n {
        return Err(DensityError::config(format!(
            "terrain table has {} entries, grid has {} cells",
            cells.terrain_m.len(),
            n
        )));
    }
    if cells.terrain_m.iter().any(|t| !t.is_finite()) {
        return Err(DensityError::config("terrain elevations must be finite"));
    }
    let expected = n * cells.airspace_classes.len();
    if cells.airspace_fractions.len() != expected {
        return Err(DensityError::config(format!(
            "airspace class table has {} entries, expected {}",
            cells.airspace_fractions.len(),
            expected
        )));
    }
    if cells
        .airspace_fractions
        .iter()
        .any(|f| !f.is_finite() || !(0.0..=1.0).contains(f))
    {
        return Err(DensityError::config("airspace class fractions must lie in [0, 1]"));
    }
    Ok(())
}
