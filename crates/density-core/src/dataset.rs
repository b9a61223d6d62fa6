//! Load-time data shared read-only by every evaluation.

use crate::encounter::EncounterModel;
use crate::grid::GridSpec;
use crate::table::DensityTable;

/// Density table and encounter model, immutable once built.
///
/// Wrap in an `Arc` to run many configurations against one dataset.
#[derive(Debug, Clone)]
pub struct Dataset {
    table: DensityTable,
    encounter: EncounterModel,
}

impl Dataset {
    pub fn new(table: DensityTable, encounter: EncounterModel) -> Self {
        Self { table, encounter }
    }

    pub fn table(&self) -> &DensityTable {
        &self.table
    }

    pub fn grid(&self) -> &GridSpec {
        self.table.grid()
    }

    pub fn encounter(&self) -> &EncounterModel {
        &self.encounter
    }
}
