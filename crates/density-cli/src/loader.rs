//! File loader for density tables, encounter models and run configs.
//!
//! Dataset JSON layout:
//!
//! ```json
//! {
//!   "grid": { "bins_per_degree": 1.0, "north_lat": 42.0, "west_lon": -72.0,
//!             "nx": 4, "ny": 3, "nt": 2,
//!             "agl_edges_ft": [0, 1000, 3000], "msl_edges_ft": [5000, 12000] },
//!   "categories": [ { "name": "discrete", "transponder": "discrete" } ],
//!   "records": [ { "row": 0, "col": 0, "altitude_bin": 1, "time_bin": 0,
//!                  "day": 2, "month": 5, "category": 0, "count": 3.0, "hours": 40.0 } ],
//!   "cells": { "coverage": [...], "terrain_m": [...],
//!              "airspace_classes": ["C", "E"], "airspace_fractions": [...] }
//! }
//! ```

use anyhow::{Context, Result};
use density_core::{
    AircraftCategory, CellTables, Dataset, DensityRecord, DensityTable, EncounterModel, GridSpec,
    RunConfig,
};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct DatasetFile {
    pub grid: GridSpec,
    pub categories: Vec<AircraftCategory>,
    #[serde(default)]
    pub records: Vec<DensityRecord>,
    pub cells: CellTables,
}

/// Build a dataset from in-memory dataset JSON and encounter-model text.
pub fn parse_dataset(dataset_json: &str, correlated: &str, uncorrelated: &str) -> Result<Dataset> {
    let file: DatasetFile =
        serde_json::from_str(dataset_json).context("Failed to parse dataset JSON")?;
    let record_count = file.records.len();
    let table = DensityTable::new(file.grid, file.categories, file.records, file.cells)
        .context("Invalid density table")?;
    let encounter =
        EncounterModel::parse(correlated, uncorrelated).context("Invalid encounter model")?;
    tracing::info!(
        "Loaded {} records on a {}x{} grid with {} altitude bins",
        record_count,
        table.grid().ny(),
        table.grid().nx(),
        table.grid().nh()
    );
    Ok(Dataset::new(table, encounter))
}

pub fn load_dataset(dataset: &Path, correlated: &Path, uncorrelated: &Path) -> Result<Dataset> {
    let dataset_json = read(dataset)?;
    let correlated = read(correlated)?;
    let uncorrelated = read(uncorrelated)?;
    parse_dataset(&dataset_json, &correlated, &uncorrelated)
}

pub fn load_run_config(path: &Path) -> Result<RunConfig> {
    let text = read(path)?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse run config {}", path.display()))
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}
