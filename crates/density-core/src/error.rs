//! Error and advisory types for density estimation.
//!
//! Fatal problems (bad input data, invalid configuration, out-of-domain
//! queries) are `DensityError`s. Recoverable conditions never abort a run;
//! they are reported as `Advisory` values on the output.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DensityError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DensityError {
    /// Malformed or missing input data, or an invalid filter combination.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Query outside the grid's spatial, temporal or altitude domain.
    #[error("{axis} {value} outside grid range [{min}, {max}]")]
    Range {
        axis: GridAxis,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Argument that cannot describe a computation (e.g. a one-sample track).
    #[error("invalid argument: {0}")]
    Argument(String),
}

impl DensityError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridAxis {
    Latitude,
    Longitude,
    Altitude,
    Time,
}

impl fmt::Display for GridAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GridAxis::Latitude => "latitude",
            GridAxis::Longitude => "longitude",
            GridAxis::Altitude => "altitude",
            GridAxis::Time => "time",
        };
        f.write_str(name)
    }
}

/// Non-fatal condition raised during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advisory {
    /// An optional statistic was requested but its numeric backend is missing.
    CapabilityUnavailable { statistic: String },
    /// Valid configuration, but nothing matched.
    DataAbsence { message: String },
    /// Track sample far below sea level.
    LowAltitude { sample: usize, altitude_ft: f64 },
    /// Altitude bins whose effective thickness collapsed below terrain.
    EmptyAltitudeBins { cells: usize },
}

impl Advisory {
    pub(crate) fn data_absence(message: impl Into<String>) -> Self {
        Self::DataAbsence {
            message: message.into(),
        }
    }

    /// Emit the advisory through `tracing`.
    pub(crate) fn log(&self) {
        match self {
            Advisory::CapabilityUnavailable { statistic } => {
                tracing::warn!("{} requested but unavailable; disabled for this run", statistic);
            }
            Advisory::DataAbsence { message } => {
                tracing::warn!("No matching observations: {}", message);
            }
            Advisory::LowAltitude {
                sample,
                altitude_ft,
            } => {
                tracing::warn!(
                    "Track sample {} altitude {:.0} ft is below -2000 ft MSL",
                    sample,
                    altitude_ft
                );
            }
            Advisory::EmptyAltitudeBins { cells } => {
                tracing::warn!(
                    "{} cell/altitude bins have no airspace above terrain and were zeroed",
                    cells
                );
            }
        }
    }
}
