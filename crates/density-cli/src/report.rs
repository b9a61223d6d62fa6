//! JSON report written after an evaluation.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use density_core::{ModeKind, Output, RunConfig};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub generated_at: DateTime<Utc>,
    pub dataset: String,
    pub config: &'a RunConfig,
    pub output: &'a Output,
}

impl<'a> Report<'a> {
    pub fn new(dataset: impl Into<String>, config: &'a RunConfig, output: &'a Output) -> Self {
        Self {
            generated_at: Utc::now(),
            dataset: dataset.into(),
            config,
            output,
        }
    }

    /// Write pretty JSON to `path`, or to stdout when no path is given.
    pub fn write(&self, path: Option<&Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize report")?;
        match path {
            Some(path) => fs::write(path, json)
                .with_context(|| format!("Failed to write report {}", path.display())),
            None => {
                let mut stdout = std::io::stdout().lock();
                writeln!(stdout, "{}", json).context("Failed to write report to stdout")
            }
        }
    }
}

/// One-line human summary of an output.
pub fn summary_line(output: &Output) -> String {
    match output.mode {
        ModeKind::Area => format!(
            "area: density {:.4e} AC/NM^3, rate {:.4e} /hr, {:.2} aircraft, {} advisories",
            output.density,
            output.rate,
            output.count.aircraft,
            output.advisories.len()
        ),
        ModeKind::Track => {
            let (duration, distance) = output
                .track
                .as_ref()
                .map(|t| (t.duration_hr, t.distance_nm))
                .unwrap_or_default();
            format!(
                "track: {:.4e} expected encounters over {:.2} hr / {:.1} NM, rate {:.4e} /hr, {} advisories",
                output.count.aircraft,
                duration,
                distance,
                output.rate,
                output.advisories.len()
            )
        }
    }
}
