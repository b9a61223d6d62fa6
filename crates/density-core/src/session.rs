//! Stateful wrapper for interactive use.

use crate::capability::Capabilities;
use crate::config::{
    AirspaceClassFilter, AreaBounds, CollisionGeometry, EvaluationMode, RunConfig,
    StatisticsSettings, TimeFilters,
};
use crate::dataset::Dataset;
use crate::error::Result;
use crate::evaluate::evaluate;
use crate::grid::AltitudeBoundaryRule;
use crate::output::Output;
use crate::track::Track;
use std::sync::Arc;

/// Holds a configuration and the output of its last run.
///
/// Every setter discards the previous output, so [`EstimatorSession::output`]
/// never describes settings other than the current ones.
#[derive(Debug)]
pub struct EstimatorSession {
    dataset: Arc<Dataset>,
    capabilities: Capabilities,
    config: RunConfig,
    output: Option<Output>,
}

impl EstimatorSession {
    pub fn new(dataset: Arc<Dataset>, config: RunConfig) -> Self {
        Self {
            dataset,
            capabilities: Capabilities::default(),
            config,
            output: None,
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self.output = None;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Last output; `None` until [`run`](Self::run) succeeds after the latest change.
    pub fn output(&self) -> Option<&Output> {
        self.output.as_ref()
    }

    /// Evaluate the current configuration and keep the result.
    pub fn run(&mut self) -> Result<&Output> {
        self.output = None;
        let output = evaluate(&self.config, &self.dataset, &self.capabilities)?;
        Ok(self.output.insert(output))
    }

    /// Replace the whole configuration.
    pub fn set_config(&mut self, config: RunConfig) {
        self.config = config;
        self.invalidate();
    }

    pub fn set_area(&mut self, bounds: AreaBounds) {
        self.config.mode = EvaluationMode::Area(bounds);
        self.invalidate();
    }

    pub fn set_track(&mut self, track: Track) {
        self.config.mode = EvaluationMode::Track(track);
        self.invalidate();
    }

    pub fn set_filters(&mut self, filters: TimeFilters) {
        self.config.filters = filters;
        self.invalidate();
    }

    pub fn set_coverage(&mut self, correct: bool, no_coverage_threshold: f64) {
        self.config.coverage.correct = correct;
        self.config.coverage.no_coverage_threshold = no_coverage_threshold;
        self.invalidate();
    }

    pub fn set_noncoop(&mut self, enabled: bool, factor: f64) {
        self.config.noncoop.enabled = enabled;
        self.config.noncoop.factor = factor;
        self.invalidate();
    }

    pub fn set_own_speed(&mut self, own_speed_kts: Option<f64>) {
        self.config.own_speed_kts = own_speed_kts;
        self.invalidate();
    }

    pub fn set_geometry(&mut self, geometry: CollisionGeometry) {
        self.config.geometry = geometry;
        self.invalidate();
    }

    pub fn set_statistics(&mut self, statistics: StatisticsSettings) {
        self.config.statistics = statistics;
        self.invalidate();
    }

    pub fn set_airspace_class(&mut self, filter: Option<AirspaceClassFilter>) {
        self.config.airspace_class = filter;
        self.invalidate();
    }

    pub fn set_altitude_rule(&mut self, rule: AltitudeBoundaryRule) {
        self.config.altitude_rule = rule;
        self.invalidate();
    }

    fn invalidate(&mut self) {
        if self.output.take().is_some() {
            tracing::debug!("Configuration changed; previous output discarded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encounter::tests::sample_model;
    use crate::grid::tests::sample_grid;
    use crate::table::tests::{two_categories, uniform_cells};
    use crate::table::{DensityRecord, DensityTable};

    fn dataset() -> Arc<Dataset> {
        let grid = sample_grid();
        let cells = uniform_cells(&grid, 1.0);
        let records = vec![DensityRecord {
            row: 0,
            col: 0,
            altitude_bin: 1,
            time_bin: 0,
            day: 0,
            month: 0,
            category: 0,
            count: 4.0,
            hours: 10.0,
        }];
        let table = DensityTable::new(grid, two_categories(), records, cells).unwrap();
        Arc::new(Dataset::new(table, sample_model()))
    }

    fn session() -> EstimatorSession {
        let bounds = AreaBounds::new(41.0, 42.0, -72.0, -71.5).unwrap();
        EstimatorSession::new(dataset(), RunConfig::area(bounds))
    }

    #[test]
    fn run_stores_output() {
        let mut session = session();
        assert!(session.output().is_none());
        let density = session.run().unwrap().density;
        assert!(density > 0.0);
        assert_eq!(session.output().unwrap().density, density);
    }

    #[test]
    fn changing_area_clears_output() {
        let mut session = session();
        session.run().unwrap();
        session.set_area(AreaBounds::new(40.0, 41.0, -72.0, -71.0).unwrap());
        assert!(session.output().is_none());
    }

    #[test]
    fn every_setter_clears_output() {
        let mut session = session();
        let setters: Vec<Box<dyn Fn(&mut EstimatorSession)>> = vec![
            Box::new(|s: &mut EstimatorSession| s.set_filters(TimeFilters::default())),
            Box::new(|s: &mut EstimatorSession| s.set_coverage(true, 0.1)),
            Box::new(|s: &mut EstimatorSession| s.set_noncoop(true, 2.0)),
            Box::new(|s: &mut EstimatorSession| s.set_own_speed(Some(100.0))),
            Box::new(|s: &mut EstimatorSession| s.set_geometry(CollisionGeometry::default())),
            Box::new(|s: &mut EstimatorSession| s.set_statistics(StatisticsSettings::default())),
            Box::new(|s: &mut EstimatorSession| s.set_airspace_class(None)),
            Box::new(|s: &mut EstimatorSession| s.set_altitude_rule(AltitudeBoundaryRule::UpperInclusive)),
        ];
        for set in setters {
            session.run().unwrap();
            set(&mut session);
            assert!(session.output().is_none());
        }
    }

    #[test]
    fn failed_run_leaves_no_output() {
        let mut session = session();
        session.run().unwrap();
        session.set_coverage(false, 2.0);
        assert!(session.run().is_err());
        assert!(session.output().is_none());
    }
}
