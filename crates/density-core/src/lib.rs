pub mod capability;
pub mod config;
pub mod dataset;
pub mod encounter;
pub mod engine;
pub mod error;
pub mod evaluate;
pub mod filter;
pub mod grid;
pub mod output;
pub mod risk;
pub mod session;
pub mod spatial;
pub mod table;
pub mod track;

pub use capability::{Capabilities, ChiSquaredQuantile, GroupedMax, PortableGroupedMax};
#[cfg(feature = "statrs")]
pub use capability::StatrsChiSquared;
pub use config::{
    AirspaceClassFilter, AreaBounds, AxisFilter, CollisionGeometry, CoverageSettings,
    EvaluationMode, NoncoopSettings, RunConfig, StatisticsSettings, TimeFilters,
};
pub use dataset::Dataset;
pub use encounter::{mean_closure_speed, EncounterKind, EncounterModel, EncounterTable, TrafficMix};
pub use engine::{CellDensity, DensityField, DensityTotals};
pub use error::{Advisory, DensityError, GridAxis, Result};
pub use evaluate::evaluate;
pub use filter::ValidityMask;
pub use grid::{AltitudeBoundaryRule, AltitudeLayer, AltitudeReference, GridMetadata, GridSpec};
pub use output::{
    AirspaceShare, AltitudeSummary, CellResult, Count, ModeKind, Output, RegionStatistics,
    TrackPoint, TrackResult,
};
pub use session::EstimatorSession;
pub use spatial::{haversine_nm, quadrangle_area_nm2};
pub use table::{
    AircraftCategory, CellTables, DensityRecord, DensityTable, SlotKey, SlotObservation,
    TransponderClass,
};
pub use track::{Track, TrackSample};
