//! Spatial, temporal and altitude binning scheme.
//!
//! Rows run south from the north-latitude origin, columns run east from the
//! west-longitude origin. The altitude edge table concatenates AGL edges and
//! MSL edges; the bin between the top AGL edge and the first MSL edge is a
//! transition bin whose floor depends on local terrain.

use crate::error::{DensityError, GridAxis, Result};
use crate::spatial::quadrangle_area_nm2;
use serde::{Deserialize, Serialize};

pub const DAYS_PER_WEEK: usize = 7;
pub const MONTHS_PER_YEAR: usize = 12;

/// Which bin owns an altitude that sits exactly on an edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AltitudeBoundaryRule {
    /// Edge belongs to the bin above it: `[lower, upper)`.
    #[default]
    LowerInclusive,
    /// Edge belongs to the bin below it: `(lower, upper]`.
    UpperInclusive,
}

/// Reference frame of an altitude bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AltitudeReference {
    Agl,
    /// Floor is AGL (top AGL edge), ceiling is MSL (first MSL edge).
    Transition,
    Msl,
}

/// Altitude bin resolved against a cell's terrain, both bounds in feet MSL.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AltitudeLayer {
    pub bin: usize,
    pub reference: AltitudeReference,
    pub lower_msl_ft: f64,
    pub upper_msl_ft: f64,
}

impl AltitudeLayer {
    pub fn thickness_ft(&self) -> f64 {
        (self.upper_msl_ft - self.lower_msl_ft).max(0.0)
    }

    pub fn midpoint_msl_ft(&self) -> f64 {
        0.5 * (self.lower_msl_ft + self.upper_msl_ft)
    }
}

/// Raw grid metadata as handed over by the loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridMetadata {
    pub bins_per_degree: f64,
    pub north_lat: f64,
    pub west_lon: f64,
    /// Longitude cells.
    pub nx: usize,
    /// Latitude cells.
    pub ny: usize,
    /// Time-of-day bins.
    pub nt: usize,
    pub agl_edges_ft: Vec<f64>,
    pub msl_edges_ft: Vec<f64>,
}

/// Immutable binning scheme.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "GridMetadata", into = "GridMetadata")]
pub struct GridSpec {
    meta: GridMetadata,
    lat_cutpoints: Vec<f64>,
    lon_cutpoints: Vec<f64>,
    altitude_edges_ft: Vec<f64>,
}

impl TryFrom<GridMetadata> for GridSpec {
    type Error = DensityError;

    fn try_from(meta: GridMetadata) -> Result<Self> {
        GridSpec::new(meta)
    }
}

impl From<GridSpec> for GridMetadata {
    fn from(grid: GridSpec) -> Self {
        grid.meta
    }
}

impl GridSpec {
    pub fn new(meta: GridMetadata) -> Result<Self> {
        if !meta.bins_per_degree.is_finite() || meta.bins_per_degree <= 0.0 {
            return Err(DensityError::config("bins_per_degree must be positive"));
        }
        if meta.nx == 0 || meta.ny == 0 || meta.nt == 0 {
            return Err(DensityError::config("grid dimensions must be non-zero"));
        }
        if !(-90.0..=90.0).contains(&meta.north_lat) || !meta.west_lon.is_finite() {
            return Err(DensityError::config("grid origin is not a valid coordinate"));
        }
        let south = meta.north_lat - meta.ny as f64 / meta.bins_per_degree;
        if south < -90.0 {
            return Err(DensityError::config("grid extends south of the pole"));
        }
        if meta.agl_edges_ft.len() < 2 || meta.msl_edges_ft.is_empty() {
            return Err(DensityError::config(
                "need at least two AGL edges and one MSL edge",
            ));
        }

        let altitude_edges_ft: Vec<f64> = meta
            .agl_edges_ft
            .iter()
            .chain(meta.msl_edges_ft.iter())
            .copied()
            .collect();
        for edges in [&meta.agl_edges_ft, &meta.msl_edges_ft] {
            let increasing = edges.windows(2).all(|w| w[1] > w[0]);
            if !increasing || edges.iter().any(|e| !e.is_finite()) {
                return Err(DensityError::config(
                    "altitude edges must be finite and strictly increasing",
                ));
            }
        }

        // cell x altitude-bin selections are indexed with usize
        meta.nx
            .checked_mul(meta.ny)
            .and_then(|cells| cells.checked_mul(altitude_edges_ft.len() - 1))
            .ok_or_else(|| {
                DensityError::config(format!(
                    "grid of {} x {} cells with {} altitude bins is too large to index",
                    meta.ny,
                    meta.nx,
                    altitude_edges_ft.len() - 1
                ))
            })?;

        let step = 1.0 / meta.bins_per_degree;
        let lat_cutpoints = (0..=meta.ny)
            .map(|i| meta.north_lat - i as f64 * step)
            .collect();
        let lon_cutpoints = (0..=meta.nx)
            .map(|j| meta.west_lon + j as f64 * step)
            .collect();

        Ok(Self {
            meta,
            lat_cutpoints,
            lon_cutpoints,
            altitude_edges_ft,
        })
    }

    pub fn metadata(&self) -> &GridMetadata {
        &self.meta
    }

    pub fn nx(&self) -> usize {
        self.meta.nx
    }

    pub fn ny(&self) -> usize {
        self.meta.ny
    }

    pub fn nt(&self) -> usize {
        self.meta.nt
    }

    /// Number of altitude bins, `AGL edges + MSL edges − 1`.
    pub fn nh(&self) -> usize {
        self.altitude_edges_ft.len() - 1
    }

    pub fn cell_count(&self) -> usize {
        self.meta.nx * self.meta.ny
    }

    /// Latitude cutpoints, descending from the north origin.
    pub fn lat_cutpoints(&self) -> &[f64] {
        &self.lat_cutpoints
    }

    /// Longitude cutpoints, ascending from the west origin.
    pub fn lon_cutpoints(&self) -> &[f64] {
        &self.lon_cutpoints
    }

    pub fn lat_midpoints(&self) -> Vec<f64> {
        self.lat_cutpoints
            .windows(2)
            .map(|w| 0.5 * (w[0] + w[1]))
            .collect()
    }

    pub fn lon_midpoints(&self) -> Vec<f64> {
        self.lon_cutpoints
            .windows(2)
            .map(|w| 0.5 * (w[0] + w[1]))
            .collect()
    }

    /// Merged `[AGL..., MSL...]` edge table.
    pub fn altitude_edges_ft(&self) -> &[f64] {
        &self.altitude_edges_ft
    }

    pub fn south_lat(&self) -> f64 {
        self.lat_cutpoints[self.meta.ny]
    }

    pub fn east_lon(&self) -> f64 {
        self.lon_cutpoints[self.meta.nx]
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat <= self.meta.north_lat
            && lat >= self.south_lat()
            && lon >= self.meta.west_lon
            && lon <= self.east_lon()
    }

    /// Flat index of a horizontal cell.
    pub fn cell_offset(&self, row: usize, col: usize) -> usize {
        row * self.meta.nx + col
    }

    /// Grid cell containing a position.
    pub fn cell_index(&self, lat: f64, lon: f64) -> Result<(usize, usize)> {
        let north = self.meta.north_lat;
        let south = self.south_lat();
        if !lat.is_finite() || lat > north || lat < south {
            return Err(DensityError::Range {
                axis: GridAxis::Latitude,
                value: lat,
                min: south,
                max: north,
            });
        }
        let west = self.meta.west_lon;
        let east = self.east_lon();
        if !lon.is_finite() || lon < west || lon > east {
            return Err(DensityError::Range {
                axis: GridAxis::Longitude,
                value: lon,
                min: west,
                max: east,
            });
        }

        // Interior cutpoints belong to the southern/eastern neighbour.
        let row = (((north - lat) * self.meta.bins_per_degree).floor() as usize)
            .min(self.meta.ny - 1);
        let col =
            (((lon - west) * self.meta.bins_per_degree).floor() as usize).min(self.meta.nx - 1);
        Ok((row, col))
    }

    /// `(lat_min, lat_max, lon_min, lon_max)` of a cell.
    pub fn cell_bounds(&self, row: usize, col: usize) -> Result<(f64, f64, f64, f64)> {
        if row >= self.meta.ny {
            return Err(DensityError::Range {
                axis: GridAxis::Latitude,
                value: row as f64,
                min: 0.0,
                max: (self.meta.ny - 1) as f64,
            });
        }
        if col >= self.meta.nx {
            return Err(DensityError::Range {
                axis: GridAxis::Longitude,
                value: col as f64,
                min: 0.0,
                max: (self.meta.nx - 1) as f64,
            });
        }
        Ok((
            self.lat_cutpoints[row + 1],
            self.lat_cutpoints[row],
            self.lon_cutpoints[col],
            self.lon_cutpoints[col + 1],
        ))
    }

    /// Geodesic horizontal area of a cell in NM².
    pub fn cell_area_nm2(&self, row: usize, col: usize) -> Result<f64> {
        let (lat_min, lat_max, lon_min, lon_max) = self.cell_bounds(row, col)?;
        Ok(quadrangle_area_nm2(lat_min, lat_max, lon_min, lon_max))
    }

    fn agl_count(&self) -> usize {
        self.meta.agl_edges_ft.len()
    }

    pub fn reference_of(&self, bin: usize) -> AltitudeReference {
        let a = self.agl_count();
        if bin + 1 < a {
            AltitudeReference::Agl
        } else if bin + 1 == a {
            AltitudeReference::Transition
        } else {
            AltitudeReference::Msl
        }
    }

    /// Altitude bin resolved over terrain, bounds in feet MSL.
    ///
    /// MSL-referenced bins never reach below the top AGL edge over terrain,
    /// so their thickness may collapse to zero in high terrain.
    pub fn altitude_layer(&self, bin: usize, terrain_ft: f64) -> Result<AltitudeLayer> {
        let nh = self.nh();
        if bin >= nh {
            return Err(DensityError::Range {
                axis: GridAxis::Altitude,
                value: bin as f64,
                min: 0.0,
                max: (nh - 1) as f64,
            });
        }
        let edges = &self.altitude_edges_ft;
        let reference = self.reference_of(bin);
        let top_agl_msl = terrain_ft + edges[self.agl_count() - 1];
        let (lower, upper) = match reference {
            AltitudeReference::Agl => (terrain_ft + edges[bin], terrain_ft + edges[bin + 1]),
            AltitudeReference::Transition => (top_agl_msl, edges[bin + 1]),
            AltitudeReference::Msl => (edges[bin].max(top_agl_msl), edges[bin + 1]),
        };
        Ok(AltitudeLayer {
            bin,
            reference,
            lower_msl_ft: lower,
            upper_msl_ft: upper.max(lower),
        })
    }

    /// All altitude layers of a cell, bottom to top.
    pub fn altitude_layers(&self, terrain_ft: f64) -> Vec<AltitudeLayer> {
        (0..self.nh())
            .filter_map(|bin| self.altitude_layer(bin, terrain_ft).ok())
            .collect()
    }

    /// Altitude bin containing an MSL altitude over the given terrain.
    ///
    /// AGL edges apply up to the top AGL edge above terrain, MSL edges above.
    /// Zero-thickness layers are never returned.
    pub fn altitude_bin(
        &self,
        altitude_msl_ft: f64,
        terrain_ft: f64,
        rule: AltitudeBoundaryRule,
    ) -> Result<usize> {
        let layers: Vec<AltitudeLayer> = self
            .altitude_layers(terrain_ft)
            .into_iter()
            .filter(|layer| layer.thickness_ft() > 0.0)
            .collect();
        let (Some(first), Some(last)) = (layers.first(), layers.last()) else {
            return Err(DensityError::config("no altitude bins above terrain"));
        };

        let out_of_range = !altitude_msl_ft.is_finite()
            || altitude_msl_ft < first.lower_msl_ft
            || altitude_msl_ft > last.upper_msl_ft;
        if out_of_range {
            return Err(DensityError::Range {
                axis: GridAxis::Altitude,
                value: altitude_msl_ft,
                min: first.lower_msl_ft,
                max: last.upper_msl_ft,
            });
        }

        let owns = |layer: &AltitudeLayer| match rule {
            AltitudeBoundaryRule::LowerInclusive => {
                altitude_msl_ft >= layer.lower_msl_ft && altitude_msl_ft < layer.upper_msl_ft
            }
            AltitudeBoundaryRule::UpperInclusive => {
                altitude_msl_ft > layer.lower_msl_ft && altitude_msl_ft <= layer.upper_msl_ft
            }
        };
        // Outer edges fall back to the nearest bin.
        let bin = layers
            .iter()
            .find(|layer| owns(layer))
            .map(|layer| layer.bin)
            .unwrap_or(if altitude_msl_ft >= last.upper_msl_ft {
                last.bin
            } else {
                first.bin
            });
        Ok(bin)
    }

    /// Validate a time-of-day bin index.
    pub fn check_time_bin(&self, time_bin: usize) -> Result<()> {
        if time_bin >= self.meta.nt {
            return Err(DensityError::Range {
                axis: GridAxis::Time,
                value: time_bin as f64,
                min: 0.0,
                max: (self.meta.nt - 1) as f64,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_grid() -> GridSpec {
        GridSpec::new(GridMetadata {
            bins_per_degree: 2.0,
            north_lat: 42.0,
            west_lon: -72.0,
            nx: 4,
            ny: 2,
            nt: 4,
            agl_edges_ft: vec![0.0, 500.0, 1200.0, 3000.0],
            msl_edges_ft: vec![5000.0, 10000.0],
        })
        .unwrap()
    }

    #[test]
    fn bin_count_follows_edge_tables() {
        let grid = sample_grid();
        assert_eq!(grid.nh(), 4 + 2 - 1);
        assert_eq!(grid.altitude_edges_ft().len(), grid.nh() + 1);
    }

    #[test]
    fn oversized_grid_is_configuration_error() {
        let err = GridSpec::new(GridMetadata {
            nx: usize::MAX / 2,
            ny: 3,
            ..sample_grid().metadata().clone()
        })
        .unwrap_err();
        assert!(matches!(err, DensityError::Configuration(_)));
    }

    #[test]
    fn cutpoints_run_south_and_east() {
        let grid = sample_grid();
        assert_eq!(grid.lat_cutpoints(), &[42.0, 41.5, 41.0]);
        assert_eq!(grid.lon_cutpoints(), &[-72.0, -71.5, -71.0, -70.5, -70.0]);
        assert_eq!(grid.lat_midpoints(), vec![41.75, 41.25]);
    }

    #[test]
    fn cell_index_and_bounds_agree() {
        let grid = sample_grid();
        let (row, col) = grid.cell_index(41.3, -70.7).unwrap();
        assert_eq!((row, col), (1, 2));
        let (lat_min, lat_max, lon_min, lon_max) = grid.cell_bounds(row, col).unwrap();
        assert!(lat_min <= 41.3 && 41.3 <= lat_max);
        assert!(lon_min <= -70.7 && -70.7 <= lon_max);
    }

    #[test]
    fn outer_edges_map_to_last_cell() {
        let grid = sample_grid();
        assert_eq!(grid.cell_index(41.0, -70.0).unwrap(), (1, 3));
        assert_eq!(grid.cell_index(42.0, -72.0).unwrap(), (0, 0));
    }

    #[test]
    fn out_of_grid_position_is_range_error() {
        let grid = sample_grid();
        let err = grid.cell_index(43.0, -71.0).unwrap_err();
        assert!(matches!(
            err,
            DensityError::Range {
                axis: GridAxis::Latitude,
                ..
            }
        ));
        let err = grid.cell_index(41.5, -69.0).unwrap_err();
        assert!(matches!(
            err,
            DensityError::Range {
                axis: GridAxis::Longitude,
                ..
            }
        ));
    }

    #[test]
    fn layers_follow_terrain_for_agl_and_transition() {
        let grid = sample_grid();
        let layers = grid.altitude_layers(1000.0);
        assert_eq!(layers[0].reference, AltitudeReference::Agl);
        assert_eq!(layers[0].lower_msl_ft, 1000.0);
        assert_eq!(layers[2].reference, AltitudeReference::Agl);
        assert_eq!(layers[3].reference, AltitudeReference::Transition);
        assert_eq!(layers[3].lower_msl_ft, 4000.0);
        assert_eq!(layers[3].upper_msl_ft, 5000.0);
        assert_eq!(layers[4].reference, AltitudeReference::Msl);
        assert_eq!(layers[4].thickness_ft(), 5000.0);
    }

    #[test]
    fn transition_collapses_in_high_terrain() {
        let grid = sample_grid();
        let layers = grid.altitude_layers(2500.0);
        // 2500 + 3000 AGL is above the 5000 ft MSL edge
        assert_eq!(layers[3].thickness_ft(), 0.0);
        assert_eq!(layers[4].lower_msl_ft, 5500.0);
        assert_eq!(layers[4].thickness_ft(), 4500.0);
    }

    #[test]
    fn altitude_bin_uses_agl_below_top_agl_edge() {
        let grid = sample_grid();
        let rule = AltitudeBoundaryRule::LowerInclusive;
        // 1800 ft MSL over 1000 ft terrain is 800 ft AGL
        assert_eq!(grid.altitude_bin(1800.0, 1000.0, rule).unwrap(), 1);
        assert_eq!(grid.altitude_bin(4500.0, 1000.0, rule).unwrap(), 3);
        assert_eq!(grid.altitude_bin(7000.0, 1000.0, rule).unwrap(), 4);
    }

    #[test]
    fn boundary_rule_decides_edge_ownership() {
        let grid = sample_grid();
        // exactly 500 ft AGL over sea-level terrain
        assert_eq!(
            grid.altitude_bin(500.0, 0.0, AltitudeBoundaryRule::LowerInclusive)
                .unwrap(),
            1
        );
        assert_eq!(
            grid.altitude_bin(500.0, 0.0, AltitudeBoundaryRule::UpperInclusive)
                .unwrap(),
            0
        );
        // transition/MSL boundary
        assert_eq!(
            grid.altitude_bin(5000.0, 0.0, AltitudeBoundaryRule::LowerInclusive)
                .unwrap(),
            4
        );
        assert_eq!(
            grid.altitude_bin(5000.0, 0.0, AltitudeBoundaryRule::UpperInclusive)
                .unwrap(),
            3
        );
    }

    #[test]
    fn altitude_outside_edges_is_range_error() {
        let grid = sample_grid();
        let rule = AltitudeBoundaryRule::LowerInclusive;
        assert!(grid.altitude_bin(-10.0, 0.0, rule).is_err());
        assert!(grid.altitude_bin(12_000.0, 0.0, rule).is_err());
        assert_eq!(grid.altitude_bin(10_000.0, 0.0, rule).unwrap(), 4);
    }

    #[test]
    fn rejects_non_increasing_edges() {
        let err = GridSpec::new(GridMetadata {
            bins_per_degree: 1.0,
            north_lat: 40.0,
            west_lon: -100.0,
            nx: 1,
            ny: 1,
            nt: 1,
            agl_edges_ft: vec![0.0, 500.0, 400.0],
            msl_edges_ft: vec![5000.0],
        })
        .unwrap_err();
        assert!(matches!(err, DensityError::Configuration(_)));
    }

    #[test]
    fn deserializes_through_validation() {
        let json = r#"{
            "bins_per_degree": 1.0, "north_lat": 40.0, "west_lon": -100.0,
            "nx": 0, "ny": 1, "nt": 1,
            "agl_edges_ft": [0.0, 500.0], "msl_edges_ft": [5000.0]
        }"#;
        assert!(serde_json::from_str::<GridSpec>(json).is_err());
    }
}
