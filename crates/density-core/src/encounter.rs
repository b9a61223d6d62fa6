//! Encounter models: intruder speed distributions by altitude layer.
//!
//! The correlated model describes discrete-code (ATC-managed) traffic, the
//! uncorrelated model 1200-code traffic. Each model is a table of intruder
//! speed bins per AGL altitude layer. Relative closure speed is the expected
//! magnitude of the velocity difference under a uniformly random relative
//! heading, averaged over the intruder speed distribution.
//!
//! Text format:
//!
//! ```text
//! # comment
//! model uncorrelated
//! altitude_ft 0 1200 3000 5000 18000
//! speed_kts 0 50 100 150 250
//! weights 0.2 0.5 0.2 0.1        (one line per altitude layer)
//! ```

use crate::error::{DensityError, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::str::FromStr;

/// AGM iterations; convergence is quadratic, so a handful suffice.
const AGM_MAX_ITERATIONS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncounterKind {
    Correlated,
    Uncorrelated,
}

impl FromStr for EncounterKind {
    type Err = DensityError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "correlated" | "cor" => Ok(Self::Correlated),
            "uncorrelated" | "uncor" => Ok(Self::Uncorrelated),
            other => Err(DensityError::config(format!(
                "unknown encounter model kind '{}'",
                other
            ))),
        }
    }
}

/// Intruder speed distribution per altitude layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounterTable {
    kind: EncounterKind,
    altitude_edges_ft: Vec<f64>,
    speed_edges_kts: Vec<f64>,
    /// Normalised weights, one row per altitude layer.
    weights: Vec<Vec<f64>>,
}

impl EncounterTable {
    pub fn new(
        kind: EncounterKind,
        altitude_edges_ft: Vec<f64>,
        speed_edges_kts: Vec<f64>,
        weights: Vec<Vec<f64>>,
    ) -> Result<Self> {
        check_edges("altitude_ft", &altitude_edges_ft)?;
        check_edges("speed_kts", &speed_edges_kts)?;
        if speed_edges_kts[0] < 0.0 {
            return Err(DensityError::config("speed edges must be non-negative"));
        }
        let layers = altitude_edges_ft.len() - 1;
        let bins = speed_edges_kts.len() - 1;
        if weights.len() != layers {
            return Err(DensityError::config(format!(
                "encounter model has {} weight rows for {} altitude layers",
                weights.len(),
                layers
            )));
        }

        let mut normalised = Vec::with_capacity(layers);
        for (layer, row) in weights.into_iter().enumerate() {
            if row.len() != bins {
                return Err(DensityError::config(format!(
                    "altitude layer {} has {} weights for {} speed bins",
                    layer,
                    row.len(),
                    bins
                )));
            }
            if row.iter().any(|w| !w.is_finite() || *w < 0.0) {
                return Err(DensityError::config(format!(
                    "altitude layer {} has negative or non-finite weights",
                    layer
                )));
            }
            let total: f64 = row.iter().sum();
            if total <= 0.0 {
                return Err(DensityError::config(format!(
                    "altitude layer {} has no speed weight",
                    layer
                )));
            }
            normalised.push(row.into_iter().map(|w| w / total).collect());
        }

        Ok(Self {
            kind,
            altitude_edges_ft,
            speed_edges_kts,
            weights: normalised,
        })
    }

    /// Parse a model file's contents.
    pub fn parse(text: &str) -> Result<Self> {
        let mut kind = None;
        let mut altitude_edges = None;
        let mut speed_edges = None;
        let mut weights = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let line_no = idx + 1;
            let mut tokens = line.split_whitespace();
            let Some(key) = tokens.next() else {
                continue;
            };
            let rest: Vec<&str> = tokens.collect();

            match key {
                "model" => {
                    let [value] = rest.as_slice() else {
                        return Err(DensityError::config(format!(
                            "line {}: 'model' takes exactly one value",
                            line_no
                        )));
                    };
                    kind = Some(value.parse::<EncounterKind>()?);
                }
                "altitude_ft" => altitude_edges = Some(parse_numbers(&rest, line_no)?),
                "speed_kts" => speed_edges = Some(parse_numbers(&rest, line_no)?),
                "weights" => weights.push(parse_numbers(&rest, line_no)?),
                other => {
                    return Err(DensityError::config(format!(
                        "line {}: unknown key '{}'",
                        line_no, other
                    )))
                }
            }
        }

        let kind = kind.ok_or_else(|| DensityError::config("encounter model missing 'model'"))?;
        let altitude_edges = altitude_edges
            .ok_or_else(|| DensityError::config("encounter model missing 'altitude_ft'"))?;
        let speed_edges = speed_edges
            .ok_or_else(|| DensityError::config("encounter model missing 'speed_kts'"))?;
        Self::new(kind, altitude_edges, speed_edges, weights)
    }

    pub fn kind(&self) -> EncounterKind {
        self.kind
    }

    /// Layer containing an AGL altitude, clamped to the outermost layers.
    pub fn layer_index(&self, altitude_agl_ft: f64) -> usize {
        let layers = self.weights.len();
        self.altitude_edges_ft[1..layers]
            .iter()
            .take_while(|edge| altitude_agl_ft >= **edge)
            .count()
    }

    fn speed_midpoints(&self) -> impl Iterator<Item = f64> + '_ {
        self.speed_edges_kts.windows(2).map(|w| 0.5 * (w[0] + w[1]))
    }

    /// Mean intruder speed of the layer.
    pub fn mean_speed_kts(&self, altitude_agl_ft: f64) -> f64 {
        let layer = &self.weights[self.layer_index(altitude_agl_ft)];
        self.speed_midpoints()
            .zip(layer)
            .map(|(speed, weight)| speed * weight)
            .sum()
    }

    /// Expected closure speed against this model's traffic.
    pub fn relative_speed_kts(&self, own_speed_kts: f64, altitude_agl_ft: f64) -> f64 {
        let layer = &self.weights[self.layer_index(altitude_agl_ft)];
        self.speed_midpoints()
            .zip(layer)
            .filter(|(_, weight)| **weight > 0.0)
            .map(|(speed, weight)| weight * mean_closure_speed(own_speed_kts, speed))
            .sum()
    }
}

/// Mean of `|u − v·e^{iθ}|` over θ uniform on [0, π).
///
/// Closed form `(2/π)(u + v)·E(k)` with modulus `k = 2√(uv)/(u + v)`.
pub fn mean_closure_speed(own_kts: f64, intruder_kts: f64) -> f64 {
    if own_kts <= 0.0 || intruder_kts <= 0.0 {
        return own_kts.max(0.0) + intruder_kts.max(0.0);
    }
    let sum = own_kts + intruder_kts;
    let k = 2.0 * (own_kts * intruder_kts).sqrt() / sum;
    2.0 / PI * sum * complete_elliptic_e(k)
}

/// Complete elliptic integral of the second kind by the arithmetic-geometric mean.
fn complete_elliptic_e(k: f64) -> f64 {
    let k2 = (k * k).min(1.0);
    let mut a = 1.0;
    let mut b = (1.0 - k2).sqrt();
    if b == 0.0 {
        return 1.0;
    }
    // Σ 2^(n−1)·c_n², starting from c_0 = k
    let mut weight = 0.5;
    let mut sum = weight * k2;
    for _ in 0..AGM_MAX_ITERATIONS {
        if a - b <= f64::EPSILON * a {
            break;
        }
        let c = 0.5 * (a - b);
        let next_b = (a * b).sqrt();
        a = 0.5 * (a + b);
        b = next_b;
        weight *= 2.0;
        sum += weight * c * c;
    }
    PI / (2.0 * a) * (1.0 - sum)
}

/// Share of discrete-code vs 1200-code traffic used to blend the two models.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrafficMix {
    pub discrete: f64,
    pub code1200: f64,
}

impl TrafficMix {
    pub fn new(discrete: f64, code1200: f64) -> Self {
        Self {
            discrete: discrete.max(0.0),
            code1200: code1200.max(0.0),
        }
    }

    pub fn discrete_only() -> Self {
        Self::new(1.0, 0.0)
    }

    pub fn code1200_only() -> Self {
        Self::new(0.0, 1.0)
    }

    /// Normalised `(correlated, uncorrelated)` weights; equal when both are zero.
    fn weights(&self) -> (f64, f64) {
        let total = self.discrete + self.code1200;
        if total <= 0.0 {
            (0.5, 0.5)
        } else {
            (self.discrete / total, self.code1200 / total)
        }
    }
}

/// Correlated and uncorrelated models, immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounterModel {
    correlated: EncounterTable,
    uncorrelated: EncounterTable,
}

impl EncounterModel {
    pub fn new(correlated: EncounterTable, uncorrelated: EncounterTable) -> Result<Self> {
        if correlated.kind != EncounterKind::Correlated {
            return Err(DensityError::config(
                "correlated slot holds an uncorrelated model",
            ));
        }
        if uncorrelated.kind != EncounterKind::Uncorrelated {
            return Err(DensityError::config(
                "uncorrelated slot holds a correlated model",
            ));
        }
        Ok(Self {
            correlated,
            uncorrelated,
        })
    }

    pub fn parse(correlated: &str, uncorrelated: &str) -> Result<Self> {
        Self::new(
            EncounterTable::parse(correlated)?,
            EncounterTable::parse(uncorrelated)?,
        )
    }

    pub fn table(&self, kind: EncounterKind) -> &EncounterTable {
        match kind {
            EncounterKind::Correlated => &self.correlated,
            EncounterKind::Uncorrelated => &self.uncorrelated,
        }
    }

    /// Own speed when none is configured: the traffic-weighted model average.
    pub fn default_own_speed_kts(&self, altitude_agl_ft: f64, mix: TrafficMix) -> f64 {
        let (wc, wu) = mix.weights();
        wc * self.correlated.mean_speed_kts(altitude_agl_ft)
            + wu * self.uncorrelated.mean_speed_kts(altitude_agl_ft)
    }

    /// Expected relative closure speed for the given own speed and traffic mix.
    pub fn relative_speed(
        &self,
        own_speed_kts: Option<f64>,
        altitude_agl_ft: f64,
        mix: TrafficMix,
    ) -> f64 {
        let own = own_speed_kts
            .unwrap_or_else(|| self.default_own_speed_kts(altitude_agl_ft, mix))
            .max(0.0);
        let (wc, wu) = mix.weights();
        let mut speed = 0.0;
        if wc > 0.0 {
            speed += wc * self.correlated.relative_speed_kts(own, altitude_agl_ft);
        }
        if wu > 0.0 {
            speed += wu * self.uncorrelated.relative_speed_kts(own, altitude_agl_ft);
        }
        speed
    }
}

fn parse_numbers(tokens: &[&str], line_no: usize) -> Result<Vec<f64>> {
    tokens
        .iter()
        .map(|token| {
            token.parse::<f64>().map_err(|_| {
                DensityError::config(format!("line {}: '{}' is not a number", line_no, token))
            })
        })
        .collect()
}

fn check_edges(name: &str, edges: &[f64]) -> Result<()> {
    if edges.len() < 2 {
        return Err(DensityError::config(format!("{} needs at least two edges", name)));
    }
    let valid = edges.iter().all(|e| e.is_finite()) && edges.windows(2).all(|w| w[1] > w[0]);
    if !valid {
        return Err(DensityError::config(format!(
            "{} edges must be finite and strictly increasing",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const UNCORRELATED: &str = "\
# 1200-code traffic
model uncorrelated
altitude_ft 0 1200 3000 20000
speed_kts 0 100 200
weights 1 1
weights 0 1
weights 0 1
";

    pub(crate) const CORRELATED: &str = "\
model correlated
altitude_ft 0 20000
speed_kts 200 300
weights 1
";

    pub(crate) fn sample_model() -> EncounterModel {
        EncounterModel::parse(CORRELATED, UNCORRELATED).unwrap()
    }

    #[test]
    fn parses_and_normalises_weights() {
        let table = EncounterTable::parse(UNCORRELATED).unwrap();
        assert_eq!(table.kind(), EncounterKind::Uncorrelated);
        // midpoints 50 and 150, equal weight
        assert!((table.mean_speed_kts(500.0) - 100.0).abs() < 1e-9);
        assert!((table.mean_speed_kts(2000.0) - 150.0).abs() < 1e-9);
    }

    #[test]
    fn layer_lookup_clamps_outside_edges() {
        let table = EncounterTable::parse(UNCORRELATED).unwrap();
        assert_eq!(table.layer_index(-50.0), 0);
        assert_eq!(table.layer_index(1200.0), 1);
        assert_eq!(table.layer_index(50_000.0), 2);
    }

    #[test]
    fn closure_speed_limits() {
        assert!((mean_closure_speed(0.0, 120.0) - 120.0).abs() < 1e-9);
        assert!((mean_closure_speed(80.0, 0.0) - 80.0).abs() < 1e-9);
        // equal speeds: 4v/π
        let v = 100.0;
        let expected = 4.0 * v / PI;
        assert!((mean_closure_speed(v, v) - expected).abs() < 1e-9);
    }

    #[test]
    fn elliptic_integral_matches_known_values() {
        assert!((complete_elliptic_e(0.0) - PI / 2.0).abs() < 1e-14);
        assert!((complete_elliptic_e(1.0) - 1.0).abs() < 1e-14);
        // E(1/√2) = 1.350643881047675...
        let e = complete_elliptic_e(std::f64::consts::FRAC_1_SQRT_2);
        assert!((e - 1.350_643_881_047_675).abs() < 1e-12);
    }

    #[test]
    fn closure_speed_matches_fine_quadrature() {
        let (u, v) = (120.0, 45.0);
        let n = 200_000;
        let step = PI / n as f64;
        let numeric: f64 = (0..n)
            .map(|i| {
                let theta = (i as f64 + 0.5) * step;
                (u * u + v * v - 2.0 * u * v * theta.cos()).sqrt()
            })
            .sum::<f64>()
            / n as f64;
        assert!((mean_closure_speed(u, v) - numeric).abs() < 1e-6);
    }

    #[test]
    fn closure_speed_is_symmetric_and_bounded() {
        let a = mean_closure_speed(90.0, 150.0);
        let b = mean_closure_speed(150.0, 90.0);
        assert!((a - b).abs() < 1e-9);
        assert!(a >= 60.0 && a <= 240.0);
    }

    #[test]
    fn blend_follows_traffic_mix() {
        let model = sample_model();
        let own = Some(100.0);
        let correlated = model.relative_speed(own, 500.0, TrafficMix::discrete_only());
        let uncorrelated = model.relative_speed(own, 500.0, TrafficMix::code1200_only());
        let blended = model.relative_speed(own, 500.0, TrafficMix::new(3.0, 1.0));
        assert!((blended - (0.75 * correlated + 0.25 * uncorrelated)).abs() < 1e-9);
        let even = model.relative_speed(own, 500.0, TrafficMix::new(0.0, 0.0));
        assert!((even - 0.5 * (correlated + uncorrelated)).abs() < 1e-9);
    }

    #[test]
    fn own_speed_defaults_to_model_average() {
        let model = sample_model();
        let mix = TrafficMix::code1200_only();
        let implicit = model.relative_speed(None, 2000.0, mix);
        let explicit = model.relative_speed(Some(150.0), 2000.0, mix);
        assert!((implicit - explicit).abs() < 1e-9);
    }

    #[test]
    fn malformed_content_is_configuration_error() {
        let missing_rows = "model correlated\naltitude_ft 0 100 200\nspeed_kts 0 10\nweights 1\n";
        assert!(matches!(
            EncounterTable::parse(missing_rows),
            Err(DensityError::Configuration(_))
        ));
        let bad_number = "model correlated\naltitude_ft 0 abc\n";
        assert!(EncounterTable::parse(bad_number).is_err());
        let unknown = "model sideways\n";
        assert!(EncounterTable::parse(unknown).is_err());
        let zero_weight = "model correlated\naltitude_ft 0 100\nspeed_kts 0 10\nweights 0\n";
        assert!(EncounterTable::parse(zero_weight).is_err());
    }

    #[test]
    fn rejects_swapped_models() {
        let err = EncounterModel::parse(UNCORRELATED, CORRELATED).unwrap_err();
        assert!(matches!(err, DensityError::Configuration(_)));
    }
}
