//! Own-aircraft track: time-ordered position and speed samples.

use crate::error::{Advisory, DensityError, Result};
use crate::spatial::{haversine_nm, SECONDS_PER_HOUR};
use serde::{Deserialize, Serialize};

/// Altitude below which a sample is flagged (ft MSL).
pub const LOW_ALTITUDE_WARNING_FT: f64 = -2000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackSample {
    #[serde(alias = "Time_s")]
    pub time_s: f64,
    #[serde(alias = "Lat_deg")]
    pub lat: f64,
    #[serde(alias = "Lon_deg")]
    pub lon: f64,
    #[serde(alias = "Alt_ft_msl")]
    pub altitude_msl_ft: f64,
    #[serde(alias = "Speed_kts")]
    pub speed_kts: f64,
}

impl TrackSample {
    pub fn new(time_s: f64, lat: f64, lon: f64, altitude_msl_ft: f64, speed_kts: f64) -> Self {
        Self {
            time_s,
            lat,
            lon,
            altitude_msl_ft,
            speed_kts,
        }
    }
}

/// Validated track with at least two samples and strictly increasing time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<TrackSample>", into = "Vec<TrackSample>")]
pub struct Track {
    samples: Vec<TrackSample>,
}

impl TryFrom<Vec<TrackSample>> for Track {
    type Error = DensityError;

    fn try_from(samples: Vec<TrackSample>) -> Result<Self> {
        Track::new(samples)
    }
}

impl From<Track> for Vec<TrackSample> {
    fn from(track: Track) -> Self {
        track.samples
    }
}

impl Track {
    pub fn new(samples: Vec<TrackSample>) -> Result<Self> {
        if samples.len() < 2 {
            return Err(DensityError::Argument(format!(
                "track needs at least two samples, got {}",
                samples.len()
            )));
        }
        for (idx, sample) in samples.iter().enumerate() {
            let finite = sample.time_s.is_finite()
                && sample.lat.is_finite()
                && sample.lon.is_finite()
                && sample.altitude_msl_ft.is_finite()
                && sample.speed_kts.is_finite();
            if !finite {
                return Err(DensityError::config(format!(
                    "track sample {} has non-finite values",
                    idx
                )));
            }
            if sample.speed_kts < 0.0 {
                return Err(DensityError::config(format!(
                    "track sample {} has negative speed {}",
                    idx, sample.speed_kts
                )));
            }
        }
        if let Some(idx) = samples.windows(2).position(|w| w[1].time_s <= w[0].time_s) {
            return Err(DensityError::config(format!(
                "track time must be strictly increasing: sample {} at {} s follows {} s",
                idx + 1,
                samples[idx + 1].time_s,
                samples[idx].time_s
            )));
        }
        Ok(Self { samples })
    }

    pub fn samples(&self) -> &[TrackSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Total duration in hours.
    pub fn duration_hr(&self) -> f64 {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => (last.time_s - first.time_s) / SECONDS_PER_HOUR,
            _ => 0.0,
        }
    }

    /// Great-circle length flown in NM.
    pub fn distance_nm(&self) -> f64 {
        self.samples
            .windows(2)
            .map(|w| haversine_nm(w[0].lat, w[0].lon, w[1].lat, w[1].lon))
            .sum()
    }

    /// `(lat_min, lat_max, lon_min, lon_max)` of all samples.
    pub fn bounding_box(&self) -> (f64, f64, f64, f64) {
        self.samples.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY),
            |(lat_min, lat_max, lon_min, lon_max), s| {
                (
                    lat_min.min(s.lat),
                    lat_max.max(s.lat),
                    lon_min.min(s.lon),
                    lon_max.max(s.lon),
                )
            },
        )
    }

    /// One advisory per sample below the low-altitude threshold.
    pub fn low_altitude_advisories(&self) -> Vec<Advisory> {
        self.samples
            .iter()
            .enumerate()
            .filter(|(_, s)| s.altitude_msl_ft < LOW_ALTITUDE_WARNING_FT)
            .map(|(idx, s)| Advisory::LowAltitude {
                sample: idx,
                altitude_ft: s.altitude_msl_ft,
            })
            .collect()
    }
}
