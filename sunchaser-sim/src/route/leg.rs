//! One segment of the race route.
//!
//! A leg is immutable once built: geometry, schedules, and timing are fixed
//! by the route survey, and a weather forecast is attached exactly once
//! before simulation begins.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::interp::{Series1, StepSeries};
use crate::route::weather::LegWeather;

/// Whether a leg is driven one-way or out-and-back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegKind {
    /// One-way segment along the main route.
    Base,
    /// Optional out-and-back segment driven for extra miles.
    Loop,
}

/// What kind of control point ends a leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndKind {
    /// Mid-day control point that leads into another leg.
    Checkpoint,
    /// End-of-day control point.
    StageStop,
}

/// Continuous geometry channels for one leg, each valid over `[0, length]`
/// and extrapolated outside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub longitude: Series1,
    pub latitude: Series1,
    /// Percent grade.
    pub slope: Series1,
    /// Meters above sea level.
    pub altitude: Series1,
    /// Course heading in degrees, nearest-sample to respect wraparound.
    pub heading: Series1,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    pub name: String,
    pub kind: LegKind,
    pub end: EndKind,
    /// Course length in meters.
    pub length: f64,
    /// Earliest allowed departure onto the leg.
    pub start: NaiveDateTime,
    /// When the control point at the end of the leg opens.
    pub open: NaiveDateTime,
    /// When the leg must be finished.
    pub close: NaiveDateTime,
    geometry: Geometry,
    stop_distances: Vec<f64>,
    speed_limits: StepSeries,
    weather: Option<LegWeather>,
}

impl Leg {
    /// Assemble a leg from ingested geometry and schedules.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Config` when the timing window is inverted, the
    /// length is not positive, or the stop list is not strictly increasing.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: String,
        kind: LegKind,
        end: EndKind,
        length: f64,
        geometry: Geometry,
        stop_distances: Vec<f64>,
        speed_limits: StepSeries,
        start: NaiveDateTime,
        open: NaiveDateTime,
        close: NaiveDateTime,
    ) -> SimResult<Self> {
        if !(length > 0.0) {
            return Err(SimError::config(format!(
                "leg {name:?} must have positive length"
            )));
        }
        if start > open || open > close {
            return Err(SimError::config(format!(
                "leg {name:?} timing must satisfy start <= open <= close"
            )));
        }
        if stop_distances.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SimError::config(format!(
                "leg {name:?} stop distances must be strictly increasing"
            )));
        }
        Ok(Self {
            name,
            kind,
            end,
            length,
            start,
            open,
            close,
            geometry,
            stop_distances,
            speed_limits,
            weather: None,
        })
    }

    #[must_use]
    pub fn longitude(&self, dist: f64) -> f64 {
        self.geometry.longitude.sample(dist)
    }

    #[must_use]
    pub fn latitude(&self, dist: f64) -> f64 {
        self.geometry.latitude.sample(dist)
    }

    /// Percent grade at `dist` meters into the leg.
    #[must_use]
    pub fn slope(&self, dist: f64) -> f64 {
        self.geometry.slope.sample(dist)
    }

    /// Altitude in meters at `dist` meters into the leg.
    #[must_use]
    pub fn altitude(&self, dist: f64) -> f64 {
        self.geometry.altitude.sample(dist)
    }

    /// Course heading in degrees at `dist` meters into the leg.
    #[must_use]
    pub fn heading(&self, dist: f64) -> f64 {
        self.geometry.heading.sample(dist)
    }

    /// Mandatory stop points, strictly increasing, meters into the leg.
    #[must_use]
    pub fn stop_distances(&self) -> &[f64] {
        &self.stop_distances
    }

    /// Posted speed limit schedule, m/s keyed by distance markers.
    #[must_use]
    pub fn speed_limits(&self) -> &StepSeries {
        &self.speed_limits
    }

    /// Attach the weather forecast. May be called exactly once.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Config` when a forecast is already attached.
    pub fn attach_weather(&mut self, weather: LegWeather) -> SimResult<()> {
        if self.weather.is_some() {
            return Err(SimError::config(format!(
                "leg {:?} already has weather attached",
                self.name
            )));
        }
        self.weather = Some(weather);
        Ok(())
    }

    #[must_use]
    pub fn has_weather(&self) -> bool {
        self.weather.is_some()
    }

    /// Headwind in m/s; `None` where the forecast has no sample.
    #[must_use]
    pub fn headwind(&self, dist: f64, at: NaiveDateTime) -> Option<f64> {
        self.weather.as_ref().and_then(|w| w.headwind(dist, at))
    }

    /// Flat-array irradiance in W/m^2; `None` where unsampled.
    #[must_use]
    pub fn sun_flat(&self, dist: f64, at: NaiveDateTime) -> Option<f64> {
        self.weather.as_ref().and_then(|w| w.sun_flat(dist, at))
    }

    /// Tilted-array irradiance in W/m^2; `None` where unsampled.
    #[must_use]
    pub fn sun_tilt(&self, dist: f64, at: NaiveDateTime) -> Option<f64> {
        self.weather.as_ref().and_then(|w| w.sun_tilt(dist, at))
    }
}
