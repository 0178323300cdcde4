//! Per-leg weather surfaces.
//!
//! Forecasts arrive as samples on a (distance, time) grid and are attached
//! to a leg exactly once before simulation. Three channels matter to the
//! engine: headwind along the course, irradiance on a flat-mounted array
//! (driving), and irradiance on an optimally tilted array (stationary
//! charging).

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::SimResult;
use crate::interp::Grid2;

pub(crate) fn to_timestamp(at: NaiveDateTime) -> f64 {
    at.and_utc().timestamp() as f64
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegWeather {
    headwind: Grid2,
    sun_flat: Grid2,
    sun_tilt: Grid2,
}

impl LegWeather {
    #[must_use]
    pub fn new(headwind: Grid2, sun_flat: Grid2, sun_tilt: Grid2) -> Self {
        Self {
            headwind,
            sun_flat,
            sun_tilt,
        }
    }

    /// Synthetic forecast holding each channel constant over a distance and
    /// time window. Useful for dry runs and tests when no real forecast has
    /// been generated yet.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Config` when the window is degenerate.
    pub fn uniform(
        length: f64,
        from: NaiveDateTime,
        until: NaiveDateTime,
        headwind: f64,
        sun_flat: f64,
        sun_tilt: f64,
    ) -> SimResult<Self> {
        let xs = vec![0.0, length.max(1.0)];
        let ts = vec![to_timestamp(from), to_timestamp(until)];
        let grid = |value: f64| Grid2::filled(xs.clone(), ts.clone(), vec![value; 4]);
        Ok(Self {
            headwind: grid(headwind)?,
            sun_flat: grid(sun_flat)?,
            sun_tilt: grid(sun_tilt)?,
        })
    }

    /// Headwind in m/s at a point and time, `None` where unsampled.
    #[must_use]
    pub fn headwind(&self, dist: f64, at: NaiveDateTime) -> Option<f64> {
        self.headwind.sample(dist, to_timestamp(at))
    }

    /// Flat-array irradiance in W/m^2, `None` where unsampled.
    #[must_use]
    pub fn sun_flat(&self, dist: f64, at: NaiveDateTime) -> Option<f64> {
        self.sun_flat.sample(dist, to_timestamp(at))
    }

    /// Tilted-array irradiance in W/m^2, `None` where unsampled.
    #[must_use]
    pub fn sun_tilt(&self, dist: f64, at: NaiveDateTime) -> Option<f64> {
        self.sun_tilt.sample(dist, to_timestamp(at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn noon(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, day)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn uniform_forecast_covers_its_window() {
        let weather = LegWeather::uniform(10_000.0, noon(1), noon(2), 3.0, 800.0, 950.0).unwrap();
        assert!((weather.headwind(5_000.0, noon(1)).unwrap() - 3.0).abs() < 1e-9);
        assert!((weather.sun_flat(0.0, noon(2)).unwrap() - 800.0).abs() < 1e-9);
        assert!((weather.sun_tilt(10_000.0, noon(1)).unwrap() - 950.0).abs() < 1e-9);
        // Outside the sampled window there is no data.
        assert!(weather.headwind(5_000.0, noon(3)).is_none());
        assert!(weather.headwind(20_000.0, noon(1)).is_none());
    }
}
