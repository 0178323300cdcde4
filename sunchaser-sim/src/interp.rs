//! In-memory interpolants for geometry, speed limits, and weather.
//!
//! Route geometry is sampled at survey points and queried at arbitrary
//! distances; weather is sampled on a (distance, time) grid and queried at
//! arbitrary points along the drive. All lookups are synchronous and
//! allocation-free once constructed, and everything serializes so a fully
//! built route can be snapshotted to disk.

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// How a [`Series1`] fills the space between samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InterpMode {
    /// Straight line between neighbours, extended past both ends.
    #[default]
    Linear,
    /// Value of the closest sample. Used for headings, where linear
    /// interpolation would sweep through the 0/360 wraparound.
    Nearest,
}

/// One-dimensional interpolant over strictly increasing sample positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series1 {
    xs: Vec<f64>,
    ys: Vec<f64>,
    mode: InterpMode,
}

impl Series1 {
    /// Build an interpolant from paired samples.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Config` when the slices are empty, differ in
    /// length, or the positions are not strictly increasing.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>, mode: InterpMode) -> SimResult<Self> {
        if xs.is_empty() {
            return Err(SimError::config("interpolant needs at least one sample"));
        }
        if xs.len() != ys.len() {
            return Err(SimError::config(format!(
                "interpolant sample mismatch: {} positions, {} values",
                xs.len(),
                ys.len()
            )));
        }
        if xs.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SimError::config(
                "interpolant positions must be strictly increasing",
            ));
        }
        Ok(Self { xs, ys, mode })
    }

    /// Linear interpolant, linearly extrapolated beyond both ends.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Series1::new`].
    pub fn linear(xs: Vec<f64>, ys: Vec<f64>) -> SimResult<Self> {
        Self::new(xs, ys, InterpMode::Linear)
    }

    /// Nearest-sample interpolant.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Series1::new`].
    pub fn nearest(xs: Vec<f64>, ys: Vec<f64>) -> SimResult<Self> {
        Self::new(xs, ys, InterpMode::Nearest)
    }

    /// Last sample position; for geometry channels this is the leg length.
    #[must_use]
    pub fn last_x(&self) -> f64 {
        *self.xs.last().unwrap_or(&0.0)
    }

    /// Sample the interpolant at `x`.
    #[must_use]
    pub fn sample(&self, x: f64) -> f64 {
        match self.mode {
            InterpMode::Linear => self.sample_linear(x),
            InterpMode::Nearest => self.sample_nearest(x),
        }
    }

    fn sample_linear(&self, x: f64) -> f64 {
        if self.xs.len() == 1 {
            return self.ys[0];
        }
        // Segment index such that the segment [i, i+1] brackets x, with the
        // first/last segment reused for extrapolation.
        let hi = self
            .xs
            .partition_point(|&sample| sample < x)
            .clamp(1, self.xs.len() - 1);
        let lo = hi - 1;
        let (x0, x1) = (self.xs[lo], self.xs[hi]);
        let (y0, y1) = (self.ys[lo], self.ys[hi]);
        if (x1 - x0).abs() < f64::EPSILON {
            return y1;
        }
        let frac = (x - x0) / (x1 - x0);
        y0 + (y1 - y0) * frac
    }

    fn sample_nearest(&self, x: f64) -> f64 {
        let hi = self.xs.partition_point(|&sample| sample < x);
        if hi == 0 {
            return self.ys[0];
        }
        if hi >= self.xs.len() {
            return self.ys[self.xs.len() - 1];
        }
        if (x - self.xs[hi - 1]).abs() <= (self.xs[hi] - x).abs() {
            self.ys[hi - 1]
        } else {
            self.ys[hi]
        }
    }
}

/// Piecewise-constant step function of distance, used for posted speed
/// limits. A lookup returns the value whose marker is at or before the query
/// point (forward fill); queries before the first marker return the first
/// value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSeries {
    markers: Vec<f64>,
    values: Vec<f64>,
}

impl StepSeries {
    /// Build a step function from marker/value pairs.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Config` when empty, mismatched, or the markers are
    /// not strictly increasing.
    pub fn new(markers: Vec<f64>, values: Vec<f64>) -> SimResult<Self> {
        if markers.is_empty() {
            return Err(SimError::config("step series needs at least one marker"));
        }
        if markers.len() != values.len() {
            return Err(SimError::config(format!(
                "step series mismatch: {} markers, {} values",
                markers.len(),
                values.len()
            )));
        }
        if markers.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SimError::config(
                "step series markers must be strictly increasing",
            ));
        }
        Ok(Self { markers, values })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Marker position at `index`.
    #[must_use]
    pub fn marker(&self, index: usize) -> f64 {
        self.markers.get(index).copied().unwrap_or(f64::INFINITY)
    }

    /// Value introduced at `index`.
    #[must_use]
    pub fn value(&self, index: usize) -> f64 {
        self.values
            .get(index)
            .copied()
            .unwrap_or_else(|| *self.values.last().unwrap_or(&f64::INFINITY))
    }

    /// Forward-fill lookup: the value active at distance `x`.
    #[must_use]
    pub fn value_at(&self, x: f64) -> f64 {
        let idx = self.markers.partition_point(|&marker| marker <= x);
        if idx == 0 {
            self.values[0]
        } else {
            self.values[idx - 1]
        }
    }
}

/// Bilinear interpolant over a regular (distance, time) grid.
///
/// Values are stored row-major, one row per distance sample. Cells with a
/// missing corner and queries outside the sampled rectangle return `None`;
/// callers substitute zero per the data-gap policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid2 {
    xs: Vec<f64>,
    ts: Vec<f64>,
    values: Vec<Option<f64>>,
}

impl Grid2 {
    /// Build a grid from axes and row-major values.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Config` when either axis is empty or unsorted, or
    /// when `values.len() != xs.len() * ts.len()`.
    pub fn new(xs: Vec<f64>, ts: Vec<f64>, values: Vec<Option<f64>>) -> SimResult<Self> {
        if xs.is_empty() || ts.is_empty() {
            return Err(SimError::config("grid axes must be non-empty"));
        }
        if xs.windows(2).any(|w| w[1] <= w[0]) || ts.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SimError::config("grid axes must be strictly increasing"));
        }
        if values.len() != xs.len() * ts.len() {
            return Err(SimError::config(format!(
                "grid expects {} values, got {}",
                xs.len() * ts.len(),
                values.len()
            )));
        }
        let values = values
            .into_iter()
            .map(|v| v.filter(|inner| inner.is_finite()))
            .collect();
        Ok(Self { xs, ts, values })
    }

    /// Convenience constructor for a grid with every sample present.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Grid2::new`].
    pub fn filled(xs: Vec<f64>, ts: Vec<f64>, values: Vec<f64>) -> SimResult<Self> {
        let values = values.into_iter().map(Some).collect();
        Self::new(xs, ts, values)
    }

    fn at(&self, xi: usize, ti: usize) -> Option<f64> {
        self.values[xi * self.ts.len() + ti]
    }

    /// Bilinear sample at `(x, t)`, or `None` outside the grid or over a
    /// missing sample.
    #[must_use]
    pub fn sample(&self, x: f64, t: f64) -> Option<f64> {
        if x < self.xs[0] || x > *self.xs.last()? || t < self.ts[0] || t > *self.ts.last()? {
            return None;
        }
        let xi = self
            .xs
            .partition_point(|&sample| sample <= x)
            .clamp(1, self.xs.len().max(2) - 1)
            - 1;
        let ti = self
            .ts
            .partition_point(|&sample| sample <= t)
            .clamp(1, self.ts.len().max(2) - 1)
            - 1;

        if self.xs.len() == 1 && self.ts.len() == 1 {
            return self.at(0, 0);
        }
        if self.xs.len() == 1 {
            let (t0, t1) = (self.ts[ti], self.ts[ti + 1]);
            let frac = (t - t0) / (t1 - t0);
            let (a, b) = (self.at(0, ti)?, self.at(0, ti + 1)?);
            return Some(a + (b - a) * frac);
        }
        if self.ts.len() == 1 {
            let (x0, x1) = (self.xs[xi], self.xs[xi + 1]);
            let frac = (x - x0) / (x1 - x0);
            let (a, b) = (self.at(xi, 0)?, self.at(xi + 1, 0)?);
            return Some(a + (b - a) * frac);
        }

        let (x0, x1) = (self.xs[xi], self.xs[xi + 1]);
        let (t0, t1) = (self.ts[ti], self.ts[ti + 1]);
        let fx = (x - x0) / (x1 - x0);
        let ft = (t - t0) / (t1 - t0);

        let v00 = self.at(xi, ti)?;
        let v01 = self.at(xi, ti + 1)?;
        let v10 = self.at(xi + 1, ti)?;
        let v11 = self.at(xi + 1, ti + 1)?;

        let lo = v00 + (v01 - v00) * ft;
        let hi = v10 + (v11 - v10) * ft;
        Some(lo + (hi - lo) * fx)
    }
}
