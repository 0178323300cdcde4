//! Per-tick race telemetry.
//!
//! The engine appends one record per tick, grouped by leg attempt (a leg
//! driven twice produces two attempts). The log serializes to JSON at race
//! end and doubles as a replay source: the command fields of a recorded
//! race can be fed back through the engine tick-for-tick.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::engine::Command;
use crate::units::mps_to_mph;

/// State and command snapshot taken at the top of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickRecord {
    pub time: NaiveDateTime,
    /// Meters into the current leg.
    pub dist: f64,
    /// Speed in m/s.
    pub speed: f64,
    pub target_mph: f64,
    pub accel: f64,
    pub decel: f64,
    pub try_loop: bool,
    /// Battery energy in joules.
    pub energy: f64,
    /// Motor power from the previous tick, watts.
    pub motor_power: f64,
    /// Array power from the previous tick, watts.
    pub array_power: f64,
}

impl TickRecord {
    #[must_use]
    pub fn command(&self) -> Command {
        Command {
            target_mph: self.target_mph,
            accel: self.accel,
            decel: self.decel,
            try_loop: self.try_loop,
        }
    }
}

/// All ticks recorded while driving one leg once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegAttempt {
    pub leg: String,
    pub ticks: Vec<TickRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TelemetryLog {
    attempts: Vec<LegAttempt>,
}

impl TelemetryLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new attempt; subsequent records land in it.
    pub fn begin_attempt(&mut self, leg: &str) {
        self.attempts.push(LegAttempt {
            leg: leg.to_string(),
            ticks: Vec::new(),
        });
    }

    /// Append a record to the current attempt.
    pub fn record(&mut self, tick: TickRecord) {
        if let Some(attempt) = self.attempts.last_mut() {
            attempt.ticks.push(tick);
        }
    }

    #[must_use]
    pub fn attempts(&self) -> &[LegAttempt] {
        &self.attempts
    }

    /// Names of the legs attempted, in order, repeats included.
    #[must_use]
    pub fn legs_attempted(&self) -> Vec<&str> {
        self.attempts.iter().map(|a| a.leg.as_str()).collect()
    }

    /// Flattened command sequence, one per recorded tick, for replay.
    #[must_use]
    pub fn commands(&self) -> Vec<Command> {
        self.attempts
            .iter()
            .flat_map(|a| a.ticks.iter().map(TickRecord::command))
            .collect()
    }

    fn speeds(&self) -> impl Iterator<Item = f64> + '_ {
        self.attempts
            .iter()
            .flat_map(|a| a.ticks.iter().map(|t| t.speed))
    }

    /// Mean speed over the whole race, mph.
    #[must_use]
    pub fn average_mph(&self) -> f64 {
        let (sum, count) = self
            .speeds()
            .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
        if count == 0 {
            return 0.0;
        }
        mps_to_mph(sum / count as f64)
    }

    /// Population standard deviation of speed, mph.
    #[must_use]
    pub fn stddev_mph(&self) -> f64 {
        let (sum, count) = self
            .speeds()
            .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
        if count == 0 {
            return 0.0;
        }
        let mean = sum / count as f64;
        let variance = self
            .speeds()
            .map(|v| {
                let d = v - mean;
                d * d
            })
            .sum::<f64>()
            / count as f64;
        mps_to_mph(variance.sqrt())
    }

    /// Serialize the full log to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a log back from JSON, e.g. for replay.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error.
    pub fn from_json(json_str: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json_str)
    }
}
