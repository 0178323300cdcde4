//! Sunchaser Simulation Engine
//!
//! Platform-agnostic core of a solar car race simulator: per-tick kinematic
//! and energy integration plus the calendar-aware leg-transition rules of a
//! multi-day road rally. This crate has no I/O beyond JSON (de)serialization
//! of its configs and telemetry; runners live elsewhere.

pub mod car;
pub mod constants;
pub mod engine;
pub mod error;
pub mod interp;
pub mod physics;
pub mod route;
pub mod strategy;
pub mod telemetry;
pub mod units;

mod scheduler;

// Re-export commonly used types
pub use car::CarConfig;
pub use engine::{Command, RaceEnv, RaceState};
pub use error::{SimError, SimResult};
pub use interp::{Grid2, InterpMode, Series1, StepSeries};
pub use route::ingest::{AltitudeUnit, DistanceUnit, GeoRow, StepRow};
pub use route::{
    EndKind, GeoTable, Geometry, Leg, LegKind, LegSpec, LegWeather, Route, StepTable,
};
pub use strategy::{ScheduleRow, SpeedContext, Strategy, StrategyConfig};
pub use telemetry::{LegAttempt, TelemetryLog, TickRecord};
