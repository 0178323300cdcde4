//! Driving strategies: how the target cruise speed is chosen each tick.
//!
//! Strategies are deterministic given their configuration; `Random` draws
//! from a seeded ChaCha stream so runs replay exactly.

use std::collections::HashMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// One row of a hardcoded speed schedule: from `distance_miles` into
/// `leg`, hold `speed_mph`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRow {
    pub leg: String,
    pub distance_miles: f64,
    pub speed_mph: f64,
}

fn default_hardcoded_mph() -> f64 {
    30.0
}

/// Strategy selection as it appears in a JSON config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum StrategyConfig {
    /// Uniform draw in `[min_mph, max_mph)` every tick.
    Random {
        min_mph: f64,
        max_mph: f64,
        #[serde(default)]
        seed: u64,
    },
    /// The same target speed forever.
    Lazy { target_mph: f64 },
    /// A per-leg schedule of (distance, speed) breakpoints.
    ///
    /// Rows are keyed by leg name, so a leg driven more than once (a
    /// redone loop) continues the same schedule across attempts; there is
    /// no way to give each attempt its own plan.
    Hardcoded {
        #[serde(default = "default_hardcoded_mph")]
        default_mph: f64,
        rows: Vec<ScheduleRow>,
    },
}

impl StrategyConfig {
    /// Parse a strategy config from JSON.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Config` when the document does not parse.
    pub fn from_json(json_str: &str) -> SimResult<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| SimError::config(format!("strategy parse error: {e}")))
    }
}

/// Per-tick inputs a strategy may consult.
#[derive(Debug, Clone, Copy)]
pub struct SpeedContext<'a> {
    pub leg_name: &'a str,
    pub leg_index: usize,
    /// Miles into the current leg.
    pub progress_miles: f64,
    /// The car's speed window, mph. Returned speeds are clamped into it.
    pub min_mph: f64,
    pub max_mph: f64,
}

#[derive(Debug, Clone)]
pub enum Strategy {
    Random(RandomStrategy),
    Lazy(LazyStrategy),
    Hardcoded(HardcodedStrategy),
}

impl Strategy {
    #[must_use]
    pub fn from_config(config: StrategyConfig) -> Self {
        match config {
            StrategyConfig::Random { min_mph, max_mph, seed } => Self::Random(RandomStrategy {
                min_mph,
                max_mph,
                rng: ChaCha8Rng::seed_from_u64(seed),
            }),
            StrategyConfig::Lazy { target_mph } => Self::Lazy(LazyStrategy { target_mph }),
            StrategyConfig::Hardcoded { default_mph, rows } => {
                Self::Hardcoded(HardcodedStrategy::new(default_mph, rows))
            }
        }
    }

    /// The target speed for this tick, clamped into the car's window.
    pub fn get_speed(&mut self, ctx: &SpeedContext<'_>) -> f64 {
        let speed = match self {
            Self::Random(s) => s.pick(),
            Self::Lazy(s) => s.target_mph,
            Self::Hardcoded(s) => s.pick(ctx),
        };
        speed.clamp(ctx.min_mph, ctx.max_mph)
    }
}

#[derive(Debug, Clone)]
pub struct RandomStrategy {
    min_mph: f64,
    max_mph: f64,
    rng: ChaCha8Rng,
}

impl RandomStrategy {
    fn pick(&mut self) -> f64 {
        if self.max_mph > self.min_mph {
            self.rng.gen_range(self.min_mph..self.max_mph)
        } else {
            self.min_mph
        }
    }
}

#[derive(Debug, Clone)]
pub struct LazyStrategy {
    target_mph: f64,
}

/// Replays a hand-written schedule. Rows are grouped by leg and sorted by
/// distance; each leg's cursor only moves forward, so re-driving a loop
/// continues from where the schedule left off.
#[derive(Debug, Clone)]
pub struct HardcodedStrategy {
    default_mph: f64,
    schedule: HashMap<String, Vec<(f64, f64)>>,
}

impl HardcodedStrategy {
    fn new(default_mph: f64, rows: Vec<ScheduleRow>) -> Self {
        let mut schedule: HashMap<String, Vec<(f64, f64)>> = HashMap::new();
        for row in rows {
            schedule
                .entry(row.leg)
                .or_default()
                .push((row.distance_miles, row.speed_mph));
        }
        for breakpoints in schedule.values_mut() {
            breakpoints.sort_by(|a, b| a.0.total_cmp(&b.0));
            // A schedule that starts mid-leg still needs a speed at zero.
            if breakpoints[0].0 > 0.0 {
                breakpoints.insert(0, (0.0, default_mph));
            }
        }
        Self {
            default_mph,
            schedule,
        }
    }

    fn pick(&mut self, ctx: &SpeedContext<'_>) -> f64 {
        let Some(breakpoints) = self.schedule.get_mut(ctx.leg_name) else {
            return self.default_mph;
        };
        // Consume a breakpoint once progress passes the next one's marker.
        while breakpoints.len() > 1 && ctx.progress_miles >= breakpoints[1].0 {
            breakpoints.remove(0);
        }
        breakpoints[0].1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(leg: &str, progress_miles: f64) -> SpeedContext<'_> {
        SpeedContext {
            leg_name: leg,
            leg_index: 0,
            progress_miles,
            min_mph: 5.0,
            max_mph: 70.0,
        }
    }

    #[test]
    fn lazy_holds_its_target() {
        let mut s = Strategy::from_config(StrategyConfig::Lazy { target_mph: 42.0 });
        assert_eq!(s.get_speed(&ctx("a", 0.0)), 42.0);
        assert_eq!(s.get_speed(&ctx("a", 100.0)), 42.0);
    }

    #[test]
    fn random_is_reproducible_and_bounded() {
        let config = StrategyConfig::Random {
            min_mph: 20.0,
            max_mph: 50.0,
            seed: 7,
        };
        let mut a = Strategy::from_config(config.clone());
        let mut b = Strategy::from_config(config);
        for _ in 0..100 {
            let speed = a.get_speed(&ctx("a", 0.0));
            assert_eq!(speed, b.get_speed(&ctx("a", 0.0)));
            assert!((20.0..50.0).contains(&speed));
        }
    }

    #[test]
    fn speeds_are_clamped_into_the_car_window() {
        let mut s = Strategy::from_config(StrategyConfig::Lazy { target_mph: 120.0 });
        assert_eq!(s.get_speed(&ctx("a", 0.0)), 70.0);
        let mut s = Strategy::from_config(StrategyConfig::Lazy { target_mph: 1.0 });
        assert_eq!(s.get_speed(&ctx("a", 0.0)), 5.0);
    }

    #[test]
    fn hardcoded_walks_its_breakpoints() {
        let rows = vec![
            ScheduleRow {
                leg: "stage 1".into(),
                distance_miles: 0.0,
                speed_mph: 25.0,
            },
            ScheduleRow {
                leg: "stage 1".into(),
                distance_miles: 10.0,
                speed_mph: 45.0,
            },
        ];
        let mut s = Strategy::from_config(StrategyConfig::Hardcoded {
            default_mph: 30.0,
            rows,
        });
        assert_eq!(s.get_speed(&ctx("stage 1", 0.0)), 25.0);
        assert_eq!(s.get_speed(&ctx("stage 1", 9.9)), 25.0);
        assert_eq!(s.get_speed(&ctx("stage 1", 10.0)), 45.0);
        assert_eq!(s.get_speed(&ctx("stage 1", 50.0)), 45.0);
        // A leg with no rows falls back to the default.
        assert_eq!(s.get_speed(&ctx("stage 2", 0.0)), 30.0);
    }

    #[test]
    fn hardcoded_schedule_is_shared_across_repeat_attempts() {
        let rows = vec![
            ScheduleRow {
                leg: "big loop".into(),
                distance_miles: 0.0,
                speed_mph: 25.0,
            },
            ScheduleRow {
                leg: "big loop".into(),
                distance_miles: 1.0,
                speed_mph: 45.0,
            },
        ];
        let mut s = Strategy::from_config(StrategyConfig::Hardcoded {
            default_mph: 30.0,
            rows,
        });
        // First attempt walks past the breakpoint.
        assert_eq!(s.get_speed(&ctx("big loop", 1.5)), 45.0);
        // A redone loop starts back at zero miles but the consumed
        // schedule does not rewind.
        assert_eq!(s.get_speed(&ctx("big loop", 0.0)), 45.0);
    }

    #[test]
    fn hardcoded_synthesizes_a_leading_row() {
        let rows = vec![ScheduleRow {
            leg: "stage 1".into(),
            distance_miles: 5.0,
            speed_mph: 55.0,
        }];
        let mut s = Strategy::from_config(StrategyConfig::Hardcoded {
            default_mph: 30.0,
            rows,
        });
        assert_eq!(s.get_speed(&ctx("stage 1", 0.0)), 30.0);
        assert_eq!(s.get_speed(&ctx("stage 1", 5.0)), 55.0);
    }

    #[test]
    fn config_parses_from_json() {
        let json = r#"{"name":"random","min_mph":20.0,"max_mph":50.0,"seed":3}"#;
        let config = StrategyConfig::from_json(json).unwrap();
        assert!(matches!(config, StrategyConfig::Random { seed: 3, .. }));

        let json = r#"{"name":"hardcoded","rows":[{"leg":"a","distance_miles":0.0,"speed_mph":40.0}]}"#;
        let config = StrategyConfig::from_json(json).unwrap();
        assert!(matches!(config, StrategyConfig::Hardcoded { .. }));
    }
}
