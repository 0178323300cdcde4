//! Race environment: the per-tick simulation engine.
//!
//! `RaceEnv` owns the mutable race state and advances it one fixed-length
//! tick at a time. Each tick applies the driving command (or reuses the
//! last accepted one), integrates speed, distance, and battery energy,
//! enforces posted limits and mandatory stops, and hands leg completions to
//! the transition logic in [`crate::scheduler`]. Race termination is always
//! reported through the returned flag and `RaceState::done`, never as an
//! error.

use chrono::{Days, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::car::CarConfig;
use crate::constants::{
    CHARGE_START_HOUR, DEFAULT_TICK_SECONDS, DRIVE_STOP_HOUR, EVENING_CHARGE_HOURS,
    MORNING_CHARGE_HOURS, STOP_LOOKAHEAD_METERS,
};
use crate::error::{SimError, SimResult};
use crate::physics;
use crate::route::{Leg, Route};
use crate::scheduler;
use crate::strategy::SpeedContext;
use crate::telemetry::{TelemetryLog, TickRecord};
use crate::units::{meters_to_miles, mph_to_mps};

/// Driving intent for one tick, produced by a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Desired cruise speed, mph.
    pub target_mph: f64,
    /// Acceleration used when below target, m/s^2 (positive).
    pub accel: f64,
    /// Deceleration used when above target, m/s^2 (negative).
    pub decel: f64,
    /// Whether to attempt the current or upcoming loop on leg finish.
    pub try_loop: bool,
}

impl Command {
    /// The car's profile defaults: full speed, nominal accel/decel, no
    /// loop attempts.
    #[must_use]
    pub fn full_speed(car: &CarConfig) -> Self {
        Self {
            target_mph: car.max_mph,
            accel: car.max_accel,
            decel: car.max_decel,
            try_loop: false,
        }
    }

    /// Check the command contract against a car profile.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Contract` for an out-of-window target speed, a
    /// non-positive acceleration, or a non-negative deceleration.
    pub fn validate(&self, car: &CarConfig) -> SimResult<()> {
        if !(self.accel > 0.0) {
            return Err(SimError::contract("acceleration must be positive"));
        }
        if !(self.decel < 0.0) {
            return Err(SimError::contract("deceleration must be negative"));
        }
        if !(self.target_mph >= car.min_mph && self.target_mph <= car.max_mph) {
            return Err(SimError::contract(format!(
                "target speed must be between {} and {} mph",
                car.min_mph, car.max_mph
            )));
        }
        Ok(())
    }
}

/// Mutable race state, owned exclusively by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceState {
    pub time: NaiveDateTime,
    pub leg_index: usize,
    /// Meters into the current leg; resets to zero when the leg changes.
    pub leg_progress: f64,
    /// Current speed, m/s.
    pub speed: f64,
    /// Battery energy in joules, clamped to `[0, capacity]`.
    pub energy: f64,
    /// Energy dissipated in the mechanical brakes, joules. Bookkeeping
    /// only; it never feeds back into `energy`.
    pub brake_energy: f64,
    /// Miles banked from legs completed on time. Reset to zero when a base
    /// leg misses its stage close.
    pub miles_earned: f64,
    /// Names of legs completed on time, in completion order.
    pub legs_completed: Vec<String>,
    /// Terminal flag; once set, further ticks are no-ops.
    pub done: bool,
    pub(crate) try_loop: bool,
    pub(crate) next_stop_index: usize,
    pub(crate) next_stop_dist: f64,
    pub(crate) limit: f64,
    pub(crate) next_limit_index: usize,
    pub(crate) next_limit_dist: f64,
}

#[derive(Debug)]
pub struct RaceEnv {
    pub(crate) car: CarConfig,
    pub(crate) route: Route,
    pub(crate) state: RaceState,
    tick: f64,
    command: Command,
    log: TelemetryLog,
    motor_power: f64,
    array_power: f64,
}

impl RaceEnv {
    /// Build an environment from a validated car profile and a fully built
    /// route (weather attached to every leg).
    ///
    /// # Errors
    ///
    /// Returns `SimError::Config` when the profile or route fails
    /// validation, or any leg is missing its weather.
    pub fn new(car: CarConfig, route: Route) -> SimResult<Self> {
        car.validate()?;
        route.validate()?;
        for leg in route.legs() {
            if !leg.has_weather() {
                return Err(SimError::config(format!(
                    "leg {:?} has no weather attached",
                    leg.name
                )));
            }
        }

        let first = &route.legs()[0];
        let state = RaceState {
            time: first.start,
            leg_index: 0,
            leg_progress: 0.0,
            speed: 0.0,
            energy: car.capacity_joules(),
            brake_energy: 0.0,
            miles_earned: 0.0,
            legs_completed: Vec::new(),
            done: false,
            try_loop: false,
            next_stop_index: 0,
            next_stop_dist: f64::INFINITY,
            limit: f64::INFINITY,
            next_limit_index: 0,
            next_limit_dist: 0.0,
        };
        let command = Command::full_speed(&car);
        let mut env = Self {
            car,
            route,
            state,
            tick: DEFAULT_TICK_SECONDS,
            command,
            log: TelemetryLog::new(),
            motor_power: 0.0,
            array_power: 0.0,
        };
        env.reset_leg();
        info!("race starts at {}", env.state.time);
        Ok(env)
    }

    /// Override the tick length.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Config` for a non-positive tick.
    pub fn with_tick(mut self, seconds: f64) -> SimResult<Self> {
        if !(seconds > 0.0) {
            return Err(SimError::config("tick length must be positive"));
        }
        self.tick = seconds;
        Ok(self)
    }

    /// Advance the simulation by one tick. Passing `None` reuses the last
    /// accepted command. Returns whether the race has finished; poll it
    /// after every call.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Contract` when the command violates its bounds;
    /// the tick is rejected before any state changes.
    pub fn step(&mut self, command: Option<Command>) -> SimResult<bool> {
        if self.state.done {
            return Ok(true);
        }

        if let Some(cmd) = command {
            cmd.validate(&self.car)?;
            self.command = cmd;
        }
        let cmd = self.command;
        self.state.try_loop = cmd.try_loop;

        let v0 = self.state.speed;
        let d0 = self.state.leg_progress;
        let mut dt = self.tick;

        let leg = &self.route.legs()[self.state.leg_index];
        let headwind = leg.headwind(d0, self.state.time).unwrap_or(0.0);

        self.log.record(TickRecord {
            time: self.state.time,
            dist: d0,
            speed: v0,
            target_mph: cmd.target_mph,
            accel: cmd.accel,
            decel: cmd.decel,
            try_loop: cmd.try_loop,
            energy: self.state.energy,
            motor_power: self.motor_power,
            array_power: self.array_power,
        });

        // Adopt the next posted speed limit once its marker is passed.
        if d0 >= self.state.next_limit_dist {
            let limits = leg.speed_limits();
            self.state.limit = limits.value(self.state.next_limit_index);
            if self.state.next_limit_index + 1 < limits.len() {
                self.state.next_limit_index += 1;
                self.state.next_limit_dist = limits.marker(self.state.next_limit_index);
            } else {
                self.state.next_limit_dist = f64::INFINITY;
            }
        }

        // Mandatory stop: once inside the lookahead window, come to rest
        // exactly at the marker as soon as the braking distance closes on
        // it, consuming the analytic stopping time instead of a full tick.
        if d0 > self.state.next_stop_dist - STOP_LOOKAHEAD_METERS {
            let braking = physics::braking_distance(v0, cmd.decel);
            if d0 > self.state.next_stop_dist - braking {
                let stop_dist = self.state.next_stop_dist;
                let stop_time = physics::stopping_time(v0, cmd.decel);
                let alt_delta = leg.altitude(stop_dist) - leg.altitude(d0);
                self.motor_power =
                    physics::motor_power(&self.car, cmd.decel, v0 / 2.0, headwind, braking, alt_delta);
                self.array_power =
                    leg.sun_flat(d0, self.state.time).unwrap_or(0.0) * self.car.array_multiplier;
                self.state.energy -= self.motor_power * stop_time;
                self.state.energy += self.array_power * stop_time;
                let depleted = clamp_energy(&mut self.state, self.car.capacity_joules());
                self.state.time += seconds(stop_time);
                self.state.leg_progress = stop_dist;
                self.state.speed = 0.0;

                let stops = leg.stop_distances();
                if self.state.next_stop_index + 1 < stops.len() {
                    self.state.next_stop_index += 1;
                    self.state.next_stop_dist = stops[self.state.next_stop_index];
                } else {
                    self.state.next_stop_dist = f64::INFINITY;
                }

                if depleted {
                    info!("battery depleted while stopping, race over");
                    self.state.done = true;
                    return Ok(true);
                }
                return Ok(false);
            }
        }

        // Normal motion. Cap the target by the active limit and bound the
        // acceleration by what the motor can actually deliver at speed.
        let target = mph_to_mps(cmd.target_mph).min(self.state.limit);
        let d_est = d0 + target * dt;
        let sin_slope = if d_est - d0 > f64::EPSILON {
            (leg.altitude(d_est) - leg.altitude(d0)) / (d_est - d0)
        } else {
            0.0
        };

        let v_error = target - v0;
        let accel = if v_error > 0.0 {
            if v0.abs() > 1.0 {
                cmd.accel
                    .min(physics::motor_accel_limit(&self.car, v0, headwind, sin_slope))
            } else {
                // Near rest the power-to-accel conversion blows up; let the
                // commanded acceleration through.
                cmd.accel
            }
        } else if v_error < 0.0 {
            if v0.abs() > 0.1 {
                // Regen absorbs what it can; the deficit is dissipated in
                // the mechanical brakes.
                let regen_limit = physics::motor_decel_limit(&self.car, v0, headwind, sin_slope);
                let brake_power = (regen_limit - cmd.decel).max(0.0);
                self.state.brake_energy += brake_power * dt;
            }
            cmd.decel
        } else {
            0.0
        };

        // Shrink the tick so a full interval of acceleration cannot
        // overshoot the target speed.
        if accel != 0.0 && v_error.abs() < (accel * dt).abs() {
            dt = (v_error / accel).abs();
        }

        // Speed rises linearly under constant acceleration, so the average
        // integrates distance exactly.
        let v_f = v0 + accel * dt;
        let v_avg = 0.5 * (v0 + v_f);
        let d_f = d0 + v_avg * dt;
        self.state.leg_progress = d_f;
        self.state.speed = v_f;

        let alt_delta = leg.altitude(d_f) - leg.altitude(d0);
        self.motor_power = physics::motor_power(&self.car, accel, v_avg, headwind, d_f - d0, alt_delta);
        self.array_power =
            leg.sun_flat(d0, self.state.time).unwrap_or(0.0) * self.car.array_multiplier;
        self.state.energy -= self.motor_power * dt;
        self.state.energy += self.array_power * dt;

        let leg_length = leg.length;
        let depleted = clamp_energy(&mut self.state, self.car.capacity_joules());
        self.state.time += seconds(dt);

        if depleted {
            info!("battery depleted, race over");
            self.state.done = true;
            return Ok(true);
        }

        // Leg finished: the transition logic may charge (advancing time),
        // change the active leg, or end the race.
        if self.state.leg_progress >= leg_length {
            info!(
                "completed leg {:?} at {}",
                self.current_leg().name,
                self.state.time
            );
            scheduler::on_leg_finish(self);
            if self.state.done {
                info!(
                    "race over: {:.0} miles earned, {:.0} Wh left",
                    self.state.miles_earned,
                    self.state.energy / 3_600.0
                );
                return Ok(true);
            }
            self.reset_leg();
        }

        // End of day: pull over, charge out the evening, jump to the next
        // morning's charge window.
        let drive_stop = at_hour(self.state.time.date(), DRIVE_STOP_HOUR);
        if self.state.time > drive_stop {
            if self.state.time.date() >= self.route.last_close().date() {
                info!("past the close date of the final leg, race over");
                self.state.done = true;
                return Ok(true);
            }
            self.charge(Duration::hours(EVENING_CHARGE_HOURS));
            self.state.time = next_morning(self.state.time);
            self.charge(Duration::hours(MORNING_CHARGE_HOURS));
            info!("end of day, resuming at {}", self.state.time);
        }

        Ok(false)
    }

    /// Stationary charging: integrate tilted-array irradiance at the
    /// current position over the duration, in tick-length sub-intervals.
    /// Missing samples contribute nothing.
    pub(crate) fn charge(&mut self, duration: Duration) {
        if duration <= Duration::zero() {
            return;
        }
        let total_secs = duration.num_milliseconds() as f64 / 1_000.0;
        let mut gained = 0.0;
        {
            let leg = &self.route.legs()[self.state.leg_index];
            // The finishing tick can leave progress slightly past the leg
            // length, where the forecast grid has no samples.
            let pos = self.state.leg_progress.min(leg.length);
            let mut elapsed = 0.0;
            while elapsed <= total_secs {
                let at = self.state.time + seconds(elapsed);
                let irradiance = leg.sun_tilt(pos, at).unwrap_or(0.0);
                gained += irradiance * self.car.array_multiplier * self.tick;
                elapsed += self.tick;
            }
        }
        let before = self.state.energy;
        self.state.energy = (self.state.energy + gained).min(self.car.capacity_joules());
        self.state.time += duration;
        debug!(
            "charged {:.0} Wh, now {}",
            (self.state.energy - before) / 3_600.0,
            self.state.time
        );
    }

    /// Reset per-leg state after the active leg changes (or a loop
    /// restarts) and open a fresh telemetry attempt.
    pub(crate) fn reset_leg(&mut self) {
        self.state.leg_progress = 0.0;
        self.state.speed = 0.0;
        let leg = &self.route.legs()[self.state.leg_index];
        self.state.next_stop_index = 0;
        self.state.next_stop_dist = leg
            .stop_distances()
            .first()
            .copied()
            .unwrap_or(f64::INFINITY);
        self.state.limit = f64::INFINITY;
        self.state.next_limit_index = 0;
        self.state.next_limit_dist = leg.speed_limits().marker(0);
        self.log.begin_attempt(&leg.name);
    }

    #[must_use]
    pub fn state(&self) -> &RaceState {
        &self.state
    }

    #[must_use]
    pub fn car(&self) -> &CarConfig {
        &self.car
    }

    #[must_use]
    pub fn route(&self) -> &Route {
        &self.route
    }

    /// The leg being driven (or the leg the race ended on).
    #[must_use]
    pub fn current_leg(&self) -> &Leg {
        let idx = self.state.leg_index.min(self.route.len() - 1);
        &self.route.legs()[idx]
    }

    #[must_use]
    pub fn done(&self) -> bool {
        self.state.done
    }

    /// Miles banked from legs completed on time.
    #[must_use]
    pub fn miles_earned(&self) -> f64 {
        self.state.miles_earned
    }

    /// Battery energy remaining, watt-hours.
    #[must_use]
    pub fn watthours_left(&self) -> f64 {
        self.state.energy / 3_600.0
    }

    #[must_use]
    pub fn time(&self) -> NaiveDateTime {
        self.state.time
    }

    #[must_use]
    pub fn tick_seconds(&self) -> f64 {
        self.tick
    }

    /// Snapshot handed to strategies each tick.
    #[must_use]
    pub fn speed_context(&self) -> SpeedContext<'_> {
        SpeedContext {
            leg_name: self.current_leg().name.as_str(),
            leg_index: self.state.leg_index,
            progress_miles: meters_to_miles(self.state.leg_progress),
            min_mph: self.car.min_mph,
            max_mph: self.car.max_mph,
        }
    }

    /// Percent grade at a distance along the current leg (current position
    /// when `None`).
    #[must_use]
    pub fn slope_at(&self, dist: Option<f64>) -> f64 {
        self.current_leg()
            .slope(dist.unwrap_or(self.state.leg_progress))
    }

    /// Altitude in meters along the current leg.
    #[must_use]
    pub fn elevation_at(&self, dist: Option<f64>) -> f64 {
        self.current_leg()
            .altitude(dist.unwrap_or(self.state.leg_progress))
    }

    /// Headwind in m/s at a point and time on the current leg; zero where
    /// the forecast has no data.
    #[must_use]
    pub fn headwind_at(&self, dist: Option<f64>, at: Option<NaiveDateTime>) -> f64 {
        self.current_leg()
            .headwind(
                dist.unwrap_or(self.state.leg_progress),
                at.unwrap_or(self.state.time),
            )
            .unwrap_or(0.0)
    }

    /// Flat-array irradiance in W/m^2 on the current leg; zero where the
    /// forecast has no data.
    #[must_use]
    pub fn solar_flat_at(&self, dist: Option<f64>, at: Option<NaiveDateTime>) -> f64 {
        self.current_leg()
            .sun_flat(
                dist.unwrap_or(self.state.leg_progress),
                at.unwrap_or(self.state.time),
            )
            .unwrap_or(0.0)
    }

    /// Tilted-array irradiance in W/m^2 on the current leg; zero where the
    /// forecast has no data.
    #[must_use]
    pub fn solar_tilt_at(&self, dist: Option<f64>, at: Option<NaiveDateTime>) -> f64 {
        self.current_leg()
            .sun_tilt(
                dist.unwrap_or(self.state.leg_progress),
                at.unwrap_or(self.state.time),
            )
            .unwrap_or(0.0)
    }

    #[must_use]
    pub fn telemetry(&self) -> &TelemetryLog {
        &self.log
    }

    /// Consume the environment, returning the telemetry log.
    #[must_use]
    pub fn into_telemetry(self) -> TelemetryLog {
        self.log
    }
}

fn seconds(secs: f64) -> Duration {
    Duration::microseconds((secs * 1e6).round() as i64)
}

/// Clamp energy into `[0, capacity]`; returns whether the floor was hit.
fn clamp_energy(state: &mut RaceState, capacity: f64) -> bool {
    state.energy = state.energy.min(capacity);
    if state.energy <= 0.0 {
        state.energy = 0.0;
        true
    } else {
        false
    }
}

pub(crate) fn at_hour(date: NaiveDate, hour: u32) -> NaiveDateTime {
    date.and_hms_opt(hour, 0, 0)
        .unwrap_or_else(|| date.and_time(NaiveTime::default()))
}

pub(crate) fn next_morning(now: NaiveDateTime) -> NaiveDateTime {
    let tomorrow = now
        .date()
        .checked_add_days(Days::new(1))
        .unwrap_or_else(|| now.date());
    at_hour(tomorrow, CHARGE_START_HOUR)
}
