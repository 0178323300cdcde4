//! Vehicle power model.
//!
//! A deliberately small, stateless model: instantaneous motor power as a
//! function of speed, acceleration, headwind, and grade, plus the inverse
//! forms that turn motor power limits into acceleration limits. Positive
//! power is drawn from the battery; negative power is regenerative charge.

use crate::car::CarConfig;
use crate::constants::GRAVITY;

/// Instantaneous motor power in watts.
///
/// `dist_delta`/`alt_delta` describe the segment being driven; the grade
/// term is suppressed for segments of a meter or less to avoid dividing by a
/// near-zero distance.
#[must_use]
pub fn motor_power(
    car: &CarConfig,
    accel: f64,
    speed: f64,
    headwind: f64,
    dist_delta: f64,
    alt_delta: f64,
) -> f64 {
    let sin_slope = if dist_delta > 1.0 {
        alt_delta / dist_delta
    } else {
        0.0
    };

    let air_speed = speed + headwind;
    let steady = speed
        * (car.drag_coeff * air_speed * air_speed
            + car.friction_coeff
            + car.mass * GRAVITY * sin_slope);
    let accelerating = car.accel_coeff * accel * speed;
    steady + accelerating
}

/// Greatest acceleration the motor can sustain at `speed` without exceeding
/// its maximum output power. Callers must guard against near-zero speeds.
#[must_use]
pub fn motor_accel_limit(car: &CarConfig, speed: f64, headwind: f64, sin_slope: f64) -> f64 {
    let air_speed = speed - headwind;
    (car.max_motor_output_power / speed
        - car.drag_coeff * air_speed * air_speed
        - car.friction_coeff
        - car.mass * GRAVITY * sin_slope)
        / car.accel_coeff
}

/// Strongest deceleration the motor can absorb regeneratively at `speed`
/// (negative). Any demand beyond it falls to the mechanical brakes.
#[must_use]
pub fn motor_decel_limit(car: &CarConfig, speed: f64, headwind: f64, sin_slope: f64) -> f64 {
    let air_speed = speed - headwind;
    (car.max_motor_input_power / speed
        - car.drag_coeff * air_speed * air_speed
        - car.friction_coeff
        - car.mass * GRAVITY * sin_slope)
        / car.accel_coeff
}

/// Distance needed to brake from `speed` to rest at constant `decel`
/// (negative), meters.
#[must_use]
pub fn braking_distance(speed: f64, decel: f64) -> f64 {
    -(speed * speed) / (2.0 * decel)
}

/// Time needed to brake from `speed` to rest at constant `decel`
/// (negative), seconds.
#[must_use]
pub fn stopping_time(speed: f64, decel: f64) -> f64 {
    -speed / decel
}
