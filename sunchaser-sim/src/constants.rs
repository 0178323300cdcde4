//! Race calendar and tuning constants for the Sunchaser simulation.
//!
//! These values encode the regulation day structure: when the battery comes
//! out of impound, when the car may drive, and how long the mandatory holds
//! at control points last. Keeping them together means the schedule can only
//! change through reviewed code, not stray literals.

/// Hour the battery comes out of impound and morning charging begins.
pub const CHARGE_START_HOUR: u32 = 7;
/// Hour the car is allowed to start driving.
pub const DRIVE_START_HOUR: u32 = 9;
/// Hour the car must stop driving for the day.
pub const DRIVE_STOP_HOUR: u32 = 18;
/// Hour the battery goes back into impound and evening charging ends.
pub const CHARGE_STOP_HOUR: u32 = 20;

/// Morning charge window, impound release to drive start.
pub const MORNING_CHARGE_HOURS: i64 = (DRIVE_START_HOUR - CHARGE_START_HOUR) as i64;
/// Evening charge window, drive stop to impound.
pub const EVENING_CHARGE_HOURS: i64 = (CHARGE_STOP_HOUR - DRIVE_STOP_HOUR) as i64;

/// Mandatory hold at the end of a loop.
pub const LOOP_HOLD_MINUTES: i64 = 15;
/// Mandatory hold at a checkpoint or stage stop after a base leg.
pub const CHECKPOINT_HOLD_MINUTES: i64 = 45;
/// Stationary charge granted between consecutive loop attempts.
pub const LOOP_RETRY_CHARGE_MINUTES: i64 = 15;

/// Simulated seconds advanced per tick unless a stop or target-speed
/// overshoot shrinks the interval.
pub const DEFAULT_TICK_SECONDS: f64 = 5.0;

/// How far ahead of a mandatory stop the braking check engages, in meters.
pub const STOP_LOOKAHEAD_METERS: f64 = 1_000.0;

/// Standard gravity, m/s^2.
pub const GRAVITY: f64 = 9.81;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charge_windows_are_positive() {
        assert!(MORNING_CHARGE_HOURS > 0);
        assert!(EVENING_CHARGE_HOURS > 0);
    }
}
