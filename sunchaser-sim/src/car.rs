//! Car profile configuration.
//!
//! A profile captures everything the physics model and the engine need to
//! know about one vehicle: battery capacity, the three lumped power
//! coefficients, motor limits, array size, and the regulation speed window.
//! Profiles are plain JSON documents validated at load time.

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::units::mph_to_mps;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarConfig {
    pub name: String,
    /// Battery capacity in watt-hours.
    pub max_watthours: f64,
    /// Gross vehicle mass in kilograms.
    pub mass: f64,
    /// Aerodynamic drag coefficient lumped with frontal area and air
    /// density; multiplies (speed + headwind)^2.
    pub drag_coeff: f64,
    /// Rolling resistance force, newtons.
    pub friction_coeff: f64,
    /// Effective inertia coefficient for the acceleration power term.
    pub accel_coeff: f64,
    /// Maximum motor drive power, watts (positive).
    pub max_motor_output_power: f64,
    /// Maximum regenerative power, watts (negative).
    pub max_motor_input_power: f64,
    /// Array area times cell efficiency: irradiance (W/m^2) to watts.
    pub array_multiplier: f64,
    /// Slowest allowed target speed, mph.
    pub min_mph: f64,
    /// Fastest allowed target speed, mph.
    pub max_mph: f64,
    /// Default command acceleration, m/s^2 (positive).
    pub max_accel: f64,
    /// Default command deceleration, m/s^2 (negative).
    pub max_decel: f64,
}

impl CarConfig {
    /// Parse and validate a profile from JSON.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Config` when the document does not parse or a
    /// field is out of range.
    pub fn from_json(json_str: &str) -> SimResult<Self> {
        let config: Self = serde_json::from_str(json_str)
            .map_err(|e| SimError::config(format!("car profile parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check field ranges.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Config` naming the first offending field.
    pub fn validate(&self) -> SimResult<()> {
        if !(self.max_watthours > 0.0) {
            return Err(SimError::config("max_watthours must be positive"));
        }
        if !(self.mass > 0.0) {
            return Err(SimError::config("mass must be positive"));
        }
        if self.drag_coeff < 0.0 || self.friction_coeff < 0.0 || self.accel_coeff < 0.0 {
            return Err(SimError::config("power coefficients must be non-negative"));
        }
        if !(self.max_motor_output_power > 0.0) {
            return Err(SimError::config("max_motor_output_power must be positive"));
        }
        if !(self.max_motor_input_power < 0.0) {
            return Err(SimError::config("max_motor_input_power must be negative"));
        }
        if self.array_multiplier < 0.0 {
            return Err(SimError::config("array_multiplier must be non-negative"));
        }
        if !(self.min_mph > 0.0) || self.max_mph <= self.min_mph {
            return Err(SimError::config(
                "speed window requires 0 < min_mph < max_mph",
            ));
        }
        if !(self.max_accel > 0.0) {
            return Err(SimError::config("max_accel must be positive"));
        }
        if !(self.max_decel < 0.0) {
            return Err(SimError::config("max_decel must be negative"));
        }
        Ok(())
    }

    /// Battery capacity in joules.
    #[must_use]
    pub fn capacity_joules(&self) -> f64 {
        self.max_watthours * 3_600.0
    }

    /// Slowest allowed target speed, m/s.
    #[must_use]
    pub fn min_speed(&self) -> f64 {
        mph_to_mps(self.min_mph)
    }

    /// Fastest allowed target speed, m/s.
    #[must_use]
    pub fn max_speed(&self) -> f64 {
        mph_to_mps(self.max_mph)
    }
}

#[cfg(test)]
pub(crate) fn test_car() -> CarConfig {
    CarConfig {
        name: "test car".to_string(),
        max_watthours: 5_000.0,
        mass: 300.0,
        drag_coeff: 0.15,
        friction_coeff: 20.0,
        accel_coeff: 350.0,
        max_motor_output_power: 10_000.0,
        max_motor_input_power: -10_000.0,
        array_multiplier: 4.0,
        min_mph: 5.0,
        max_mph: 70.0,
        max_accel: 0.5,
        max_decel: -0.5,
    }
}
