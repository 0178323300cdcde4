//! Unit conversions shared across the simulator.
//!
//! Race regulations quote speeds in mph and distances in miles, while the
//! physics integration runs in SI units. Conversions live here so the two
//! never mix silently.

#[must_use]
pub fn miles_to_meters(miles: f64) -> f64 {
    miles * 1_609.34
}

#[must_use]
pub fn meters_to_miles(meters: f64) -> f64 {
    meters * 0.000_621_4
}

#[must_use]
pub fn feet_to_meters(feet: f64) -> f64 {
    feet * 0.3048
}

#[must_use]
pub fn mph_to_mps(mph: f64) -> f64 {
    mph * 0.447_04
}

#[must_use]
pub fn mps_to_mph(mps: f64) -> f64 {
    mps * 2.236_94
}
