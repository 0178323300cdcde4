//! Route data model: an ordered sequence of legs with persistence.
//!
//! Leg order is race order and the index is the only identity the
//! leg-transition logic uses. A fully built route, weather included,
//! snapshots to JSON so an expensive forecast run can be reused across
//! many simulations.

pub mod ingest;
pub mod leg;
pub mod weather;

use chrono::NaiveDateTime;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
pub use ingest::{GeoTable, StepTable};
pub use leg::{EndKind, Geometry, Leg, LegKind};
pub use weather::LegWeather;

/// Everything needed to add one leg to a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegSpec {
    pub kind: LegKind,
    pub end: EndKind,
    pub geometry: GeoTable,
    pub steps: StepTable,
    pub start: NaiveDateTime,
    pub open: NaiveDateTime,
    pub close: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Route {
    legs: Vec<Leg>,
    total_length: f64,
}

impl Route {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a leg from its spec tables and append it in race order.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Config` when either table fails to build or the
    /// leg's timing window is malformed.
    pub fn add_leg(&mut self, spec: &LegSpec) -> SimResult<()> {
        let built_geo = spec.geometry.build()?;
        let built_steps = spec.steps.build()?;
        let leg = Leg::new(
            built_geo.name,
            spec.kind,
            spec.end,
            built_geo.length,
            built_geo.geometry,
            built_steps.stop_distances,
            built_steps.speed_limits,
            spec.start,
            spec.open,
            spec.close,
        )?;
        self.push_leg(leg);
        Ok(())
    }

    /// Append an already built leg.
    pub fn push_leg(&mut self, leg: Leg) {
        self.total_length += leg.length;
        self.legs.push(leg);
    }

    #[must_use]
    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    #[must_use]
    pub fn leg(&self, index: usize) -> Option<&Leg> {
        self.legs.get(index)
    }

    /// Mutable leg access, used to attach weather after construction.
    pub fn leg_mut(&mut self, index: usize) -> Option<&mut Leg> {
        self.legs.get_mut(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.legs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }

    /// Sum of leg lengths in meters.
    #[must_use]
    pub fn total_length(&self) -> f64 {
        self.total_length
    }

    #[must_use]
    pub fn leg_names(&self) -> Vec<&str> {
        self.legs.iter().map(|l| l.name.as_str()).collect()
    }

    /// Close time of the final leg. Zero-time when the route is empty;
    /// `validate` rejects that case before simulation.
    #[must_use]
    pub fn last_close(&self) -> NaiveDateTime {
        self.legs.last().map(|l| l.close).unwrap_or_default()
    }

    /// Check the structural invariants the leg-transition logic relies on.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Config` when the route is empty, two loops appear
    /// back-to-back, or the final leg ends at a checkpoint. A final leg
    /// that is a loop at a stage stop is allowed but logged, since the
    /// race-completion shortcut expects routes to end on a base leg.
    pub fn validate(&self) -> SimResult<()> {
        let Some(last) = self.legs.last() else {
            return Err(SimError::config("route has no legs"));
        };
        if self
            .legs
            .windows(2)
            .any(|pair| pair[0].kind == LegKind::Loop && pair[1].kind == LegKind::Loop)
        {
            return Err(SimError::config(
                "route must not contain two loops back-to-back",
            ));
        }
        if last.end != EndKind::StageStop {
            return Err(SimError::config("route must end at a stage stop"));
        }
        if last.kind == LegKind::Loop {
            warn!(
                "route ends on loop {:?}; races are expected to end on a base leg",
                last.name
            );
        }
        Ok(())
    }

    /// Serialize the route, weather included, to a JSON snapshot.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Config` when serialization fails.
    pub fn to_json(&self) -> SimResult<String> {
        serde_json::to_string(self)
            .map_err(|e| SimError::config(format!("route serialize error: {e}")))
    }

    /// Load a route snapshot and re-check its invariants.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Config` when the document does not parse or the
    /// route fails validation.
    pub fn from_json(json_str: &str) -> SimResult<Self> {
        let route: Self = serde_json::from_str(json_str)
            .map_err(|e| SimError::config(format!("route parse error: {e}")))?;
        route.validate()?;
        Ok(route)
    }
}

#[cfg(test)]
pub(crate) mod test_fixtures {
    //! Builders for small in-code routes used across the test suite.

    use super::*;
    use crate::interp::{Series1, StepSeries};
    use crate::units::mph_to_mps;
    use chrono::{NaiveDate, NaiveDateTime};

    /// A timestamp on race day `day` (July 2024) at `hour:minute`.
    pub(crate) fn race_time(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, day)
            .expect("fixture date")
            .and_hms_opt(hour, minute, 0)
            .expect("fixture time")
    }

    /// A flat, straight leg with a single 60 mph limit and no stops,
    /// driveable from 09:00 to close at 18:00 on day one.
    pub(crate) fn flat_leg(name: &str, kind: LegKind, end: EndKind, length: f64) -> Leg {
        flat_leg_with_times(
            name,
            kind,
            end,
            length,
            race_time(1, 9, 0),
            race_time(1, 9, 0),
            race_time(1, 18, 0),
        )
    }

    pub(crate) fn flat_leg_with_times(
        name: &str,
        kind: LegKind,
        end: EndKind,
        length: f64,
        start: NaiveDateTime,
        open: NaiveDateTime,
        close: NaiveDateTime,
    ) -> Leg {
        let dists = vec![0.0, length];
        let geometry = Geometry {
            longitude: Series1::linear(dists.clone(), vec![-86.0, -86.1]).expect("fixture"),
            latitude: Series1::linear(dists.clone(), vec![39.8, 39.9]).expect("fixture"),
            slope: Series1::linear(dists.clone(), vec![0.0, 0.0]).expect("fixture"),
            altitude: Series1::linear(dists.clone(), vec![200.0, 200.0]).expect("fixture"),
            heading: Series1::nearest(dists, vec![90.0, 90.0]).expect("fixture"),
        };
        let limits = StepSeries::new(vec![0.0], vec![mph_to_mps(60.0)]).expect("fixture");
        Leg::new(
            name.to_string(),
            kind,
            end,
            length,
            geometry,
            vec![],
            limits,
            start,
            open,
            close,
        )
        .expect("fixture leg")
    }

    /// Attach a sunny, windless forecast covering days 1..=5.
    pub(crate) fn attach_sunny_weather(leg: &mut Leg, sun: f64) {
        let weather = LegWeather::uniform(
            leg.length,
            race_time(1, 0, 0),
            race_time(5, 23, 0),
            0.0,
            sun,
            sun,
        )
        .expect("fixture weather");
        leg.attach_weather(weather).expect("fixture weather attach");
    }
}

#[cfg(test)]
mod tests {
    use super::test_fixtures::{attach_sunny_weather, flat_leg};
    use super::*;

    #[test]
    fn empty_route_fails_validation() {
        assert!(Route::new().validate().is_err());
    }

    #[test]
    fn back_to_back_loops_are_rejected() {
        let mut route = Route::new();
        route.push_leg(flat_leg("a", LegKind::Base, EndKind::Checkpoint, 1_000.0));
        route.push_leg(flat_leg("b", LegKind::Loop, EndKind::Checkpoint, 1_000.0));
        route.push_leg(flat_leg("c", LegKind::Loop, EndKind::StageStop, 1_000.0));
        assert!(route.validate().is_err());
    }

    #[test]
    fn checkpoint_final_leg_is_rejected() {
        let mut route = Route::new();
        route.push_leg(flat_leg("a", LegKind::Base, EndKind::Checkpoint, 1_000.0));
        assert!(route.validate().is_err());
    }

    #[test]
    fn total_length_accumulates() {
        let mut route = Route::new();
        route.push_leg(flat_leg("a", LegKind::Base, EndKind::Checkpoint, 1_000.0));
        route.push_leg(flat_leg("b", LegKind::Base, EndKind::StageStop, 2_500.0));
        assert!((route.total_length() - 3_500.0).abs() < 1e-9);
        assert_eq!(route.leg_names(), vec!["a", "b"]);
    }

    #[test]
    fn add_leg_builds_from_spec_tables() {
        use ingest::{AltitudeUnit, DistanceUnit, GeoRow, StepRow};
        use test_fixtures::race_time;

        let row = |distance: f64| GeoRow {
            distance,
            longitude: Some(-86.0),
            latitude: Some(39.8),
            slope: Some(0.0),
            altitude: Some(700.0),
            heading: Some(90.0),
        };
        let spec = LegSpec {
            kind: LegKind::Base,
            end: EndKind::StageStop,
            geometry: GeoTable {
                name: "stage 1".to_string(),
                distance_unit: DistanceUnit::Meters,
                altitude_unit: AltitudeUnit::Feet,
                rows: vec![row(0.0), row(2_000.0)],
            },
            steps: StepTable {
                distance_unit: DistanceUnit::Meters,
                rows: vec![
                    StepRow {
                        distance: 0.0,
                        speed_mph: Some(45.0),
                        stop: false,
                    },
                    StepRow {
                        distance: 1_200.0,
                        speed_mph: None,
                        stop: true,
                    },
                ],
            },
            start: race_time(1, 9, 0),
            open: race_time(1, 9, 0),
            close: race_time(1, 18, 0),
        };

        let mut route = Route::new();
        route.add_leg(&spec).unwrap();
        let leg = &route.legs()[0];
        assert_eq!(leg.name, "stage 1");
        assert!((leg.length - 2_000.0).abs() < 1e-9);
        assert_eq!(leg.stop_distances(), &[1_200.0]);
        // Altitude was surveyed in feet.
        assert!((leg.altitude(0.0) - 213.36).abs() < 1e-6);
        assert!(route.validate().is_ok());
    }

    #[test]
    fn snapshot_round_trips_with_weather() {
        let mut route = Route::new();
        let mut leg = flat_leg("a", LegKind::Base, EndKind::StageStop, 1_000.0);
        attach_sunny_weather(&mut leg, 800.0);
        route.push_leg(leg);

        let json = route.to_json().unwrap();
        let restored = Route::from_json(&json).unwrap();
        assert_eq!(restored, route);
        assert!(restored.legs()[0].has_weather());
    }
}
