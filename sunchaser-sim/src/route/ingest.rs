//! Tabular route ingestion.
//!
//! Survey data arrives as two tables per leg: a geometry table (distance,
//! longitude, latitude, slope, altitude, heading) and a steps table listing
//! mandatory stops and posted speed limits keyed by a distance marker.
//! Leading gaps in the geometry channels are backward-filled with the first
//! valid value, matching how survey exports trail off at the start of a
//! course.

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::interp::{Series1, StepSeries};
use crate::route::leg::Geometry;
use crate::units::{feet_to_meters, miles_to_meters, mph_to_mps};

/// Unit of the distance column in an ingested table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    #[default]
    Meters,
    Kilometers,
    Miles,
}

impl DistanceUnit {
    fn to_meters(self, value: f64) -> f64 {
        match self {
            Self::Meters => value,
            Self::Kilometers => value * 1_000.0,
            Self::Miles => miles_to_meters(value),
        }
    }
}

/// Unit of the altitude column in an ingested geometry table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AltitudeUnit {
    #[default]
    Meters,
    Feet,
}

impl AltitudeUnit {
    fn to_meters(self, value: f64) -> f64 {
        match self {
            Self::Meters => value,
            Self::Feet => feet_to_meters(value),
        }
    }
}

/// One geometry survey sample. Channels may be missing at the head of the
/// table; they are backward-filled during the build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoRow {
    pub distance: f64,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub slope: Option<f64>,
    pub altitude: Option<f64>,
    pub heading: Option<f64>,
}

/// A whole geometry table for one leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoTable {
    pub name: String,
    #[serde(default)]
    pub distance_unit: DistanceUnit,
    #[serde(default)]
    pub altitude_unit: AltitudeUnit,
    pub rows: Vec<GeoRow>,
}

/// Geometry interpolants plus the course length they cover.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltGeometry {
    pub name: String,
    pub length: f64,
    pub geometry: Geometry,
}

impl GeoTable {
    /// Parse a geometry table from JSON.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Config` when the document does not parse.
    pub fn from_json(json_str: &str) -> SimResult<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| SimError::config(format!("geometry table parse error: {e}")))
    }

    /// Build the continuous geometry channels.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Config` when the table is empty, distances are not
    /// strictly increasing, or a channel has no valid samples at all.
    pub fn build(&self) -> SimResult<BuiltGeometry> {
        if self.rows.len() < 2 {
            return Err(SimError::config(format!(
                "geometry table {:?} needs at least two rows",
                self.name
            )));
        }
        let dists: Vec<f64> = self
            .rows
            .iter()
            .map(|r| self.distance_unit.to_meters(r.distance))
            .collect();

        let longitude = self.channel(&dists, |r| r.longitude, "longitude")?;
        let latitude = self.channel(&dists, |r| r.latitude, "latitude")?;
        let slope = self.channel(&dists, |r| r.slope, "slope")?;
        let altitude = self.channel(
            &dists,
            |r| r.altitude.map(|a| self.altitude_unit.to_meters(a)),
            "altitude",
        )?;
        let heading_vals = backfill(
            self.rows.iter().map(|r| r.heading).collect(),
            &self.name,
            "heading",
        )?;
        let heading = Series1::nearest(dists.clone(), heading_vals)?;

        Ok(BuiltGeometry {
            name: self.name.clone(),
            length: *dists.last().unwrap_or(&0.0),
            geometry: Geometry {
                longitude,
                latitude,
                slope,
                altitude,
                heading,
            },
        })
    }

    fn channel(
        &self,
        dists: &[f64],
        pick: impl Fn(&GeoRow) -> Option<f64>,
        label: &str,
    ) -> SimResult<Series1> {
        let values = backfill(self.rows.iter().map(pick).collect(), &self.name, label)?;
        Series1::linear(dists.to_vec(), values)
    }
}

/// Backward-fill gaps with the next valid value; trailing gaps take the last
/// valid value. A channel with no valid samples is a configuration error.
fn backfill(values: Vec<Option<f64>>, table: &str, label: &str) -> SimResult<Vec<f64>> {
    if values.iter().all(Option::is_none) {
        return Err(SimError::config(format!(
            "geometry table {table:?} channel {label} has no valid samples"
        )));
    }
    let mut filled = values;
    let mut next_valid = None;
    for slot in filled.iter_mut().rev() {
        match slot {
            Some(v) => next_valid = Some(*v),
            None => *slot = next_valid,
        }
    }
    // Trailing gaps have no "next" value; they take the last valid one.
    let mut last_valid = None;
    for slot in filled.iter_mut() {
        match slot {
            Some(v) => last_valid = Some(*v),
            None => *slot = last_valid,
        }
    }
    Ok(filled.into_iter().map(Option::unwrap_or_default).collect())
}

/// One row of a steps table: a distance marker with an optional posted
/// speed and a flag marking a mandatory stop (stop sign, light, turn).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRow {
    pub distance: f64,
    #[serde(default)]
    pub speed_mph: Option<f64>,
    #[serde(default)]
    pub stop: bool,
}

/// Steps table for one leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepTable {
    #[serde(default)]
    pub distance_unit: DistanceUnit,
    pub rows: Vec<StepRow>,
}

/// Stop list plus speed-limit schedule built from a steps table.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltSteps {
    pub stop_distances: Vec<f64>,
    pub speed_limits: StepSeries,
}

impl StepTable {
    /// Parse a steps table from JSON.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Config` when the document does not parse.
    pub fn from_json(json_str: &str) -> SimResult<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| SimError::config(format!("steps table parse error: {e}")))
    }

    /// Build the stop list and limit schedule.
    ///
    /// The first posted limit is replicated to distance 0 when the table
    /// does not open with one, so the schedule always covers the leg start.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Config` when no limit rows exist or markers are
    /// not strictly increasing.
    pub fn build(&self) -> SimResult<BuiltSteps> {
        let stop_distances: Vec<f64> = self
            .rows
            .iter()
            .filter(|r| r.stop)
            .map(|r| self.distance_unit.to_meters(r.distance))
            .collect();

        let mut markers = Vec::new();
        let mut limits = Vec::new();
        for row in &self.rows {
            if let Some(mph) = row.speed_mph {
                markers.push(self.distance_unit.to_meters(row.distance));
                limits.push(mph_to_mps(mph));
            }
        }
        if limits.is_empty() {
            return Err(SimError::config("steps table has no posted speed limits"));
        }
        if markers[0] != 0.0 {
            markers.insert(0, 0.0);
            limits.insert(0, limits[0]);
        }

        let speed_limits = StepSeries::new(markers, limits)?;
        if stop_distances.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SimError::config(
                "steps table stop markers must be strictly increasing",
            ));
        }
        Ok(BuiltSteps {
            stop_distances,
            speed_limits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(distance: f64, altitude: Option<f64>) -> GeoRow {
        GeoRow {
            distance,
            longitude: Some(-86.2),
            latitude: Some(39.8),
            slope: Some(0.0),
            altitude,
            heading: Some(90.0),
        }
    }

    #[test]
    fn leading_gaps_are_backward_filled() {
        let table = GeoTable {
            name: "stage 1".to_string(),
            distance_unit: DistanceUnit::Meters,
            altitude_unit: AltitudeUnit::Meters,
            rows: vec![
                row(0.0, None),
                row(100.0, None),
                row(200.0, Some(250.0)),
                row(300.0, Some(260.0)),
            ],
        };
        let built = table.build().unwrap();
        assert!((built.geometry.altitude.sample(0.0) - 250.0).abs() < 1e-9);
        assert!((built.geometry.altitude.sample(150.0) - 250.0).abs() < 1e-9);
        assert!((built.length - 300.0).abs() < 1e-9);
    }

    #[test]
    fn distances_convert_to_meters() {
        let table = GeoTable {
            name: "stage 1".to_string(),
            distance_unit: DistanceUnit::Miles,
            altitude_unit: AltitudeUnit::Feet,
            rows: vec![row(0.0, Some(1_000.0)), row(1.0, Some(1_000.0))],
        };
        let built = table.build().unwrap();
        assert!((built.length - 1_609.34).abs() < 1e-6);
        assert!((built.geometry.altitude.sample(0.0) - 304.8).abs() < 1e-6);
    }

    #[test]
    fn channel_with_no_samples_is_rejected() {
        let mut bad = row(0.0, None);
        bad.longitude = None;
        let mut bad2 = row(100.0, None);
        bad2.longitude = None;
        let table = GeoTable {
            name: "stage 1".to_string(),
            distance_unit: DistanceUnit::Meters,
            altitude_unit: AltitudeUnit::Meters,
            rows: vec![bad, bad2],
        };
        assert!(table.build().is_err());
    }

    #[test]
    fn steps_build_synthesizes_leading_limit() {
        let table = StepTable {
            distance_unit: DistanceUnit::Meters,
            rows: vec![
                StepRow {
                    distance: 500.0,
                    speed_mph: Some(35.0),
                    stop: false,
                },
                StepRow {
                    distance: 800.0,
                    speed_mph: None,
                    stop: true,
                },
            ],
        };
        let built = table.build().unwrap();
        assert_eq!(built.stop_distances, vec![800.0]);
        // Limit before the first marker is the first posted value.
        assert!((built.speed_limits.value_at(0.0) - mph_to_mps(35.0)).abs() < 1e-9);
        assert_eq!(built.speed_limits.len(), 2);
    }

    #[test]
    fn steps_without_limits_are_rejected() {
        let table = StepTable {
            distance_unit: DistanceUnit::Meters,
            rows: vec![StepRow {
                distance: 0.0,
                speed_mph: None,
                stop: true,
            }],
        };
        assert!(table.build().is_err());
    }
}
