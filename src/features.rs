//! Feature vector assembly.
//!
//! The model was trained on a fixed, ordered set of twelve columns. Everything
//! that turns user input into those columns lives here.

use std::{fmt, str::FromStr};

use serde::Serialize;

use crate::error::PredictError;
use crate::types::RawInputs;

pub const N_FEATURES: usize = 12;

/// Column names in the order the model consumes them.
pub const FEATURE_NAMES: [&str; N_FEATURES] = [
    "active_vehicles",
    "day_of_week",
    "trips_per_vehicle",
    "month",
    "is_weekend",
    "lag_1",
    "lag_7",
    "dispatching_base_number_B02598",
    "dispatching_base_number_B02617",
    "dispatching_base_number_B02682",
    "dispatching_base_number_B02764",
    "dispatching_base_number_B02765",
];

// index of the first one-hot dispatch column
const DISPATCH_OFFSET: usize = 7;

/// Vehicle-fleet operating base a forecast is made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DispatchBase {
    B02598,
    B02617,
    B02682,
    B02764,
    B02765,
}

impl DispatchBase {
    pub const ALL: [DispatchBase; 5] = [
        DispatchBase::B02598,
        DispatchBase::B02617,
        DispatchBase::B02682,
        DispatchBase::B02764,
        DispatchBase::B02765,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DispatchBase::B02598 => "B02598",
            DispatchBase::B02617 => "B02617",
            DispatchBase::B02682 => "B02682",
            DispatchBase::B02764 => "B02764",
            DispatchBase::B02765 => "B02765",
        }
    }

    /// Position among the indicator columns.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Name of this base's indicator column.
    pub fn feature_name(self) -> &'static str {
        FEATURE_NAMES[DISPATCH_OFFSET + self.index()]
    }
}

impl fmt::Display for DispatchBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DispatchBase {
    type Err = PredictError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DispatchBase::ALL
            .into_iter()
            .find(|base| base.as_str() == s)
            .ok_or_else(|| PredictError::UnknownCategory(s.to_string()))
    }
}

/// One validated model input row.
///
/// The dispatch base is stored as a single enum value, so exactly one
/// indicator column is hot by construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    pub active_vehicles: u64,
    pub day_of_week: u8,
    pub trips_per_vehicle: f64,
    pub month: u8,
    pub is_weekend: u8,
    pub lag_1: u64,
    pub lag_7: u64,
    pub dispatch: DispatchBase,
}

impl FeatureVector {
    /// One-hot dispatch indicators, in column order.
    pub fn dispatch_indicators(&self) -> [u8; 5] {
        let mut hot = [0u8; 5];
        hot[self.dispatch.index()] = 1;
        hot
    }

    /// Dense row in [`FEATURE_NAMES`] order.
    pub fn values(&self) -> [f64; N_FEATURES] {
        let mut row = [0.0; N_FEATURES];
        row[0] = self.active_vehicles as f64;
        row[1] = f64::from(self.day_of_week);
        row[2] = self.trips_per_vehicle;
        row[3] = f64::from(self.month);
        row[4] = f64::from(self.is_weekend);
        row[5] = self.lag_1 as f64;
        row[6] = self.lag_7 as f64;
        for (slot, hot) in row[DISPATCH_OFFSET..].iter_mut().zip(self.dispatch_indicators()) {
            *slot = f64::from(hot);
        }
        row
    }

    /// `(name, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> {
        FEATURE_NAMES.into_iter().zip(self.values())
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }
}

/// Validate raw inputs and assemble the model row.
///
/// Lags are passed through untouched from the previous-day and previous-week
/// counts.
pub fn build_feature_vector(raw: &RawInputs) -> Result<FeatureVector, PredictError> {
    let active_vehicles = non_negative("active_vehicles", raw.active_vehicles)?;
    let day_of_week = bounded("day_of_week", raw.day_of_week, 0, 6)?;
    let month = bounded("month", raw.month, 1, 12)?;
    let is_weekend = bounded("is_weekend", raw.is_weekend, 0, 1)?;
    let lag_1 = non_negative("prev_day", raw.prev_day)?;
    let lag_7 = non_negative("prev_week", raw.prev_week)?;

    if !raw.trips_per_vehicle.is_finite() {
        return Err(PredictError::invalid("trips_per_vehicle", "must be a finite number"));
    }
    if raw.trips_per_vehicle < 0.0 {
        return Err(PredictError::invalid("trips_per_vehicle", "must be >= 0"));
    }

    let dispatch = raw.dispatch.parse::<DispatchBase>()?;

    Ok(FeatureVector {
        active_vehicles,
        day_of_week,
        trips_per_vehicle: raw.trips_per_vehicle,
        month,
        is_weekend,
        lag_1,
        lag_7,
        dispatch,
    })
}

fn non_negative(field: &str, value: i64) -> Result<u64, PredictError> {
    u64::try_from(value).map_err(|_| PredictError::invalid(field, format!("must be >= 0, got {value}")))
}

fn bounded(field: &str, value: i64, lo: i64, hi: i64) -> Result<u8, PredictError> {
    if !(lo..=hi).contains(&value) {
        return Err(PredictError::invalid(
            field,
            format!("must be between {lo} and {hi}, got {value}"),
        ));
    }
    u8::try_from(value).map_err(|_| PredictError::invalid(field, format!("out of range: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example() -> RawInputs {
        RawInputs {
            dispatch: "B02617".into(),
            ..RawInputs::default()
        }
    }

    #[test]
    fn example_inputs_assemble_expected_row() {
        let v = build_feature_vector(&example()).unwrap();

        assert_eq!(v.get("active_vehicles"), Some(5.0));
        assert_eq!(v.get("day_of_week"), Some(1.0));
        assert_eq!(v.get("month"), Some(7.0));
        assert_eq!(v.get("is_weekend"), Some(0.0));
        assert_eq!(v.get("trips_per_vehicle"), Some(300.0));
        assert_eq!(v.get("lag_1"), Some(7.0));
        assert_eq!(v.get("lag_7"), Some(8.0));
        assert_eq!(v.get("dispatching_base_number_B02617"), Some(1.0));
        for other in ["B02598", "B02682", "B02764", "B02765"] {
            let name = format!("dispatching_base_number_{other}");
            assert_eq!(v.get(&name), Some(0.0), "{name} should be cold");
        }
    }

    #[test]
    fn column_order_matches_names() {
        let v = build_feature_vector(&example()).unwrap();
        let names: Vec<_> = v.iter().map(|(n, _)| n).collect();
        assert_eq!(names, FEATURE_NAMES);
        assert_eq!(v.values()[5], 7.0);
        assert_eq!(v.values()[6], 8.0);
    }

    #[test]
    fn every_base_maps_to_its_own_column() {
        for base in DispatchBase::ALL {
            let raw = RawInputs {
                dispatch: base.as_str().into(),
                ..RawInputs::default()
            };
            let v = build_feature_vector(&raw).unwrap();
            assert_eq!(v.dispatch_indicators().iter().sum::<u8>(), 1);
            assert_eq!(v.get(base.feature_name()), Some(1.0));
        }
    }

    #[test]
    fn day_of_week_bounds() {
        for day in [0, 6] {
            let raw = RawInputs { day_of_week: day, ..RawInputs::default() };
            assert!(build_feature_vector(&raw).is_ok(), "day {day} should be accepted");
        }
        let raw = RawInputs { day_of_week: 7, ..RawInputs::default() };
        match build_feature_vector(&raw) {
            Err(PredictError::InvalidInput { field, .. }) => assert_eq!(field, "day_of_week"),
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn out_of_range_fields_are_named() {
        let cases = [
            (RawInputs { month: 0, ..RawInputs::default() }, "month"),
            (RawInputs { month: 13, ..RawInputs::default() }, "month"),
            (RawInputs { is_weekend: 2, ..RawInputs::default() }, "is_weekend"),
            (RawInputs { active_vehicles: -1, ..RawInputs::default() }, "active_vehicles"),
            (RawInputs { prev_day: -3, ..RawInputs::default() }, "prev_day"),
            (RawInputs { prev_week: -8, ..RawInputs::default() }, "prev_week"),
            (RawInputs { trips_per_vehicle: -0.5, ..RawInputs::default() }, "trips_per_vehicle"),
            (RawInputs { trips_per_vehicle: f64::NAN, ..RawInputs::default() }, "trips_per_vehicle"),
        ];
        for (raw, expected) in cases {
            let err = build_feature_vector(&raw).unwrap_err();
            assert_eq!(err.field(), Some(expected), "{err}");
        }
    }

    #[test]
    fn unknown_dispatch_is_rejected() {
        let raw = RawInputs { dispatch: "B99999".into(), ..RawInputs::default() };
        assert!(matches!(
            build_feature_vector(&raw),
            Err(PredictError::UnknownCategory(ref id)) if id == "B99999"
        ));
    }
}
