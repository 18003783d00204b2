use serde::{Deserialize, Serialize};

use crate::error::PredictError;
use crate::features::DispatchBase;

/// Inputs as the user submits them, before range checks.
///
/// Signed integers so negative values reach validation instead of failing
/// deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawInputs {
    pub active_vehicles: i64,
    pub day_of_week: i64,
    pub month: i64,
    pub is_weekend: i64,
    pub prev_day: i64,  // becomes lag_1
    pub prev_week: i64, // becomes lag_7
    pub trips_per_vehicle: f64,
    pub dispatch: String,
}

impl Default for RawInputs {
    /// The values the dashboard form starts with.
    fn default() -> Self {
        Self {
            active_vehicles: 5,
            day_of_week: 1,
            month: 7,
            is_weekend: 0,
            prev_day: 7,
            prev_week: 8,
            trips_per_vehicle: 300.0,
            dispatch: DispatchBase::B02598.as_str().to_string(),
        }
    }
}

/// Urlencoded form body. Every field is kept as text so a bad value can be
/// echoed back into the form alongside the error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormFields {
    pub active_vehicles: String,
    pub day_of_week: String,
    pub month: String,
    pub is_weekend: String,
    pub prev_day: String,
    pub prev_week: String,
    pub trips_per_vehicle: String,
    pub dispatch: String,
}

impl FormFields {
    pub fn from_raw(raw: &RawInputs) -> Self {
        Self {
            active_vehicles: raw.active_vehicles.to_string(),
            day_of_week: raw.day_of_week.to_string(),
            month: raw.month.to_string(),
            is_weekend: raw.is_weekend.to_string(),
            prev_day: raw.prev_day.to_string(),
            prev_week: raw.prev_week.to_string(),
            trips_per_vehicle: format!("{:.1}", raw.trips_per_vehicle),
            dispatch: raw.dispatch.clone(),
        }
    }

    pub fn parse(&self) -> Result<RawInputs, PredictError> {
        Ok(RawInputs {
            active_vehicles: parse_int("active_vehicles", &self.active_vehicles)?,
            day_of_week: parse_int("day_of_week", &self.day_of_week)?,
            month: parse_int("month", &self.month)?,
            is_weekend: parse_int("is_weekend", &self.is_weekend)?,
            prev_day: parse_int("prev_day", &self.prev_day)?,
            prev_week: parse_int("prev_week", &self.prev_week)?,
            trips_per_vehicle: parse_float("trips_per_vehicle", &self.trips_per_vehicle)?,
            dispatch: self.dispatch.trim().to_string(),
        })
    }
}

fn parse_int(field: &str, text: &str) -> Result<i64, PredictError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(PredictError::invalid(field, "a value is required"));
    }
    text.parse()
        .map_err(|_| PredictError::invalid(field, format!("expected a whole number, got `{text}`")))
}

fn parse_float(field: &str, text: &str) -> Result<f64, PredictError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(PredictError::invalid(field, "a value is required"));
    }
    text.parse()
        .map_err(|_| PredictError::invalid(field, format!("expected a number, got `{text}`")))
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChartSpec {
    pub title: String,
    pub category: String,
    pub value: f64,
}

/// Everything the presentation layer needs for one forecast.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PredictionOut {
    pub predicted_trips: f64,
    /// Integer readout for the metric, truncated toward zero.
    pub display_value: i64,
    pub dispatch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub chart: ChartSpec,
}

impl PredictionOut {
    pub fn new(predicted_trips: f64, dispatch: DispatchBase) -> Self {
        let warning = (predicted_trips < 0.0).then(|| {
            format!("model returned a negative trip count ({predicted_trips:.2})")
        });
        Self {
            predicted_trips,
            display_value: predicted_trips.trunc() as i64,
            dispatch: dispatch.to_string(),
            warning,
            chart: ChartSpec {
                title: "Predicted Trip Demand".to_string(),
                category: "Predicted Trips".to_string(),
                value: predicted_trips,
            },
        }
    }
}
