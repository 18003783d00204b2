//! Error types for the forecaster.
//!
//! Startup failures ([`LoadError`]) halt the process. Per-request failures
//! ([`PredictError`]) are turned into a user-visible message at the request
//! boundary and never take the server down.

use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errors raised while loading the model artifact.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Nothing exists at the configured artifact path.
    #[error("model artifact not found at {}", .path.display())]
    ArtifactNotFound { path: PathBuf },

    /// The artifact exists but could not be turned into a predictor.
    #[error("model artifact at {} is corrupt: {reason}", .path.display())]
    ArtifactCorrupt { path: PathBuf, reason: String },

    /// The artifact was trained on a different feature layout.
    #[error(
        "model artifact at {} expects features {found:?}, the dashboard builds {expected:?}",
        .path.display()
    )]
    FeatureSchemaMismatch {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },
}

impl LoadError {
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ArtifactCorrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while serving a single prediction request.
#[derive(Debug, Error)]
pub enum PredictError {
    /// A field is missing, unparsable or outside its allowed range.
    #[error("invalid value for `{field}`: {reason}")]
    InvalidInput { field: String, reason: String },

    /// The dispatch base is not one of the five known identifiers.
    #[error("unknown dispatch base `{0}` (expected one of B02598, B02617, B02682, B02764, B02765)")]
    UnknownCategory(String),

    /// The model call itself failed or produced an unusable value.
    #[error("inference failed: {0}")]
    Inference(String),
}

impl PredictError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Stable machine-readable tag used in JSON payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "invalid_input",
            Self::UnknownCategory(_) => "unknown_category",
            Self::Inference(_) => "inference",
        }
    }

    /// Name of the offending input field, if the error is tied to one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::InvalidInput { field, .. } => Some(field.as_str()),
            Self::UnknownCategory(_) => Some("dispatch"),
            Self::Inference(_) => None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput { .. } | Self::UnknownCategory(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "error": self.to_string(),
            "kind": self.kind(),
            "field": self.field(),
        })
    }
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.to_json())).into_response()
    }
}
