//! Daily trip-demand forecaster: loads a pre-trained regressor once and serves
//! a dashboard that turns a handful of inputs into one forecast.

pub mod config;
pub mod dashboard;
pub mod error;
pub mod features;
pub mod model;
pub mod server;
pub mod types;

pub use config::ServerConfig;
pub use error::{LoadError, PredictError};
pub use features::{build_feature_vector, DispatchBase, FeatureVector, FEATURE_NAMES};
pub use model::{predict, ModelLoader, Predictor};
pub use server::{router, AppState};
pub use types::{PredictionOut, RawInputs};
