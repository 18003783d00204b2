//! Model loading and the single-shot inference call.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use once_cell::sync::OnceCell;
use tracing::{debug, info};

use crate::error::{LoadError, PredictError};
use crate::features::{FeatureVector, FEATURE_NAMES};

mod forest;
#[cfg(feature = "torch")]
mod torch;

pub use forest::{ForestModel, Node};
#[cfg(feature = "torch")]
pub use torch::TorchModel;

/// Anything that can turn one feature row into one trip-count forecast.
///
/// Implementations are immutable once built and shared across requests.
pub trait Predictor: Send + Sync {
    fn predict(&self, features: &FeatureVector) -> anyhow::Result<f64>;

    /// Human readable model description shown on the dashboard.
    fn name(&self) -> &str {
        "Regression model"
    }
}

/// Loads the artifact at `path` once and hands out the same predictor on
/// every later call.
pub struct ModelLoader {
    path: PathBuf,
    cell: OnceCell<Arc<dyn Predictor>>,
}

impl ModelLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cell: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Concurrent first callers block on the cell until one of them finishes.
    /// A failed load leaves the cell empty.
    pub fn load(&self) -> Result<Arc<dyn Predictor>, LoadError> {
        self.cell
            .get_or_try_init(|| load_artifact(&self.path))
            .map(Arc::clone)
    }
}

/// Read and deserialize the artifact at `path`, choosing the backend from the
/// file extension.
pub fn load_artifact(path: &Path) -> Result<Arc<dyn Predictor>, LoadError> {
    info!(path = %path.display(), "loading model artifact");

    if is_torchscript(path) {
        return load_torchscript(path);
    }

    let bytes = read_artifact(path)?;
    let model = ForestModel::from_slice(path, &bytes)?;
    info!(
        model = model.name(),
        trees = model.num_trees(),
        "forest model ready"
    );
    Ok(Arc::new(model))
}

pub(crate) fn read_artifact(path: &Path) -> Result<Vec<u8>, LoadError> {
    fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => LoadError::ArtifactNotFound {
            path: path.to_path_buf(),
        },
        _ => LoadError::corrupt(path, format!("unreadable: {e}")),
    })
}

fn is_torchscript(path: &Path) -> bool {
    matches!(path.extension().and_then(|e| e.to_str()), Some("pt"))
}

#[cfg(feature = "torch")]
fn load_torchscript(path: &Path) -> Result<Arc<dyn Predictor>, LoadError> {
    Ok(Arc::new(TorchModel::load(path)?))
}

#[cfg(not(feature = "torch"))]
fn load_torchscript(path: &Path) -> Result<Arc<dyn Predictor>, LoadError> {
    if !path.exists() {
        return Err(LoadError::ArtifactNotFound {
            path: path.to_path_buf(),
        });
    }
    Err(LoadError::corrupt(
        path,
        "TorchScript artifacts need the `torch` feature",
    ))
}

/// Reject artifacts trained on a different column layout.
pub(crate) fn check_feature_schema(path: &Path, found: &[String]) -> Result<(), LoadError> {
    if found.iter().map(String::as_str).eq(FEATURE_NAMES) {
        return Ok(());
    }
    Err(LoadError::FeatureSchemaMismatch {
        path: path.to_path_buf(),
        expected: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        found: found.to_vec(),
    })
}

/// Run one feature row through the predictor.
///
/// Any model failure becomes [`PredictError::Inference`]; no retry is
/// attempted since the same input fails the same way.
pub fn predict(vector: &FeatureVector, predictor: &dyn Predictor) -> Result<f64, PredictError> {
    let value = predictor
        .predict(vector)
        .map_err(|e| PredictError::Inference(format!("{e:#}")))?;
    if !value.is_finite() {
        return Err(PredictError::Inference(format!(
            "model returned a non-finite value ({value})"
        )));
    }
    debug!(dispatch = %vector.dispatch, value, "prediction");
    Ok(value)
}
