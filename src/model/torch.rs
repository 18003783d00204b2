//! TorchScript backend, for forests converted to a scripted module.
//!
//! The module takes a `[1, 12]` float tensor and returns a single value.
//! Column names live in a sidecar `<stem>.meta.json` next to the `.pt` file.

use std::path::Path;

use anyhow::{bail, Result};
use serde::Deserialize;
use tch::{kind::Kind, CModule, Device, Tensor};

use super::{check_feature_schema, read_artifact, Predictor};
use crate::error::LoadError;
use crate::features::{FeatureVector, N_FEATURES};

#[derive(Deserialize)]
struct MetaJson {
    feat_list: Vec<String>,
    name: Option<String>,
}

pub struct TorchModel {
    model: CModule,
    device: Device,
    name: String,
}

impl TorchModel {
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        if !path.exists() {
            return Err(LoadError::ArtifactNotFound {
                path: path.to_path_buf(),
            });
        }

        let meta_path = path.with_extension("meta.json");
        let meta_bytes = read_artifact(&meta_path).map_err(|e| {
            LoadError::corrupt(path, format!("missing or unreadable sidecar metadata: {e}"))
        })?;
        let meta: MetaJson = serde_json::from_slice(&meta_bytes)
            .map_err(|e| LoadError::corrupt(path, format!("invalid {}: {e}", meta_path.display())))?;
        check_feature_schema(path, &meta.feat_list)?;

        let device = Device::Cpu;
        let model = CModule::load_on_device(path, device)
            .map_err(|e| LoadError::corrupt(path, format!("failed to load TorchScript: {e}")))?;

        Ok(Self {
            model,
            device,
            name: meta.name.unwrap_or_else(|| "TorchScript regressor".to_string()),
        })
    }
}

impl Predictor for TorchModel {
    fn predict(&self, features: &FeatureVector) -> Result<f64> {
        let row: Vec<f32> = features.values().iter().map(|v| *v as f32).collect();
        let input = Tensor::from_slice(&row)
            .reshape([1, N_FEATURES as i64])
            .to_device(self.device);

        let out = tch::no_grad(|| self.model.forward_ts(&[input]))?;
        let out = out.to_kind(Kind::Double).flatten(0, -1);
        if out.numel() != 1 {
            bail!("expected a single output value, got shape {:?}", out.size());
        }
        Ok(out.double_value(&[0]))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
