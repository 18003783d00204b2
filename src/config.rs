use std::{
    env, fs,
    net::SocketAddr,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub model_path: PathBuf,
    pub bind_addr: String,
    /// Log a feature summary for every request (`LOG_PRED=1`).
    pub log_predictions: bool,
    pub page_title: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/uber_demand_model.json"),
            bind_addr: "0.0.0.0:8080".to_string(),
            log_predictions: false,
            page_title: "Uber Trip Demand Forecasting Dashboard".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        serde_json::from_str(&data).with_context(|| format!("invalid config JSON in {}", path.display()))
    }

    /// Defaults, then the file named by `FORECAST_CONFIG`, then env overrides.
    pub fn resolve() -> Result<Self> {
        let mut cfg = match env::var("FORECAST_CONFIG") {
            Ok(path) => Self::load(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        cfg.apply_env(|key| env::var(key).ok())?;
        Ok(cfg)
    }

    /// Apply `MODEL_PATH`, `BIND_ADDR`, `PORT` and `LOG_PRED` from `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("MODEL_PATH") {
            self.model_path = PathBuf::from(path);
        }
        if let Some(addr) = lookup("BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(port) = lookup("PORT") {
            let port: u16 = port
                .trim()
                .parse()
                .with_context(|| format!("PORT is not a valid port number: {port}"))?;
            let mut addr = self.socket_addr()?;
            addr.set_port(port);
            self.bind_addr = addr.to_string();
        }
        if let Some(flag) = lookup("LOG_PRED") {
            self.log_predictions = flag == "1";
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind_addr
            .parse()
            .with_context(|| format!("invalid bind address: {}", self.bind_addr))
    }
}
