use std::sync::Arc;

use axum::{
    extract::{
        rejection::JsonRejection,
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{Html, Response},
    routing::{get, post},
    Form, Json, Router,
};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::dashboard::{render_page, Outcome, PageContext};
use crate::error::PredictError;
use crate::features::{build_feature_vector, FeatureVector, FEATURE_NAMES};
use crate::model::{predict, Predictor};
use crate::types::{FormFields, PredictionOut, RawInputs};

// ---------- Server state ----------

#[derive(Debug, Default, Clone, Serialize)]
pub struct ServingStats {
    pub requests_served: u64,
    pub failed_requests: u64,
    pub last_prediction: Option<f64>,
}

#[derive(Clone)]
pub struct AppState {
    predictor: Arc<dyn Predictor>,
    config: Arc<ServerConfig>,
    stats: Arc<Mutex<ServingStats>>,
}

impl AppState {
    pub fn new(predictor: Arc<dyn Predictor>, config: ServerConfig) -> Self {
        Self {
            predictor,
            config: Arc::new(config),
            stats: Arc::new(Mutex::new(ServingStats::default())),
        }
    }

    pub fn stats(&self) -> ServingStats {
        self.stats.lock().clone()
    }

    /// One full interaction: validate, assemble, infer, package.
    pub fn forecast(&self, raw: &RawInputs) -> Result<PredictionOut, PredictError> {
        let result = build_feature_vector(raw).and_then(|vector| {
            if self.config.log_predictions {
                log_feature_summary(&vector);
            }
            let value = predict(&vector, self.predictor.as_ref())?;
            Ok(PredictionOut::new(value, vector.dispatch))
        });

        {
            let mut stats = self.stats.lock();
            match &result {
                Ok(out) => {
                    stats.requests_served += 1;
                    stats.last_prediction = Some(out.predicted_trips);
                }
                Err(_) => stats.failed_requests += 1,
            }
        }

        match &result {
            Ok(out) => {
                if let Some(warning) = &out.warning {
                    warn!(dispatch = %out.dispatch, "{warning}");
                }
            }
            Err(e @ PredictError::Inference(_)) => error!("{e}"),
            Err(e) => debug!("rejected request: {e}"),
        }
        result
    }

    fn page_context(&self) -> PageContext<'_> {
        PageContext {
            title: &self.config.page_title,
            model_name: self.predictor.name(),
        }
    }
}

// Debug signal so we can confirm what the model actually receives
fn log_feature_summary(vector: &FeatureVector) {
    let values = vector.values();
    let nz = values.iter().filter(|x| **x != 0.0).count();
    let sample: Vec<String> = vector
        .iter()
        .take(7)
        .map(|(name, v)| format!("{name}={v:.3}"))
        .collect();
    info!(
        "recv dispatch={} in_dim={} nonzero={} sample=[{}]",
        vector.dispatch,
        values.len(),
        nz,
        sample.join(", ")
    );
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/predict", post(submit_form))
        .route("/api/predict", post(api_predict))
        .route("/api/model", get(model_info))
        .route("/health", get(health))
        .route("/ws", get(ws_upgrade))
        .with_state(state)
}

// ---------- Handlers ----------

async fn index(State(state): State<AppState>) -> Html<String> {
    let fields = FormFields::from_raw(&RawInputs::default());
    Html(render_page(&state.page_context(), &fields, Outcome::Idle))
}

async fn submit_form(
    State(state): State<AppState>,
    Form(fields): Form<FormFields>,
) -> (StatusCode, Html<String>) {
    let result = fields.parse().and_then(|raw| state.forecast(&raw));
    let (status, outcome) = match &result {
        Ok(out) => (StatusCode::OK, Outcome::Success(out)),
        Err(e) => (e.status(), Outcome::Failure(e)),
    };
    (status, Html(render_page(&state.page_context(), &fields, outcome)))
}

async fn api_predict(
    State(state): State<AppState>,
    payload: Result<Json<RawInputs>, JsonRejection>,
) -> Result<Json<PredictionOut>, PredictError> {
    let Json(raw) = payload.map_err(|e| PredictError::invalid("body", e.body_text()))?;
    state.forecast(&raw).map(Json)
}

async fn model_info(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "name": state.predictor.name(),
        "n_features": FEATURE_NAMES.len(),
        "feature_names": FEATURE_NAMES,
        "model_path": state.config.model_path,
        "stats": state.stats(),
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Each text frame is one request; each reply is one prediction or error.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();

    while let Some(msg) = stream.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!("websocket receive error: {e}");
                break;
            }
        };

        let reply = match serde_json::from_str::<RawInputs>(&text) {
            Ok(raw) => match state.forecast(&raw) {
                Ok(out) => serde_json::to_value(&out).unwrap_or_else(|e| json!({ "error": e.to_string() })),
                Err(e) => e.to_json(),
            },
            Err(e) => PredictError::invalid("body", e.to_string()).to_json(),
        };

        if sink.send(Message::Text(reply.to_string())).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
        value: f64,
    }

    impl Predictor for Counting {
        fn predict(&self, _: &FeatureVector) -> anyhow::Result<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.value)
        }
    }

    fn state_with(value: f64) -> (AppState, Arc<Counting>) {
        let model = Arc::new(Counting {
            calls: AtomicUsize::new(0),
            value,
        });
        (AppState::new(model.clone(), ServerConfig::default()), model)
    }

    #[test]
    fn example_scenario_passes_stub_value_through() {
        let (state, model) = state_with(1234.5);
        let raw = RawInputs {
            dispatch: "B02617".into(),
            ..RawInputs::default()
        };
        let out = state.forecast(&raw).unwrap();
        assert_eq!(out.predicted_trips, 1234.5);
        assert_eq!(out.chart.value, 1234.5);
        assert_eq!(out.dispatch, "B02617");
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_dispatch_never_reaches_model() {
        let (state, model) = state_with(1.0);
        let raw = RawInputs {
            dispatch: "B99999".into(),
            ..RawInputs::default()
        };
        assert!(matches!(state.forecast(&raw), Err(PredictError::UnknownCategory(_))));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn stats_track_outcomes() {
        let (state, _) = state_with(10.0);
        state.forecast(&RawInputs::default()).unwrap();
        let _ = state.forecast(&RawInputs {
            month: 13,
            ..RawInputs::default()
        });

        let stats = state.stats();
        assert_eq!(stats.requests_served, 1);
        assert_eq!(stats.failed_requests, 1);
        assert_eq!(stats.last_prediction, Some(10.0));
    }
}
