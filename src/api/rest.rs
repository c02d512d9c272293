use crate::config::ApiConfig;
use crate::engine::{ActionOutcome, MonitorState, StatusReport};
use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use log::info;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<MonitorState>,
}

pub struct RestApi {
    config: ApiConfig,
    monitor: Arc<MonitorState>,
}

impl RestApi {
    pub fn new(config: &ApiConfig, monitor: Arc<MonitorState>) -> Self {
        Self {
            config: config.clone(),
            monitor,
        }
    }

    pub fn router(&self) -> Router {
        let state = AppState {
            monitor: Arc::clone(&self.monitor),
        };

        use std::time::Duration;
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .allow_credentials(false)
            .max_age(Duration::from_secs(3600));

        Router::new()
            .route("/api/status", get(get_status))
            .route("/api/alarms/:id/:action", post(alarm_action))
            .with_state(state)
            .layer(cors)
    }

    /// Serve until `shutdown` is cancelled
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let addr = self.config.address.clone() + ":" + &self.config.port.to_string();
        let addr: SocketAddr = addr.parse()?;

        info!("API server listening on {}", addr);

        axum::Server::try_bind(&addr)?
            .serve(self.router().into_make_service())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("API server stopped");
        Ok(())
    }
}

async fn get_status(State(state): State<AppState>) -> Json<StatusReport> {
    Json(state.monitor.get_status().await)
}

async fn alarm_action(
    State(state): State<AppState>,
    Path((id, action)): Path<(String, String)>,
) -> (StatusCode, Json<ActionOutcome>) {
    let outcome = state.monitor.apply_alarm_action_raw(&id, &action).await;
    if outcome.success {
        (StatusCode::OK, Json(outcome))
    } else {
        info!("Rejected alarm action: {}", outcome.message);
        (StatusCode::BAD_REQUEST, Json(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarms::Cooldowns;
    use crate::clock::ManualClock;

    fn state() -> AppState {
        AppState {
            monitor: Arc::new(MonitorState::new(
                Cooldowns::default(),
                Arc::new(ManualClock::at_noon()),
            )),
        }
    }

    #[tokio::test]
    async fn status_endpoint_returns_snapshot() {
        let Json(report) = get_status(State(state())).await;
        assert_eq!(report.text, "Starting...");
        assert!(report.alarms.is_empty());
    }

    #[tokio::test]
    async fn unknown_alarm_is_a_bad_request() {
        let id = uuid::Uuid::new_v4().to_string();
        let (code, Json(outcome)) =
            alarm_action(State(state()), Path((id, "acknowledge".to_string()))).await;
        assert_eq!(code, StatusCode::BAD_REQUEST);
        assert!(!outcome.success);
        assert!(outcome.message.ends_with("not found."));
    }

    #[test]
    fn status_report_serialises_alarm_type_field() -> Result<()> {
        let report = StatusReport {
            text: "Normal".into(),
            severity: crate::status::Severity::Normal,
            severity_class: "status-normal".into(),
            alarms: vec![crate::alarms::Alarm::new(
                crate::alarms::AlarmType::Fall,
                chrono::Utc::now(),
            )],
            degraded: vec![crate::detection::Modality::Fire],
            updated_at: None,
        };
        let json = serde_json::to_value(&report)?;
        assert_eq!(json["alarms"][0]["type"], "fall");
        assert_eq!(json["alarms"][0]["status"], "new");
        assert_eq!(json["degraded"][0], "fire");
        Ok(())
    }
}
