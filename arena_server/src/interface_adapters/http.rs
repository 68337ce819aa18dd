// Shared HTTP response types.

use crate::interface_adapters::protocol::SessionPhaseDto;
use crate::use_cases::SessionStatus;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    // Human-readable error string for consistent JSON error responses.
    pub error: String,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub session_id: String,
    pub app_id: String,
    pub phase: SessionPhaseDto,
    pub participants: usize,
}

impl HealthResponse {
    pub fn new(session_id: &str, app_id: &str, status: &SessionStatus) -> Self {
        Self {
            status: if status.stopped.is_some() { "stopping" } else { "ok" },
            session_id: session_id.to_string(),
            app_id: app_id.to_string(),
            phase: status.phase.into(),
            participants: status.participants,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SessionPhase;
    use serde_json::json;

    #[test]
    fn when_session_is_playing_then_health_reports_ok_with_phase() {
        let status = SessionStatus {
            phase: SessionPhase::Playing,
            participants: 2,
            stopped: None,
        };

        let body = serde_json::to_value(HealthResponse::new("s-1", "block_battle", &status))
            .expect("serializable");

        assert_eq!(
            body,
            json!({
                "status": "ok",
                "sessionId": "s-1",
                "appId": "block_battle",
                "phase": "playing",
                "participants": 2
            })
        );
    }

    #[test]
    fn when_session_stopped_then_health_reports_stopping() {
        let status = SessionStatus {
            stopped: Some("no activity for 600s".to_string()),
            ..SessionStatus::default()
        };

        assert_eq!(HealthResponse::new("s", "a", &status).status, "stopping");
    }
}
