//! Step-result webhook receiver.
//!
//! The only inbound path that mutates run-level state. The orchestrator
//! reports the outcome of executing one step for one target; the request is
//! authenticated with an HMAC over the raw body bytes before any parsing.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::warn;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::campaigns::enqueue::CampaignStepRun;
use crate::security::signature;
use crate::shared::error::ApiError;
use crate::shared::response::ApiResponse;
use crate::shared::schema::{campaign_step_runs, campaign_steps, campaign_targets};
use crate::shared::state::AppState;
use crate::shared::utils::{get_conn, DbConn};

pub const TIMESTAMP_HEADER: &str = "x-timestamp";
pub const SIGNATURE_HEADER: &str = "x-signature";

/// Terminal outcomes the orchestrator may report. `queued` is deliberately
/// absent: a run only enters that state when it is created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportedStatus {
    #[default]
    Sent,
    Bounced,
    Failed,
    Skipped,
}

impl std::fmt::Display for ReportedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sent => write!(f, "sent"),
            Self::Bounced => write!(f, "bounced"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResultPayload {
    pub step_run_id: Uuid,
    #[serde(default)]
    pub status: ReportedStatus,
    pub sent_at: Option<String>,
    pub error: Option<serde_json::Value>,
    pub execution_id: Option<String>,
    pub provider_message_id: Option<String>,
    pub provider_response: Option<serde_json::Value>,
}

impl StepResultPayload {
    fn validate(&self) -> Result<(), ApiError> {
        if self.error.as_ref().is_some_and(|e| !e.is_object()) {
            return Err(ApiError::Validation(
                "error must be a JSON object".to_string(),
            ));
        }
        if self
            .provider_response
            .as_ref()
            .is_some_and(|r| !r.is_object())
        {
            return Err(ApiError::Validation(
                "providerResponse must be a JSON object".to_string(),
            ));
        }
        Ok(())
    }
}

/// Partial update applied to the run row. `None` fields are left untouched,
/// so a retried delivery converges to the same row state.
#[derive(AsChangeset)]
#[diesel(table_name = campaign_step_runs)]
struct StepRunChanges {
    status: String,
    sent_at: Option<DateTime<Utc>>,
    execution_id: Option<String>,
    provider_message_id: Option<String>,
    error_json: Option<serde_json::Value>,
    provider_response: Option<serde_json::Value>,
    updated_at: DateTime<Utc>,
}

pub async fn step_result(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<CampaignStepRun>>, ApiError> {
    let orchestrator = &state.config.orchestrator;
    let Some(secret) = orchestrator.secret.as_deref() else {
        return Err(ApiError::Configuration("webhook secret is not configured"));
    };

    let timestamp = headers.get(TIMESTAMP_HEADER).and_then(|v| v.to_str().ok());
    let provided = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());

    let validation = signature::verify(
        secret,
        timestamp,
        provided,
        &body,
        orchestrator.timestamp_tolerance_secs,
    );
    if !validation.is_valid() {
        warn!("Rejected step-result webhook: {}", validation.error_message());
        return Err(ApiError::Authentication(validation.error_message()));
    }

    let payload: StepResultPayload = serde_json::from_slice(&body)
        .map_err(|e| ApiError::Validation(format!("invalid payload: {e}")))?;
    payload.validate()?;

    let sent_at = payload
        .sent_at
        .as_deref()
        .map(|v| crate::campaigns::parse_datetime("sentAt", v))
        .transpose()?;

    let mut conn = get_conn(&state.conn)?;

    // Runs are looked up by id alone (the orchestrator holds a global shared
    // secret, not a workspace credential); the write is then scoped to the
    // run's own workspace.
    let (run_workspace, run_target, run_step): (Uuid, Uuid, Uuid) = campaign_step_runs::table
        .filter(campaign_step_runs::id.eq(payload.step_run_id))
        .select((
            campaign_step_runs::workspace_id,
            campaign_step_runs::target_id,
            campaign_step_runs::step_id,
        ))
        .first(&mut conn)
        .optional()?
        .ok_or(ApiError::NotFound("step run"))?;

    let changes = StepRunChanges {
        status: payload.status.to_string(),
        sent_at,
        execution_id: payload.execution_id,
        provider_message_id: payload.provider_message_id,
        error_json: payload.error,
        provider_response: payload.provider_response,
        updated_at: Utc::now(),
    };

    let updated: CampaignStepRun = diesel::update(
        campaign_step_runs::table
            .filter(campaign_step_runs::id.eq(payload.step_run_id))
            .filter(campaign_step_runs::workspace_id.eq(run_workspace)),
    )
    .set(&changes)
    .get_result(&mut conn)
    .map_err(|e| match e {
        diesel::result::Error::NotFound => ApiError::NotFound("step run"),
        other => other.into(),
    })?;

    if payload.status == ReportedStatus::Sent {
        advance_target(&mut conn, run_workspace, run_target, run_step)?;
    }

    Ok(Json(ApiResponse::success(updated)))
}

/// Move the target's cursor past the step that was just sent. The assignment
/// is absolute (`step_number + 1`), so reapplying the same report is safe.
fn advance_target(
    conn: &mut DbConn,
    workspace_id: Uuid,
    target_id: Uuid,
    step_id: Uuid,
) -> Result<(), ApiError> {
    let step_number: Option<i32> = campaign_steps::table
        .filter(campaign_steps::id.eq(step_id))
        .select(campaign_steps::step_number)
        .first(conn)
        .optional()?;

    let Some(step_number) = step_number else {
        warn!("Step {step_id} no longer exists; target {target_id} not advanced");
        return Ok(());
    };

    let now = Utc::now();
    diesel::update(
        campaign_targets::table
            .filter(campaign_targets::id.eq(target_id))
            .filter(campaign_targets::workspace_id.eq(workspace_id)),
    )
    .set((
        campaign_targets::next_step_number.eq(step_number + 1),
        campaign_targets::last_attempt_at.eq(now),
        campaign_targets::updated_at.eq(now),
    ))
    .execute(conn)?;

    Ok(())
}

pub fn configure_webhook_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/webhooks/step-result", post(step_result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_defaults_to_sent() {
        let payload: StepResultPayload = serde_json::from_str(
            r#"{"stepRunId": "11111111-1111-1111-1111-111111111111"}"#,
        )
        .unwrap();
        assert_eq!(payload.status, ReportedStatus::Sent);
    }

    #[test]
    fn test_status_enum_closure() {
        for status in ["sent", "bounced", "failed", "skipped"] {
            let raw = format!(
                r#"{{"stepRunId": "11111111-1111-1111-1111-111111111111", "status": "{status}"}}"#
            );
            let payload: StepResultPayload = serde_json::from_str(&raw).unwrap();
            assert_eq!(payload.status.to_string(), status);
        }

        for status in ["queued", "delivered", "SENT", ""] {
            let raw = format!(
                r#"{{"stepRunId": "11111111-1111-1111-1111-111111111111", "status": "{status}"}}"#
            );
            let result: Result<StepResultPayload, _> = serde_json::from_str(&raw);
            assert!(result.is_err(), "status {status:?} should be rejected");
        }
    }

    #[test]
    fn test_step_run_id_is_required() {
        let result: Result<StepResultPayload, _> = serde_json::from_str(r#"{"status": "sent"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_step_run_id_rejected() {
        let result: Result<StepResultPayload, _> =
            serde_json::from_str(r#"{"stepRunId": "run-42"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_error_must_be_object() {
        let payload: StepResultPayload = serde_json::from_str(
            r#"{
                "stepRunId": "11111111-1111-1111-1111-111111111111",
                "error": "provider timed out"
            }"#,
        )
        .unwrap();
        assert!(payload.validate().is_err());

        let payload: StepResultPayload = serde_json::from_str(
            r#"{
                "stepRunId": "11111111-1111-1111-1111-111111111111",
                "error": {"code": "timeout", "attempts": 3}
            }"#,
        )
        .unwrap();
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn test_provider_fields_parse_camel_case() {
        let payload: StepResultPayload = serde_json::from_str(
            r#"{
                "stepRunId": "11111111-1111-1111-1111-111111111111",
                "status": "sent",
                "sentAt": "2026-08-05T10:00:00Z",
                "executionId": "exec-9001",
                "providerMessageId": "SM123",
                "providerResponse": {"sid": "SM123", "price": "-0.0075"}
            }"#,
        )
        .unwrap();
        assert_eq!(payload.execution_id.as_deref(), Some("exec-9001"));
        assert_eq!(payload.provider_message_id.as_deref(), Some("SM123"));
        assert!(payload.provider_response.as_ref().unwrap().is_object());
        assert!(payload.validate().is_ok());
    }
}
