use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::warn;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::require_json;
use crate::security::signature;
use crate::shared::error::ApiError;
use crate::shared::response::ApiResponse;
use crate::shared::schema::campaign_step_runs;
use crate::shared::state::AppState;
use crate::shared::utils::get_conn;
use crate::shared::workspace::Workspace;

pub const RUN_STATUS_QUEUED: &str = "queued";

/// One recorded attempt to execute a step for a target. Created here when a
/// job is handed to the orchestrator; mutated by the step-result webhook.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = campaign_step_runs)]
pub struct CampaignStepRun {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub campaign_id: Uuid,
    pub target_id: Uuid,
    pub step_id: Uuid,
    pub channel: String,
    pub resolved_payload: serde_json::Value,
    pub provider_response: serde_json::Value,
    pub status: String,
    pub provider_message_id: Option<String>,
    pub execution_id: Option<String>,
    pub error_json: serde_json::Value,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueRequest {
    pub step_id: Uuid,
    pub target_id: Uuid,
    pub channel: String,
    pub payload: Option<serde_json::Value>,
    pub overrides: Option<serde_json::Value>,
    pub idempotency_key: Option<String>,
}

impl EnqueueRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.channel.trim().is_empty() {
            return Err(ApiError::Validation("channel is required".to_string()));
        }
        if self.payload.as_ref().is_some_and(|p| !p.is_object()) {
            return Err(ApiError::Validation(
                "payload must be a JSON object".to_string(),
            ));
        }
        if self.overrides.as_ref().is_some_and(|o| !o.is_object()) {
            return Err(ApiError::Validation(
                "overrides must be a JSON object".to_string(),
            ));
        }
        if self.idempotency_key.as_ref().is_some_and(|k| k.len() < 10) {
            return Err(ApiError::Validation(
                "idempotencyKey must be at least 10 characters".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct EnqueueResult {
    pub step_run: CampaignStepRun,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orchestrator: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Persist a queued step run and hand the job to the orchestrator. The run is
/// stored before dispatch so a failed handoff leaves an auditable queued row;
/// the outbound request carries the same HMAC scheme the step-result webhook
/// verifies.
pub async fn enqueue_step(
    State(state): State<Arc<AppState>>,
    workspace: Workspace,
    Path(campaign_id): Path<Uuid>,
    payload: Result<Json<EnqueueRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<EnqueueResult>>), ApiError> {
    let req = require_json(payload)?;
    req.validate()?;

    let orchestrator = &state.config.orchestrator;
    let (Some(url), Some(secret)) = (
        orchestrator.url.as_deref(),
        orchestrator.secret.as_deref(),
    ) else {
        return Err(ApiError::Configuration(
            "orchestrator webhook url or secret is not configured",
        ));
    };

    let now = Utc::now();
    let run = CampaignStepRun {
        id: Uuid::new_v4(),
        workspace_id: workspace.0,
        campaign_id,
        target_id: req.target_id,
        step_id: req.step_id,
        channel: req.channel.clone(),
        resolved_payload: req.payload.clone().unwrap_or_else(|| serde_json::json!({})),
        provider_response: serde_json::json!({}),
        status: RUN_STATUS_QUEUED.to_string(),
        provider_message_id: None,
        execution_id: None,
        error_json: serde_json::json!({}),
        sent_at: None,
        created_at: now,
        updated_at: now,
    };

    {
        let mut conn = get_conn(&state.conn)?;
        diesel::insert_into(campaign_step_runs::table)
            .values(&run)
            .execute(&mut conn)?;
    }

    let idempotency_key = req
        .idempotency_key
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let timestamp = now.timestamp_millis().to_string();
    let outbound = serde_json::json!({
        "campaignId": campaign_id,
        "stepId": req.step_id,
        "targetId": req.target_id,
        "channel": req.channel,
        "payload": req.payload.unwrap_or_else(|| serde_json::json!({})),
        "overrides": req.overrides.unwrap_or_else(|| serde_json::json!({})),
        "stepRunId": run.id,
        "idempotencyKey": idempotency_key,
    })
    .to_string();
    let outbound_signature = signature::sign(secret, &timestamp, outbound.as_bytes());

    let dispatch = state
        .http
        .post(url)
        .header("Content-Type", "application/json")
        .header("X-Timestamp", timestamp)
        .header("X-Idempotency-Key", idempotency_key)
        .header("X-Signature", outbound_signature)
        .body(outbound)
        .send()
        .await;

    match dispatch {
        Ok(response) if response.status().is_success() => {
            let echo = response.json().await.unwrap_or(serde_json::json!({}));
            Ok((
                StatusCode::CREATED,
                Json(ApiResponse::success(EnqueueResult {
                    step_run: run,
                    orchestrator: Some(echo),
                    warning: None,
                })),
            ))
        }
        Ok(response) => {
            warn!(
                "Orchestrator returned {} for step run {}",
                response.status(),
                run.id
            );
            Ok((
                StatusCode::ACCEPTED,
                Json(ApiResponse::success(EnqueueResult {
                    step_run: run,
                    orchestrator: None,
                    warning: Some("orchestrator returned non-2xx".to_string()),
                })),
            ))
        }
        Err(e) => {
            warn!("Orchestrator dispatch failed for step run {}: {e}", run.id);
            Ok((
                StatusCode::ACCEPTED,
                Json(ApiResponse::success(EnqueueResult {
                    step_run: run,
                    orchestrator: None,
                    warning: Some("orchestrator unreachable".to_string()),
                })),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_request() -> EnqueueRequest {
        EnqueueRequest {
            step_id: Uuid::new_v4(),
            target_id: Uuid::new_v4(),
            channel: "sms".to_string(),
            payload: None,
            overrides: None,
            idempotency_key: None,
        }
    }

    #[test]
    fn test_channel_must_be_non_empty() {
        let mut req = base_request();
        req.channel = "  ".to_string();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_short_idempotency_key_rejected() {
        let mut req = base_request();
        req.idempotency_key = Some("short".to_string());
        assert!(req.validate().is_err());
        req.idempotency_key = Some("long-enough-key".to_string());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_payload_must_be_object() {
        let mut req = base_request();
        req.payload = Some(serde_json::json!("plain string"));
        assert!(req.validate().is_err());
        req.payload = Some(serde_json::json!({"body": "hello"}));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_outbound_body_is_signed_over_exact_bytes() {
        // The dispatched signature must verify against the exact serialized
        // body, matching what the orchestrator recomputes on its side.
        let body = serde_json::json!({"stepRunId": "abc"}).to_string();
        let timestamp = Utc::now().timestamp_millis().to_string();
        let signed = signature::sign("secret", &timestamp, body.as_bytes());
        assert!(signature::verify(
            "secret",
            Some(&timestamp),
            Some(&signed),
            body.as_bytes(),
            300,
        )
        .is_valid());
    }
}
