use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::require_json;
use crate::shared::error::ApiError;
use crate::shared::response::ApiResponse;
use crate::shared::schema::campaign_steps;
use crate::shared::state::AppState;
use crate::shared::utils::get_conn;
use crate::shared::workspace::Workspace;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = campaign_steps)]
pub struct CampaignStep {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub campaign_id: Uuid,
    pub step_number: i32,
    pub template_id: Option<Uuid>,
    pub wait_after_ms: i32,
    pub condition: serde_json::Value,
    pub branch_label: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStepRequest {
    pub step_number: i32,
    pub template_id: Option<Uuid>,
    pub wait_after_ms: Option<i32>,
    pub condition: Option<serde_json::Value>,
    pub branch_label: Option<String>,
}

impl CreateStepRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.step_number < 1 {
            return Err(ApiError::Validation(
                "stepNumber must be at least 1".to_string(),
            ));
        }
        if self.wait_after_ms.is_some_and(|ms| ms < 0) {
            return Err(ApiError::Validation(
                "waitAfterMs must not be negative".to_string(),
            ));
        }
        if self.condition.as_ref().is_some_and(|c| !c.is_object()) {
            return Err(ApiError::Validation(
                "condition must be a JSON object".to_string(),
            ));
        }
        Ok(())
    }
}

/// Execution-order contract: the orchestrator walks steps in ascending
/// `step_number`, so the listing must never return them out of order.
pub async fn list_steps(
    State(state): State<Arc<AppState>>,
    workspace: Workspace,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<CampaignStep>>>, ApiError> {
    let mut conn = get_conn(&state.conn)?;

    let steps: Vec<CampaignStep> = campaign_steps::table
        .filter(campaign_steps::workspace_id.eq(workspace.0))
        .filter(campaign_steps::campaign_id.eq(campaign_id))
        .order(campaign_steps::step_number.asc())
        .load(&mut conn)?;

    Ok(Json(ApiResponse::success(steps)))
}

pub async fn create_step(
    State(state): State<Arc<AppState>>,
    workspace: Workspace,
    Path(campaign_id): Path<Uuid>,
    payload: Result<Json<CreateStepRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<CampaignStep>>), ApiError> {
    let req = require_json(payload)?;
    req.validate()?;

    let mut conn = get_conn(&state.conn)?;

    let already_taken: i64 = campaign_steps::table
        .filter(campaign_steps::workspace_id.eq(workspace.0))
        .filter(campaign_steps::campaign_id.eq(campaign_id))
        .filter(campaign_steps::step_number.eq(req.step_number))
        .count()
        .get_result(&mut conn)?;
    if already_taken > 0 {
        return Err(ApiError::Validation(format!(
            "stepNumber {} already exists for this campaign",
            req.step_number
        )));
    }

    let now = Utc::now();
    let step = CampaignStep {
        id: Uuid::new_v4(),
        workspace_id: workspace.0,
        campaign_id,
        step_number: req.step_number,
        template_id: req.template_id,
        wait_after_ms: req.wait_after_ms.unwrap_or(0),
        condition: req.condition.unwrap_or_else(|| serde_json::json!({})),
        branch_label: req.branch_label,
        created_at: now,
        updated_at: now,
    };

    diesel::insert_into(campaign_steps::table)
        .values(&step)
        .execute(&mut conn)?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(step))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_request(step_number: i32) -> CreateStepRequest {
        CreateStepRequest {
            step_number,
            template_id: None,
            wait_after_ms: None,
            condition: None,
            branch_label: None,
        }
    }

    #[test]
    fn test_step_number_must_be_positive() {
        assert!(base_request(0).validate().is_err());
        assert!(base_request(-3).validate().is_err());
        assert!(base_request(1).validate().is_ok());
    }

    #[test]
    fn test_wait_after_ms_must_be_non_negative() {
        let mut req = base_request(1);
        req.wait_after_ms = Some(-1);
        assert!(req.validate().is_err());
        req.wait_after_ms = Some(0);
        assert!(req.validate().is_ok());
        req.wait_after_ms = Some(3_600_000);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_condition_must_be_object() {
        let mut req = base_request(1);
        req.condition = Some(serde_json::json!(["not", "an", "object"]));
        assert!(req.validate().is_err());
        req.condition = Some(serde_json::json!({"if": {"field": "state", "eq": "pending"}}));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_request_parses_camel_case() {
        let req: CreateStepRequest = serde_json::from_str(
            r#"{"stepNumber": 2, "waitAfterMs": 3600000, "branchLabel": "no-reply"}"#,
        )
        .unwrap();
        assert_eq!(req.step_number, 2);
        assert_eq!(req.wait_after_ms, Some(3_600_000));
        assert_eq!(req.branch_label.as_deref(), Some("no-reply"));
    }

    #[test]
    fn test_missing_step_number_rejected() {
        let result: Result<CreateStepRequest, _> = serde_json::from_str(r#"{"waitAfterMs": 5}"#);
        assert!(result.is_err());
    }
}
