use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
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
use crate::shared::schema::campaign_targets;
use crate::shared::state::AppState;
use crate::shared::utils::get_conn;
use crate::shared::workspace::Workspace;

pub const INITIAL_TARGET_STATE: &str = "pending";
pub const INITIAL_STEP_NUMBER: i32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = campaign_targets)]
pub struct CampaignTarget {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub campaign_id: Uuid,
    pub opportunity_id: Uuid,
    pub contact_id: Option<Uuid>,
    pub account_id: Option<Uuid>,
    pub state: String,
    pub next_step_number: i32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub assigned_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignTargetRequest {
    pub opportunity_id: Uuid,
    pub contact_id: Option<Uuid>,
    pub account_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct TargetListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_targets(
    State(state): State<Arc<AppState>>,
    workspace: Workspace,
    Path(campaign_id): Path<Uuid>,
    Query(query): Query<TargetListQuery>,
) -> Result<Json<ApiResponse<Vec<CampaignTarget>>>, ApiError> {
    let mut conn = get_conn(&state.conn)?;

    let mut q = campaign_targets::table
        .filter(campaign_targets::workspace_id.eq(workspace.0))
        .filter(campaign_targets::campaign_id.eq(campaign_id))
        .order(campaign_targets::assigned_at.desc())
        .into_boxed();

    // Pagination is opt-in: a caller-supplied limit or a configured default.
    if let Some(limit) = query.limit.or(state.config.default_page_size) {
        q = q.limit(limit);
    }
    if let Some(offset) = query.offset {
        q = q.offset(offset);
    }

    let targets: Vec<CampaignTarget> = q.load(&mut conn)?;

    Ok(Json(ApiResponse::success(targets)))
}

/// Enroll an opportunity into the campaign's step sequence. New targets start
/// at step 1 in the pending state; the orchestrator moves them from there.
pub async fn create_target(
    State(state): State<Arc<AppState>>,
    workspace: Workspace,
    Path(campaign_id): Path<Uuid>,
    payload: Result<Json<AssignTargetRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<CampaignTarget>>), ApiError> {
    let req = require_json(payload)?;

    let now = Utc::now();
    let target = CampaignTarget {
        id: Uuid::new_v4(),
        workspace_id: workspace.0,
        campaign_id,
        opportunity_id: req.opportunity_id,
        contact_id: req.contact_id,
        account_id: req.account_id,
        state: INITIAL_TARGET_STATE.to_string(),
        next_step_number: INITIAL_STEP_NUMBER,
        last_attempt_at: None,
        assigned_at: now,
        created_at: now,
        updated_at: now,
    };

    let mut conn = get_conn(&state.conn)?;
    diesel::insert_into(campaign_targets::table)
        .values(&target)
        .execute(&mut conn)?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(target))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_requires_opportunity_id() {
        let result: Result<AssignTargetRequest, _> =
            serde_json::from_str(r#"{"contactId": "11111111-1111-1111-1111-111111111111"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_request_rejects_malformed_uuid() {
        let result: Result<AssignTargetRequest, _> =
            serde_json::from_str(r#"{"opportunityId": "not-a-uuid"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_request_parses_optional_participants() {
        let req: AssignTargetRequest = serde_json::from_str(
            r#"{
                "opportunityId": "11111111-1111-1111-1111-111111111111",
                "accountId": "22222222-2222-2222-2222-222222222222"
            }"#,
        )
        .unwrap();
        assert!(req.contact_id.is_none());
        assert!(req.account_id.is_some());
    }

    #[test]
    fn test_new_target_starts_pending_at_step_one() {
        let now = Utc::now();
        let target = CampaignTarget {
            id: Uuid::new_v4(),
            workspace_id: Uuid::new_v4(),
            campaign_id: Uuid::new_v4(),
            opportunity_id: Uuid::new_v4(),
            contact_id: None,
            account_id: None,
            state: INITIAL_TARGET_STATE.to_string(),
            next_step_number: INITIAL_STEP_NUMBER,
            last_attempt_at: None,
            assigned_at: now,
            created_at: now,
            updated_at: now,
        };
        let body = serde_json::to_value(&target).unwrap();
        assert_eq!(body["state"], "pending");
        assert_eq!(body["next_step_number"], 1);
    }
}
