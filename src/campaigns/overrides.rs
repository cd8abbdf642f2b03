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
use crate::shared::schema::campaign_target_overrides;
use crate::shared::state::AppState;
use crate::shared::utils::get_conn;
use crate::shared::workspace::Workspace;

/// A sparse patch for one (target, step) pair. The orchestrator merges
/// `overrides_json` onto the step's template variables before rendering;
/// this service only stores and serves the patch.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = campaign_target_overrides)]
pub struct CampaignTargetOverride {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub campaign_id: Uuid,
    pub target_id: Uuid,
    pub step_id: Uuid,
    pub overrides_json: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOverrideRequest {
    pub target_id: Uuid,
    pub step_id: Uuid,
    pub overrides: Option<serde_json::Value>,
}

pub async fn list_overrides(
    State(state): State<Arc<AppState>>,
    workspace: Workspace,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<CampaignTargetOverride>>>, ApiError> {
    let mut conn = get_conn(&state.conn)?;

    let rows: Vec<CampaignTargetOverride> = campaign_target_overrides::table
        .filter(campaign_target_overrides::workspace_id.eq(workspace.0))
        .filter(campaign_target_overrides::campaign_id.eq(campaign_id))
        .order(campaign_target_overrides::created_at.asc())
        .load(&mut conn)?;

    Ok(Json(ApiResponse::success(rows)))
}

pub async fn create_override(
    State(state): State<Arc<AppState>>,
    workspace: Workspace,
    Path(campaign_id): Path<Uuid>,
    payload: Result<Json<CreateOverrideRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<CampaignTargetOverride>>), ApiError> {
    let req = require_json(payload)?;

    if req.overrides.as_ref().is_some_and(|o| !o.is_object()) {
        return Err(ApiError::Validation(
            "overrides must be a JSON object".to_string(),
        ));
    }

    let mut conn = get_conn(&state.conn)?;

    let already_present: i64 = campaign_target_overrides::table
        .filter(campaign_target_overrides::workspace_id.eq(workspace.0))
        .filter(campaign_target_overrides::target_id.eq(req.target_id))
        .filter(campaign_target_overrides::step_id.eq(req.step_id))
        .count()
        .get_result(&mut conn)?;
    if already_present > 0 {
        return Err(ApiError::Validation(
            "an override already exists for this target and step".to_string(),
        ));
    }

    let now = Utc::now();
    let row = CampaignTargetOverride {
        id: Uuid::new_v4(),
        workspace_id: workspace.0,
        campaign_id,
        target_id: req.target_id,
        step_id: req.step_id,
        overrides_json: req.overrides.unwrap_or_else(|| serde_json::json!({})),
        created_at: now,
        updated_at: now,
    };

    diesel::insert_into(campaign_target_overrides::table)
        .values(&row)
        .execute(&mut conn)?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(row))))
}
