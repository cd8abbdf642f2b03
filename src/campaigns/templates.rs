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
use crate::shared::schema::campaign_templates;
use crate::shared::state::AppState;
use crate::shared::utils::get_conn;
use crate::shared::workspace::Workspace;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = campaign_templates)]
pub struct CampaignTemplate {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub campaign_id: Uuid,
    pub channel: String,
    pub name: String,
    pub variables_schema: serde_json::Value,
    pub subject_template: Option<String>,
    pub body_template: Option<String>,
    pub provider_metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTemplateRequest {
    pub channel: String,
    pub name: String,
    pub variables_schema: Option<serde_json::Value>,
    pub subject_template: Option<String>,
    pub body_template: Option<String>,
    pub provider_metadata: Option<serde_json::Value>,
}

pub async fn list_templates(
    State(state): State<Arc<AppState>>,
    workspace: Workspace,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<CampaignTemplate>>>, ApiError> {
    let mut conn = get_conn(&state.conn)?;

    let rows: Vec<CampaignTemplate> = campaign_templates::table
        .filter(campaign_templates::workspace_id.eq(workspace.0))
        .filter(campaign_templates::campaign_id.eq(campaign_id))
        .order(campaign_templates::name.asc())
        .load(&mut conn)?;

    Ok(Json(ApiResponse::success(rows)))
}

pub async fn create_template(
    State(state): State<Arc<AppState>>,
    workspace: Workspace,
    Path(campaign_id): Path<Uuid>,
    payload: Result<Json<CreateTemplateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<CampaignTemplate>>), ApiError> {
    let req = require_json(payload)?;

    if req.channel.trim().is_empty() {
        return Err(ApiError::Validation("channel is required".to_string()));
    }
    if req.name.trim().is_empty() {
        return Err(ApiError::Validation("name is required".to_string()));
    }

    let now = Utc::now();
    let template = CampaignTemplate {
        id: Uuid::new_v4(),
        workspace_id: workspace.0,
        campaign_id,
        channel: req.channel,
        name: req.name,
        variables_schema: req.variables_schema.unwrap_or_else(|| serde_json::json!({})),
        subject_template: req.subject_template,
        body_template: req.body_template,
        provider_metadata: req.provider_metadata.unwrap_or_else(|| serde_json::json!({})),
        created_at: now,
        updated_at: now,
    };

    let mut conn = get_conn(&state.conn)?;
    diesel::insert_into(campaign_templates::table)
        .values(&template)
        .execute(&mut conn)?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(template))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_requires_channel_and_name() {
        let result: Result<CreateTemplateRequest, _> =
            serde_json::from_str(r#"{"channel": "sms"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_request_parses_template_bodies() {
        let req: CreateTemplateRequest = serde_json::from_str(
            r#"{
                "channel": "email",
                "name": "Renewal reminder",
                "subjectTemplate": "Your policy renews soon",
                "bodyTemplate": "Hi {{first_name}}, ..."
            }"#,
        )
        .unwrap();
        assert_eq!(req.channel, "email");
        assert!(req.body_template.unwrap().contains("{{first_name}}"));
    }
}
