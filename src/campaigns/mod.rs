pub mod enqueue;
pub mod overrides;
pub mod steps;
pub mod targets;
pub mod templates;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::shared::error::ApiError;
use crate::shared::response::ApiResponse;
use crate::shared::schema::campaigns;
use crate::shared::state::AppState;
use crate::shared::utils::get_conn;
use crate::shared::workspace::Workspace;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = campaigns)]
pub struct Campaign {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub campaign_type: String,
    pub objective: Option<String>,
    pub status: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub total_targeted: i32,
    pub total_sent: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Active => write!(f, "active"),
            Self::Paused => write!(f, "paused"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignType {
    Email,
    Sms,
    Phone,
    Social,
    DirectMail,
    MultiChannel,
    AiAutomated,
    AiNurture,
    OnHold,
    Reengagement,
}

impl std::fmt::Display for CampaignType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Email => write!(f, "email"),
            Self::Sms => write!(f, "sms"),
            Self::Phone => write!(f, "phone"),
            Self::Social => write!(f, "social"),
            Self::DirectMail => write!(f, "direct_mail"),
            Self::MultiChannel => write!(f, "multi_channel"),
            Self::AiAutomated => write!(f, "ai_automated"),
            Self::AiNurture => write!(f, "ai_nurture"),
            Self::OnHold => write!(f, "on_hold"),
            Self::Reengagement => write!(f, "reengagement"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCampaignRequest {
    pub name: String,
    pub campaign_type: Option<CampaignType>,
    pub objective: Option<String>,
    pub description: Option<String>,
    pub status: Option<CampaignStatus>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: CampaignStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignListQuery {
    pub search: Option<String>,
    pub status: Option<CampaignStatus>,
    pub campaign_type: Option<CampaignType>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CampaignList {
    pub items: Vec<Campaign>,
    pub total_count: i64,
}

pub(crate) fn parse_datetime(field: &str, value: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(value)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|_| ApiError::Validation(format!("invalid {field}: expected RFC 3339 datetime")))
}

pub(crate) fn require_json<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err(ApiError::Validation(rejection.body_text())),
    }
}

pub async fn list_campaigns(
    State(state): State<Arc<AppState>>,
    workspace: Workspace,
    Query(query): Query<CampaignListQuery>,
) -> Result<Json<ApiResponse<CampaignList>>, ApiError> {
    let mut conn = get_conn(&state.conn)?;

    let limit = query
        .limit
        .or(state.config.default_page_size)
        .unwrap_or(50);
    let offset = query.offset.unwrap_or(0);

    let mut q = campaigns::table
        .filter(campaigns::workspace_id.eq(workspace.0))
        .into_boxed();
    let mut count_q = campaigns::table
        .filter(campaigns::workspace_id.eq(workspace.0))
        .count()
        .into_boxed();

    if let Some(search) = &query.search {
        let pattern = format!("%{search}%");
        q = q.filter(campaigns::name.ilike(pattern.clone()));
        count_q = count_q.filter(campaigns::name.ilike(pattern));
    }
    if let Some(status) = query.status {
        q = q.filter(campaigns::status.eq(status.to_string()));
        count_q = count_q.filter(campaigns::status.eq(status.to_string()));
    }
    if let Some(campaign_type) = query.campaign_type {
        q = q.filter(campaigns::campaign_type.eq(campaign_type.to_string()));
        count_q = count_q.filter(campaigns::campaign_type.eq(campaign_type.to_string()));
    }

    let items: Vec<Campaign> = q
        .order(campaigns::created_at.desc())
        .limit(limit)
        .offset(offset)
        .load(&mut conn)?;
    let total_count: i64 = count_q.get_result(&mut conn)?;

    Ok(Json(ApiResponse::success(CampaignList {
        items,
        total_count,
    })))
}

pub async fn create_campaign(
    State(state): State<Arc<AppState>>,
    workspace: Workspace,
    payload: Result<Json<CreateCampaignRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Campaign>>), ApiError> {
    let req = require_json(payload)?;

    if req.name.trim().is_empty() {
        return Err(ApiError::Validation("name is required".to_string()));
    }

    let start_date = req
        .start_date
        .as_deref()
        .map(|d| parse_datetime("startDate", d))
        .transpose()?;
    let end_date = req
        .end_date
        .as_deref()
        .map(|d| parse_datetime("endDate", d))
        .transpose()?;

    let now = Utc::now();
    let campaign = Campaign {
        id: Uuid::new_v4(),
        workspace_id: workspace.0,
        name: req.name,
        description: req.description,
        campaign_type: req
            .campaign_type
            .unwrap_or(CampaignType::MultiChannel)
            .to_string(),
        objective: req.objective,
        status: req.status.unwrap_or(CampaignStatus::Draft).to_string(),
        start_date,
        end_date,
        total_targeted: 0,
        total_sent: 0,
        created_at: now,
        updated_at: now,
    };

    let mut conn = get_conn(&state.conn)?;
    diesel::insert_into(campaigns::table)
        .values(&campaign)
        .execute(&mut conn)?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(campaign))))
}

pub async fn get_campaign(
    State(state): State<Arc<AppState>>,
    workspace: Workspace,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Campaign>>, ApiError> {
    let mut conn = get_conn(&state.conn)?;

    let campaign: Campaign = campaigns::table
        .filter(campaigns::workspace_id.eq(workspace.0))
        .filter(campaigns::id.eq(id))
        .first(&mut conn)
        .map_err(|_| ApiError::NotFound("campaign"))?;

    Ok(Json(ApiResponse::success(campaign)))
}

pub async fn change_campaign_status(
    State(state): State<Arc<AppState>>,
    workspace: Workspace,
    Path(id): Path<Uuid>,
    payload: Result<Json<ChangeStatusRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Campaign>>, ApiError> {
    let req = require_json(payload)?;
    let mut conn = get_conn(&state.conn)?;

    let updated: Campaign = diesel::update(
        campaigns::table
            .filter(campaigns::workspace_id.eq(workspace.0))
            .filter(campaigns::id.eq(id)),
    )
    .set((
        campaigns::status.eq(req.status.to_string()),
        campaigns::updated_at.eq(Utc::now()),
    ))
    .get_result(&mut conn)
    .map_err(|e| match e {
        diesel::result::Error::NotFound => ApiError::NotFound("campaign"),
        other => other.into(),
    })?;

    Ok(Json(ApiResponse::success(updated)))
}

pub fn configure_campaign_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/campaigns", get(list_campaigns).post(create_campaign))
        .route("/api/campaigns/:id", get(get_campaign))
        .route("/api/campaigns/:id/status", put(change_campaign_status))
        .route(
            "/api/campaigns/:id/templates",
            get(templates::list_templates).post(templates::create_template),
        )
        .route(
            "/api/campaigns/:id/steps",
            get(steps::list_steps).post(steps::create_step),
        )
        .route(
            "/api/campaigns/:id/targets",
            get(targets::list_targets).post(targets::create_target),
        )
        .route(
            "/api/campaigns/:id/overrides",
            get(overrides::list_overrides).post(overrides::create_override),
        )
        .route("/api/campaigns/:id/enqueue", post(enqueue::enqueue_step))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_campaign_status_round_trip() {
        for status in [
            CampaignStatus::Draft,
            CampaignStatus::Active,
            CampaignStatus::Paused,
            CampaignStatus::Completed,
            CampaignStatus::Cancelled,
        ] {
            let text = serde_json::to_string(&status).unwrap();
            assert_eq!(text.trim_matches('"'), status.to_string());
        }
    }

    #[test]
    fn test_unknown_status_rejected() {
        let result: Result<ChangeStatusRequest, _> =
            serde_json::from_str(r#"{"status":"archived"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_create_request_defaults() {
        let req: CreateCampaignRequest =
            serde_json::from_str(r#"{"name":"Spring renewal push"}"#).unwrap();
        assert!(req.campaign_type.is_none());
        assert!(req.status.is_none());
    }

    #[test]
    fn test_parse_datetime_rejects_garbage() {
        assert!(parse_datetime("startDate", "tomorrow").is_err());
        assert!(parse_datetime("startDate", "2026-08-05T10:00:00Z").is_ok());
    }
}
