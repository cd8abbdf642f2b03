use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::shared::error::ApiError;

pub const WORKSPACE_HEADER: &str = "x-workspace-id";

/// Tenant context for a request. The fronting auth layer resolves the session
/// to a workspace and forwards it in the `x-workspace-id` header; every query
/// must filter on this id in addition to entity ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Workspace(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for Workspace
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(WORKSPACE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Authentication("missing workspace context"))?;

        let id = Uuid::parse_str(raw)
            .map_err(|_| ApiError::Authentication("invalid workspace context"))?;

        if id.is_nil() {
            return Err(ApiError::Authentication("invalid workspace context"));
        }

        Ok(Workspace(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header: Option<&str>) -> Result<Workspace, ApiError> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(WORKSPACE_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        Workspace::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_valid_workspace_header() {
        let ws = extract(Some("550e8400-e29b-41d4-a716-446655440000"))
            .await
            .unwrap();
        assert_eq!(
            ws.0,
            Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap()
        );
    }

    #[tokio::test]
    async fn test_missing_header_rejected() {
        assert!(matches!(
            extract(None).await,
            Err(ApiError::Authentication(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_header_rejected() {
        assert!(matches!(
            extract(Some("not-a-uuid")).await,
            Err(ApiError::Authentication(_))
        ));
    }

    #[tokio::test]
    async fn test_nil_workspace_rejected() {
        assert!(matches!(
            extract(Some("00000000-0000-0000-0000-000000000000")).await,
            Err(ApiError::Authentication(_))
        ));
    }
}
