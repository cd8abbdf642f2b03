use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope_shape() {
        let body =
            serde_json::to_value(ApiResponse::success(serde_json::json!({"id": 1}))).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["id"], 1);
        assert!(body.get("error").is_none());
    }

    #[test]
    fn test_error_envelope_shape() {
        let body =
            serde_json::to_value(ApiResponse::<serde_json::Value>::error("bad input")).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "bad input");
        assert!(body.get("data").is_none());
    }
}
