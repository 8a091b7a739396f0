use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// JSON envelope shared by every endpoint.
///
/// Successful calls carry `data`, failures carry `error`. The `success` flag is
/// always present so clients can branch without inspecting the status code.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_omits_error_field() {
        let json = serde_json::to_value(ApiResponse::success(42)).unwrap();
        assert_eq!(json, serde_json::json!({ "success": true, "data": 42 }));
    }

    #[test]
    fn error_omits_data_field() {
        let json = serde_json::to_value(ApiResponse::<()>::error("Unauthorized")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "success": false, "error": "Unauthorized" })
        );
    }

    #[test]
    fn optional_fields_are_optional_in_typescript() {
        let decl = <ApiResponse<i32> as TS>::decl();
        assert!(decl.contains("data?: T"), "{decl}");
        assert!(decl.contains("error?: string"), "{decl}");
    }
}
