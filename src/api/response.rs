//! JSON 响应封装
//!
//! 成功：`{"success": true, "message": ..., "data": ...}`
//! 失败：`{"success": false, "error": ..., "suggestion"?: ...}`

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use tracing::{error, warn};

use crate::error::AppError;

/// 处理失败时给用户的建议
pub const RETRY_SUGGESTION: &str = "请检查网络连接或稍后重试";

/// 成功响应
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

pub fn success<T: Serialize>(message: impl Into<String>, data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        message: message.into(),
        data,
    })
}

/// 本地时间，不带时区，与 Python `datetime.isoformat()` 格式一致
pub fn local_timestamp() -> String {
    chrono::Local::now()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

/// 接口错误
#[derive(Debug, Clone)]
#[must_use = "errors do nothing unless returned"]
pub struct ApiError {
    status: StatusCode,
    message: String,
    suggestion: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn with_suggestion(self, suggestion: impl Into<String>) -> Self {
        Self {
            suggestion: Some(suggestion.into()),
            ..self
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// 按错误类型选择状态码，服务端故障的信息加上前缀
    pub fn from_app_error(err: AppError, failure_prefix: &str) -> Self {
        match &err {
            AppError::Validation(_) | AppError::UnreadableText => {
                warn!("⚠️ 请求被拒绝: {}", err);
                Self::bad_request(err.to_string())
            }
            AppError::NotConfigured(_) => {
                warn!("⚠️ {}", err);
                Self::new(StatusCode::SERVICE_UNAVAILABLE, err.to_string())
            }
            AppError::Provider { stage, .. } => {
                error!("❌ {}阶段失败: {}", stage, err);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("{}: {}", failure_prefix, err),
                )
            }
            AppError::Io(_) => {
                error!("❌ {}", err);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("{}: {}", failure_prefix, err),
                )
            }
        }
    }
}

/// 作业处理接口的错误转换：服务端故障附带重试建议
impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let server_side = !err.is_client_error() && !matches!(err, AppError::NotConfigured(_));
        let api_error = Self::from_app_error(err, "处理失败");
        if server_side {
            api_error.with_suggestion(RETRY_SUGGESTION)
        } else {
            api_error
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.suggestion {
            Some(suggestion) => json!({
                "success": false,
                "error": self.message,
                "suggestion": suggestion,
            }),
            None => json!({
                "success": false,
                "error": self.message,
            }),
        };
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::workflow::Stage;

    #[test]
    fn test_provider_failure_maps_to_500_with_suggestion() {
        let err = AppError::provider(
            Stage::Analyzing,
            ProviderError::Timeout {
                service: "DeepSeek",
            },
        );
        let api_error = ApiError::from(err);
        assert_eq!(api_error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api_error.message(), "处理失败: DeepSeek 请求超时，请稍后重试");
        assert_eq!(api_error.suggestion.as_deref(), Some(RETRY_SUGGESTION));
    }

    #[test]
    fn test_client_errors_have_no_suggestion() {
        let api_error = ApiError::from(AppError::UnreadableText);
        assert_eq!(api_error.status(), StatusCode::BAD_REQUEST);
        assert!(api_error.suggestion.is_none());

        let api_error = ApiError::from(AppError::NotConfigured("百度OCR"));
        assert_eq!(api_error.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(api_error.message(), "百度OCR服务未配置");
    }

    #[test]
    fn test_custom_prefix_for_diagnostic_endpoints() {
        let err = AppError::provider(
            Stage::Recognizing,
            ProviderError::Recognition {
                message: "image size error (错误码 216202)".to_string(),
            },
        );
        let api_error = ApiError::from_app_error(err, "OCR测试失败");
        assert_eq!(
            api_error.message(),
            "OCR测试失败: OCR识别失败: image size error (错误码 216202)"
        );
    }

    #[test]
    fn test_timestamp_has_no_offset() {
        let ts = local_timestamp();
        assert_eq!(ts.len(), "2024-01-01T00:00:00.000000".len());
        assert!(!ts.ends_with('Z'));
    }
}
