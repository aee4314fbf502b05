use thiserror::Error;

use crate::utils::truncate_text;
use crate::workflow::Stage;

/// 外部服务调用错误
///
/// 按失败类型区分，调用方根据类型判断是否重试，而不是匹配错误文本。
#[derive(Debug, Error)]
pub enum ProviderError {
    /// 缺少密钥，重新部署前不会恢复
    #[error("{service} API密钥未配置")]
    NotConfigured { service: &'static str },

    #[error("图片文件为空")]
    EmptyInput,

    /// 编码后的图片过小，通常是损坏的文件
    #[error("图片文件过小或无效")]
    InvalidImage,

    #[error("{service} 请求超时，请稍后重试")]
    Timeout { service: &'static str },

    #[error("无法连接到 {service}，请检查网络连接: {message}")]
    Connection {
        service: &'static str,
        message: String,
    },

    /// 服务方拒绝了访问令牌
    #[error("{service} 令牌无效 (错误码 {code}): {message}")]
    Auth {
        service: &'static str,
        code: i64,
        message: String,
    },

    #[error("{service} 请求频率限制: {message}")]
    RateLimited {
        service: &'static str,
        message: String,
    },

    /// 服务方返回了错误码或没有可用文字
    #[error("OCR识别失败: {message}")]
    Recognition { message: String },

    #[error("{service} 请求构建失败: {message}")]
    InvalidRequest {
        service: &'static str,
        message: String,
    },

    #[error("{service} 返回错误{}: {message}", status_suffix(.status))]
    Upstream {
        service: &'static str,
        status: Option<u16>,
        message: String,
    },
}

impl ProviderError {
    /// 将 reqwest 错误归类
    pub fn from_reqwest(service: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout { service }
        } else if err.is_decode() {
            ProviderError::Upstream {
                service,
                status: err.status().map(|s| s.as_u16()),
                message: format!("响应解析失败: {}", err),
            }
        } else if let Some(status) = err.status() {
            ProviderError::Upstream {
                service,
                status: Some(status.as_u16()),
                message: err.to_string(),
            }
        } else {
            ProviderError::Connection {
                service,
                message: err.to_string(),
            }
        }
    }

    pub fn upstream(service: &'static str, status: Option<u16>, body: &str) -> Self {
        ProviderError::Upstream {
            service,
            status,
            message: truncate_text(body.trim(), 300),
        }
    }

    /// 瞬时故障：超时、连接失败、限流、令牌失效
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Timeout { .. }
                | ProviderError::Connection { .. }
                | ProviderError::RateLimited { .. }
                | ProviderError::Auth { .. }
        )
    }

    pub fn is_not_configured(&self) -> bool {
        matches!(self, ProviderError::NotConfigured { .. })
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (状态码 {})", s)).unwrap_or_default()
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// 请求级错误，决定 HTTP 状态码
#[derive(Debug, Error)]
pub enum AppError {
    /// 客户端输入错误 (400)
    #[error("{0}")]
    Validation(String),

    /// 依赖服务未配置 (503)
    #[error("{0}服务未配置")]
    NotConfigured(&'static str),

    /// OCR 结果过短 (400)
    #[error("图片中未识别到有效文字，请上传清晰的作业图片")]
    UnreadableText,

    /// 外部服务失败 (500)
    #[error("{source}")]
    Provider {
        stage: Stage,
        #[source]
        source: ProviderError,
    },

    /// 临时文件读写失败 (500)
    #[error("临时文件处理失败: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn provider(stage: Stage, source: ProviderError) -> Self {
        match source {
            ProviderError::NotConfigured { service } => AppError::NotConfigured(service),
            source => AppError::Provider { stage, source },
        }
    }

    /// 属于客户端问题，不是服务端故障
    pub fn is_client_error(&self) -> bool {
        matches!(self, AppError::Validation(_) | AppError::UnreadableText)
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_message_includes_status() {
        let err = ProviderError::upstream("DeepSeek", Some(500), "  boom  ");
        assert_eq!(err.to_string(), "DeepSeek 返回错误 (状态码 500): boom");

        let err = ProviderError::upstream("DeepSeek", None, "bad");
        assert_eq!(err.to_string(), "DeepSeek 返回错误: bad");
    }

    #[test]
    fn test_transient_kinds() {
        assert!(ProviderError::Timeout { service: "x" }.is_transient());
        assert!(ProviderError::RateLimited {
            service: "x",
            message: String::new()
        }
        .is_transient());
        assert!(!ProviderError::EmptyInput.is_transient());
        assert!(!ProviderError::Recognition {
            message: String::new()
        }
        .is_transient());
    }

    #[test]
    fn test_not_configured_provider_error_maps_to_app_not_configured() {
        let err = AppError::provider(
            Stage::Recognizing,
            ProviderError::NotConfigured { service: "百度OCR" },
        );
        assert!(matches!(err, AppError::NotConfigured("百度OCR")));
        assert_eq!(err.to_string(), "百度OCR服务未配置");
    }
}
