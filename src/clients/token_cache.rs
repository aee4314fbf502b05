//! 百度 OCR 访问令牌缓存
//!
//! 令牌在进程内复用，过期或被服务方拒绝后按需刷新。

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{ProviderError, ProviderResult};

use super::OCR_SERVICE;

/// 服务方未返回有效期时按 30 天计算
const DEFAULT_EXPIRES_IN_SECS: i64 = 2_592_000;

/// 访问令牌及其过期时间
#[derive(Debug, Clone)]
pub struct Credential {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
    error: Option<String>,
    error_description: Option<String>,
}

/// 令牌缓存
///
/// 并发刷新是允许的：两次刷新都成功时以最后写入的为准。
pub struct TokenCache {
    http: reqwest::Client,
    auth_url: String,
    api_key: Option<String>,
    secret_key: Option<String>,
    timeout: Duration,
    credential: RwLock<Option<Credential>>,
}

impl TokenCache {
    pub fn new(config: &Config, http: reqwest::Client) -> Self {
        Self {
            http,
            auth_url: config.baidu_auth_url.clone(),
            api_key: config.baidu_api_key.clone(),
            secret_key: config.baidu_secret_key.clone(),
            timeout: config.ocr_auth_timeout(),
            credential: RwLock::new(None),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.secret_key.is_some()
    }

    /// 获取可用令牌，没有或已过期时刷新
    pub async fn get_token(&self) -> ProviderResult<String> {
        self.ensure_configured()?;

        if let Some(credential) = self.credential.read().await.as_ref() {
            if !credential.is_expired_at(Utc::now()) {
                return Ok(credential.token.clone());
            }
            debug!("OCR 令牌已于 {} 过期", credential.expires_at);
        }

        self.refresh().await
    }

    /// 强制向服务方申请新令牌
    pub async fn refresh(&self) -> ProviderResult<String> {
        let (api_key, secret_key) = self.ensure_configured()?;

        let response = self
            .http
            .post(&self.auth_url)
            .query(&[
                ("grant_type", "client_credentials"),
                ("client_id", api_key),
                ("client_secret", secret_key),
            ])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(OCR_SERVICE, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::from_reqwest(OCR_SERVICE, e))?;

        let parsed: TokenResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!("获取 OCR 令牌失败，响应无法解析 (状态码 {})", status);
                return Err(ProviderError::upstream(OCR_SERVICE, Some(status.as_u16()), &body));
            }
        };

        if let Some(token) = parsed.access_token {
            let credential = Credential {
                token: token.clone(),
                expires_at: expiry_from(Utc::now(), parsed.expires_in),
            };
            info!("✓ 成功获取百度OCR令牌，有效期至 {}", credential.expires_at);
            *self.credential.write().await = Some(credential);
            return Ok(token);
        }

        let message = parsed
            .error_description
            .or(parsed.error)
            .unwrap_or_else(|| format!("获取token失败: {}", body));
        warn!("获取 OCR 令牌失败: {}", message);
        Err(ProviderError::Upstream {
            service: OCR_SERVICE,
            status: Some(status.as_u16()),
            message,
        })
    }

    /// 丢弃当前令牌，下次调用时重新获取
    pub async fn invalidate(&self) {
        *self.credential.write().await = None;
    }

    pub async fn current(&self) -> Option<Credential> {
        self.credential.read().await.clone()
    }

    #[cfg(test)]
    pub(crate) async fn store(&self, credential: Credential) {
        *self.credential.write().await = Some(credential);
    }

    fn ensure_configured(&self) -> ProviderResult<(&str, &str)> {
        match (self.api_key.as_deref(), self.secret_key.as_deref()) {
            (Some(key), Some(secret)) => Ok((key, secret)),
            _ => Err(ProviderError::NotConfigured {
                service: OCR_SERVICE,
            }),
        }
    }
}

/// 有效期超出时间范围时按默认 30 天计算
fn expiry_from(now: DateTime<Utc>, expires_in: Option<i64>) -> DateTime<Utc> {
    let default_expiry = || now + ChronoDuration::seconds(DEFAULT_EXPIRES_IN_SECS);
    match expires_in {
        Some(secs) => ChronoDuration::try_seconds(secs)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or_else(|| {
                warn!("OCR 令牌有效期无效 ({} 秒)，按默认值处理", secs);
                default_expiry()
            }),
        None => default_expiry(),
    }
}
