//! 百度 OCR 客户端
//!
//! 通用文字识别接口：图片 base64 编码后以表单提交，访问令牌放在查询参数里。

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{ProviderError, ProviderResult};
use crate::models::RecognizedText;
use crate::retry::RetryPolicy;

use super::token_cache::TokenCache;
use super::OCR_SERVICE;

/// 令牌无效 / 令牌过期
const AUTH_ERROR_CODES: [i64; 2] = [110, 111];

/// base64 长度低于此值的图片视为损坏
const MIN_ENCODED_LEN: usize = 100;

#[derive(Debug, Deserialize)]
struct OcrResponse {
    error_code: Option<i64>,
    error_msg: Option<String>,
    words_result: Option<Vec<WordsLine>>,
}

#[derive(Debug, Deserialize)]
struct WordsLine {
    words: String,
}

/// 令牌失效时立即重试（下一次尝试会先刷新令牌），其余可重试错误等待 1 个单位
fn ocr_delay(error: &ProviderError, _attempt: u32) -> u32 {
    match error {
        ProviderError::Auth { .. } => 0,
        _ => 1,
    }
}

/// 服务方明确返回的识别错误和输入错误不重试
fn ocr_retryable(error: &ProviderError) -> bool {
    matches!(
        error,
        ProviderError::Timeout { .. }
            | ProviderError::Connection { .. }
            | ProviderError::Auth { .. }
            | ProviderError::Upstream { .. }
    )
}

/// OCR 客户端
pub struct OcrClient {
    http: reqwest::Client,
    ocr_url: String,
    timeout: Duration,
    tokens: TokenCache,
    retry: RetryPolicy,
}

impl OcrClient {
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::new();
        Self {
            tokens: TokenCache::new(config, http.clone()),
            http,
            ocr_url: config.baidu_ocr_url.clone(),
            timeout: config.ocr_timeout(),
            retry: RetryPolicy::new(
                config.retry_attempts,
                config.retry_delay_unit(),
                ocr_delay,
                ocr_retryable,
            ),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.tokens.is_configured()
    }

    pub fn tokens(&self) -> &TokenCache {
        &self.tokens
    }

    /// 识别图片文字，使用默认尝试次数
    pub async fn recognize(&self, image: &[u8]) -> ProviderResult<RecognizedText> {
        self.recognize_with_attempts(image, self.retry.max_attempts())
            .await
    }

    /// 读取磁盘上的图片并识别
    pub async fn recognize_file(&self, path: &Path, max_attempts: u32) -> ProviderResult<RecognizedText> {
        let image = tokio::fs::read(path).await.map_err(|e| ProviderError::Upstream {
            service: OCR_SERVICE,
            status: None,
            message: format!("读取图片失败 ({}): {}", path.display(), e),
        })?;
        self.recognize_with_attempts(&image, max_attempts).await
    }

    /// 识别图片文字
    ///
    /// 令牌失效和其他重试共用同一个尝试次数上限。
    pub async fn recognize_with_attempts(
        &self,
        image: &[u8],
        max_attempts: u32,
    ) -> ProviderResult<RecognizedText> {
        if !self.is_configured() {
            return Err(ProviderError::NotConfigured {
                service: OCR_SERVICE,
            });
        }

        let encoded = encode_image(image)?;
        debug!("图片大小: {} 字节，编码后: {} 字符", image.len(), encoded.len());

        let policy = self.retry.with_max_attempts(max_attempts);
        let text = policy
            .run("OCR识别", |attempt| self.recognize_once(&encoded, attempt))
            .await?;

        info!("OCR识别成功，识别到{}个字符", text.char_count());
        Ok(text)
    }

    async fn recognize_once(&self, encoded: &str, attempt: u32) -> ProviderResult<RecognizedText> {
        let token = self.tokens.get_token().await?;
        debug!("调用百度OCR (尝试 {})", attempt);

        let response = self
            .http
            .post(&self.ocr_url)
            .query(&[("access_token", token.as_str())])
            .form(&[("image", encoded)])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(OCR_SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::upstream(OCR_SERVICE, Some(status.as_u16()), &body));
        }

        let body: OcrResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::from_reqwest(OCR_SERVICE, e))?;

        self.interpret(body).await
    }

    async fn interpret(&self, body: OcrResponse) -> ProviderResult<RecognizedText> {
        if let Some(code) = body.error_code {
            let message = body.error_msg.unwrap_or_else(|| "未知错误".to_string());
            warn!("百度OCR返回错误: {} (错误码 {})", message, code);

            if AUTH_ERROR_CODES.contains(&code) {
                warn!("令牌无效，重新获取后重试...");
                self.tokens.invalidate().await;
                return Err(ProviderError::Auth {
                    service: OCR_SERVICE,
                    code,
                    message,
                });
            }

            return Err(ProviderError::Recognition {
                message: format!("{} (错误码 {})", message, code),
            });
        }

        match body.words_result {
            Some(lines) => Ok(RecognizedText::from_lines(lines.iter().map(|l| l.words.as_str()))),
            None => Err(ProviderError::Recognition {
                message: "响应中没有识别结果".to_string(),
            }),
        }
    }
}

/// base64 编码并拒绝空文件和过小的文件
fn encode_image(image: &[u8]) -> ProviderResult<String> {
    if image.is_empty() {
        return Err(ProviderError::EmptyInput);
    }

    let encoded = STANDARD.encode(image);
    if encoded.len() < MIN_ENCODED_LEN {
        return Err(ProviderError::InvalidImage);
    }

    Ok(encoded)
}
