//! DeepSeek 题目解析客户端
//!
//! 请求体用 `async-openai` 的类型构建（DeepSeek 兼容 OpenAI 接口），
//! 发送则直接走 reqwest，这样 429 限流和超时的重试次数由我们自己控制。

use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs,
};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{ProviderError, ProviderResult};
use crate::models::AnalysisResult;
use crate::retry::RetryPolicy;
use crate::utils::truncate_text;

use super::ANALYSIS_SERVICE;

const MAX_TOKENS: u32 = 2000;
const TEMPERATURE: f32 = 0.3;

/// 限流等待上限（单位数）
const MAX_RATE_LIMIT_DELAY: u32 = 30;

#[derive(Debug, Deserialize)]
struct CompletionBody {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

/// 限流按尝试次数递增等待，最多 30 个单位；超时和连接失败固定 2 个单位
fn analysis_delay(error: &ProviderError, attempt: u32) -> u32 {
    match error {
        ProviderError::RateLimited { .. } => attempt.saturating_mul(10).min(MAX_RATE_LIMIT_DELAY),
        _ => 2,
    }
}

fn analysis_retryable(error: &ProviderError) -> bool {
    matches!(
        error,
        ProviderError::Timeout { .. }
            | ProviderError::Connection { .. }
            | ProviderError::RateLimited { .. }
    )
}

/// 题目解析客户端
pub struct AnalysisClient {
    http: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model_name: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl AnalysisClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: config.deepseek_api_url.clone(),
            api_key: config.deepseek_api_key.clone(),
            model_name: config.deepseek_model.clone(),
            timeout: config.analysis_timeout(),
            retry: RetryPolicy::new(
                config.retry_attempts,
                config.retry_delay_unit(),
                analysis_delay,
                analysis_retryable,
            ),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// 解析题目，使用默认尝试次数
    pub async fn analyze(&self, question: &str, grade: &str, subject: &str) -> ProviderResult<AnalysisResult> {
        self.analyze_with_attempts(question, grade, subject, self.retry.max_attempts())
            .await
    }

    /// 解析题目
    ///
    /// # 参数
    /// - `question`: OCR 识别出的题目文字
    /// - `grade`: 年级
    /// - `subject`: 科目
    /// - `max_attempts`: 最大尝试次数
    ///
    /// # 返回
    /// 返回模型第一条回答的原文
    pub async fn analyze_with_attempts(
        &self,
        question: &str,
        grade: &str,
        subject: &str,
        max_attempts: u32,
    ) -> ProviderResult<AnalysisResult> {
        let api_key = self.api_key.as_deref().ok_or(ProviderError::NotConfigured {
            service: ANALYSIS_SERVICE,
        })?;

        let request = self.build_request(question, grade, subject)?;
        debug!("题目长度: {} 字符，模型: {}", question.chars().count(), self.model_name);

        let policy = self.retry.with_max_attempts(max_attempts);
        let answer = policy
            .run("DeepSeek API调用", |attempt| {
                self.analyze_once(&request, api_key, attempt, max_attempts)
            })
            .await?;

        info!("DeepSeek API调用成功，返回字符数: {}", answer.chars().count());
        Ok(AnalysisResult { answer })
    }

    fn build_request(&self, question: &str, grade: &str, subject: &str) -> ProviderResult<CreateChatCompletionRequest> {
        let (system_prompt, user_prompt) = build_prompts(question, grade, subject);
        let invalid = |e: async_openai::error::OpenAIError| ProviderError::InvalidRequest {
            service: ANALYSIS_SERVICE,
            message: e.to_string(),
        };

        let messages = vec![
            ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system_prompt)
                    .build()
                    .map_err(invalid)?,
            ),
            ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user_prompt)
                    .build()
                    .map_err(invalid)?,
            ),
        ];

        CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(TEMPERATURE)
            .max_tokens(MAX_TOKENS)
            .stream(false)
            .build()
            .map_err(invalid)
    }

    async fn analyze_once(
        &self,
        request: &CreateChatCompletionRequest,
        api_key: &str,
        attempt: u32,
        max_attempts: u32,
    ) -> ProviderResult<String> {
        info!("正在调用DeepSeek API (尝试 {}/{})...", attempt, max_attempts);

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(ANALYSIS_SERVICE, e))?;

        let status = response.status();
        debug!("DeepSeek API响应状态码: {}", status);

        if status == StatusCode::OK {
            let body: CompletionBody = response
                .json()
                .await
                .map_err(|e| ProviderError::from_reqwest(ANALYSIS_SERVICE, e))?;
            return body
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .ok_or_else(|| ProviderError::Upstream {
                    service: ANALYSIS_SERVICE,
                    status: Some(status.as_u16()),
                    message: "AI解析失败: 响应中没有可用的回答".to_string(),
                });
        }

        let text = response.text().await.unwrap_or_default();
        warn!("DeepSeek API错误响应: {}", truncate_text(&text, 200));
        let message = extract_error_message(&text);

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited {
                service: ANALYSIS_SERVICE,
                message,
            });
        }

        Err(ProviderError::Upstream {
            service: ANALYSIS_SERVICE,
            status: Some(status.as_u16()),
            message,
        })
    }
}

/// 构建提示词
///
/// 返回 (system_prompt, user_prompt)，相同输入总是得到相同输出
pub fn build_prompts(question: &str, grade: &str, subject: &str) -> (String, String) {
    let system_prompt = format!(
        r#"你是一位经验丰富的{grade}{subject}老师。请分析以下作业题目，并提供详细的解题步骤和答案。

要求：
1. 分析题目考察的知识点
2. 提供详细的解题步骤
3. 给出最终答案
4. 使用与题目相同的语言回答，保持专业和清晰
5. 如果题目涉及数学公式，请使用LaTeX格式表示

年级：{grade}
科目：{subject}"#
    );

    let user_prompt = format!(
        r#"请分析以下题目：

{question}

请按照要求提供完整的解析。"#
    );

    (system_prompt, user_prompt)
}

/// 优先取 `error.message`，否则返回原始响应文本
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| truncate_text(body.trim(), 300))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Instant;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CHAT_PATH: &str = "/v1/chat/completions";

    fn config_for(server: &MockServer) -> Config {
        Config {
            deepseek_api_key: Some("sk-test".to_string()),
            deepseek_api_url: format!("{}{}", server.uri(), CHAT_PATH),
            analysis_timeout_ms: 500,
            retry_delay_unit_ms: 1,
            ..Config::default()
        }
    }

    fn completion(content: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1700000000,
            "model": "deepseek-chat",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 20, "total_tokens": 30}
        })
    }

    #[test]
    fn test_prompts_are_deterministic_and_role_conditioned() {
        let (system, user) = build_prompts("1+1=?", "初一", "数学");
        assert!(system.starts_with("你是一位经验丰富的初一数学老师"));
        assert!(system.contains("知识点"));
        assert!(system.contains("LaTeX"));
        assert!(user.contains("1+1=?"));
        assert_eq!(build_prompts("1+1=?", "初一", "数学"), (system, user));
    }

    #[test]
    fn test_rate_limit_delay_is_graduated_and_capped() {
        let limited = ProviderError::RateLimited {
            service: ANALYSIS_SERVICE,
            message: String::new(),
        };
        assert_eq!(analysis_delay(&limited, 1), 10);
        assert_eq!(analysis_delay(&limited, 2), 20);
        assert_eq!(analysis_delay(&limited, 3), 30);
        assert_eq!(analysis_delay(&limited, 9), 30);
        assert_eq!(analysis_delay(&ProviderError::Timeout { service: ANALYSIS_SERVICE }, 1), 2);
    }

    #[test]
    fn test_extract_error_message_falls_back_to_body() {
        assert_eq!(
            extract_error_message(r#"{"error": {"message": "Insufficient Balance"}}"#),
            "Insufficient Balance"
        );
        assert_eq!(extract_error_message("gateway down"), "gateway down");
    }

    #[tokio::test]
    async fn test_request_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CHAT_PATH))
            .and(header("Authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "deepseek-chat",
                "max_tokens": 2000,
                "stream": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("答案：2")))
            .expect(1)
            .mount(&server)
            .await;

        let client = AnalysisClient::new(&config_for(&server));
        let result = client.analyze("1+1=?", "初一", "数学").await.unwrap();
        assert_eq!(result.answer, "答案：2");
    }

    #[tokio::test]
    async fn test_rate_limited_then_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CHAT_PATH))
            .respond_with(
                ResponseTemplate::new(429)
                    .set_body_json(json!({"error": {"message": "Rate limit reached"}})),
            )
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(CHAT_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("  第二次的解析\n")))
            .expect(1)
            .mount(&server)
            .await;

        let config = config_for(&server);
        let unit = config.retry_delay_unit();
        let client = AnalysisClient::new(&config);

        let started = Instant::now();
        let result = client.analyze("题目", "高中", "数学").await.unwrap();

        // 原文返回，不做裁剪
        assert_eq!(result.answer, "  第二次的解析\n");
        assert!(started.elapsed() >= unit * 10);
        assert!(client.retry.delay_for(
            &ProviderError::RateLimited { service: ANALYSIS_SERVICE, message: String::new() },
            1
        ) <= unit * MAX_RATE_LIMIT_DELAY);
    }

    #[tokio::test]
    async fn test_rate_limit_exhausts_budget() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CHAT_PATH))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .expect(2)
            .mount(&server)
            .await;

        let client = AnalysisClient::new(&config_for(&server));
        let err = client.analyze("题目", "高中", "数学").await.unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited { ref message, .. } if message == "slow down"));
    }

    #[tokio::test]
    async fn test_other_status_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CHAT_PATH))
            .respond_with(
                ResponseTemplate::new(402)
                    .set_body_json(json!({"error": {"message": "Insufficient Balance"}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = AnalysisClient::new(&config_for(&server));
        let err = client.analyze("题目", "高中", "数学").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "DeepSeek 返回错误 (状态码 402): Insufficient Balance"
        );
    }

    #[tokio::test]
    async fn test_timeout_retried_then_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CHAT_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion("太慢了"))
                    .set_delay(Duration::from_millis(1500)),
            )
            .expect(2)
            .mount(&server)
            .await;

        let client = AnalysisClient::new(&config_for(&server));
        let err = client.analyze("题目", "高中", "数学").await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_connection_error_classified() {
        let config = Config {
            deepseek_api_key: Some("sk-test".to_string()),
            deepseek_api_url: "http://127.0.0.1:1/v1/chat/completions".to_string(),
            retry_delay_unit_ms: 1,
            ..Config::default()
        };
        let client = AnalysisClient::new(&config);
        let err = client
            .analyze_with_attempts("题目", "高中", "数学", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Connection { .. }));
    }

    #[tokio::test]
    async fn test_missing_key_is_not_configured() {
        let client = AnalysisClient::new(&Config::default());
        assert!(!client.is_configured());
        assert!(client
            .analyze("题目", "高中", "数学")
            .await
            .unwrap_err()
            .is_not_configured());
    }
}
