use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// 程序配置
///
/// 加载顺序：默认值 → `HOMEWORK_CONFIG` 指定的 TOML 文件（可选）→ 环境变量。
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 监听端口
    pub port: u16,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- 百度 OCR 配置 ---
    pub baidu_api_key: Option<String>,
    pub baidu_secret_key: Option<String>,
    pub baidu_auth_url: String,
    pub baidu_ocr_url: String,
    // --- DeepSeek 配置 ---
    pub deepseek_api_key: Option<String>,
    pub deepseek_api_url: String,
    pub deepseek_model: String,
    // --- 超时与重试 ---
    pub ocr_auth_timeout_ms: u64,
    pub ocr_timeout_ms: u64,
    pub analysis_timeout_ms: u64,
    /// 每次外部调用的最大尝试次数
    pub retry_attempts: u32,
    /// 重试等待的时间单位（毫秒），延迟按该单位的倍数计算
    pub retry_delay_unit_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            verbose_logging: false,
            baidu_api_key: None,
            baidu_secret_key: None,
            baidu_auth_url: "https://aip.baidubce.com/oauth/2.0/token".to_string(),
            baidu_ocr_url: "https://aip.baidubce.com/rest/2.0/ocr/v1/general_basic".to_string(),
            deepseek_api_key: None,
            deepseek_api_url: "https://api.deepseek.com/v1/chat/completions".to_string(),
            deepseek_model: "deepseek-chat".to_string(),
            ocr_auth_timeout_ms: 10_000,
            ocr_timeout_ms: 30_000,
            analysis_timeout_ms: 60_000,
            retry_attempts: 2,
            retry_delay_unit_ms: 1_000,
        }
    }
}

impl Config {
    /// 默认值 + 环境变量
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 默认值 + 可选配置文件 + 环境变量
    pub fn load() -> Result<Self> {
        let base = match std::env::var("HOMEWORK_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::from_toml_file(Path::new(&path))?,
            _ => Self::default(),
        };
        Ok(base.with_env_overrides())
    }

    /// 从 TOML 文件读取配置，缺省字段使用默认值
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("无法解析配置文件: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config.normalized())
    }

    fn with_env_overrides(self) -> Self {
        Self {
            port: env_or("PORT", self.port),
            verbose_logging: env_or("VERBOSE_LOGGING", self.verbose_logging),
            baidu_api_key: env_secret("BAIDU_API_KEY").or(self.baidu_api_key),
            baidu_secret_key: env_secret("BAIDU_SECRET_KEY").or(self.baidu_secret_key),
            baidu_auth_url: std::env::var("BAIDU_AUTH_URL").unwrap_or(self.baidu_auth_url),
            baidu_ocr_url: std::env::var("BAIDU_OCR_URL").unwrap_or(self.baidu_ocr_url),
            deepseek_api_key: env_secret("DEEPSEEK_API_KEY").or(self.deepseek_api_key),
            deepseek_api_url: std::env::var("DEEPSEEK_API_URL").unwrap_or(self.deepseek_api_url),
            deepseek_model: std::env::var("DEEPSEEK_MODEL").unwrap_or(self.deepseek_model),
            ocr_auth_timeout_ms: env_or("OCR_AUTH_TIMEOUT_MS", self.ocr_auth_timeout_ms),
            ocr_timeout_ms: env_or("OCR_TIMEOUT_MS", self.ocr_timeout_ms),
            analysis_timeout_ms: env_or("ANALYSIS_TIMEOUT_MS", self.analysis_timeout_ms),
            retry_attempts: env_or("RETRY_ATTEMPTS", self.retry_attempts),
            retry_delay_unit_ms: env_or("RETRY_DELAY_UNIT_MS", self.retry_delay_unit_ms),
        }
        .normalized()
    }

    /// 空白密钥视为未配置
    fn normalized(self) -> Self {
        Self {
            baidu_api_key: non_blank(self.baidu_api_key),
            baidu_secret_key: non_blank(self.baidu_secret_key),
            deepseek_api_key: non_blank(self.deepseek_api_key),
            ..self
        }
    }

    pub fn ocr_configured(&self) -> bool {
        self.baidu_api_key.is_some() && self.baidu_secret_key.is_some()
    }

    pub fn analysis_configured(&self) -> bool {
        self.deepseek_api_key.is_some()
    }

    pub fn all_configured(&self) -> bool {
        self.ocr_configured() && self.analysis_configured()
    }

    pub fn ocr_auth_timeout(&self) -> Duration {
        Duration::from_millis(self.ocr_auth_timeout_ms)
    }

    pub fn ocr_timeout(&self) -> Duration {
        Duration::from_millis(self.ocr_timeout_ms)
    }

    pub fn analysis_timeout(&self) -> Duration {
        Duration::from_millis(self.analysis_timeout_ms)
    }

    pub fn retry_delay_unit(&self) -> Duration {
        Duration::from_millis(self.retry_delay_unit_ms)
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_secret(name: &str) -> Option<String> {
    non_blank(std::env::var(name).ok())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
