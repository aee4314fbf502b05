//! 外部服务探测
//!
//! 启动日志和 `/api/health` 共用：OCR 强制刷新一次令牌，AI 发送一次真实的单次请求。

use std::fmt;
use tracing::debug;

use crate::utils::truncate_text;

use super::HomeworkFlow;

/// 单个服务的探测结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    Available,
    NotConfigured,
    /// 失败原因，最多保留 100 个字符
    Unavailable(String),
}

impl ProbeStatus {
    pub fn unavailable(reason: impl fmt::Display) -> Self {
        ProbeStatus::Unavailable(reason.to_string().chars().take(100).collect())
    }

    pub fn is_available(&self) -> bool {
        matches!(self, ProbeStatus::Available)
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStatus::Available => f.write_str("available"),
            ProbeStatus::NotConfigured => f.write_str("unavailable: API密钥未配置"),
            ProbeStatus::Unavailable(reason) => write!(f, "unavailable: {}", reason),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceHealth {
    pub ocr: ProbeStatus,
    pub analysis: ProbeStatus,
}

impl ServiceHealth {
    /// 两个服务都可用才算健康
    pub fn is_healthy(&self) -> bool {
        self.ocr.is_available() && self.analysis.is_available()
    }

    pub fn status_label(&self) -> &'static str {
        if self.is_healthy() {
            "healthy"
        } else {
            "degraded"
        }
    }
}

impl HomeworkFlow {
    pub async fn probe_ocr(&self) -> ProbeStatus {
        if !self.ocr().is_configured() {
            return ProbeStatus::NotConfigured;
        }
        match self.ocr().tokens().refresh().await {
            Ok(_) => ProbeStatus::Available,
            Err(e) => ProbeStatus::unavailable(e),
        }
    }

    pub async fn probe_analysis(&self) -> ProbeStatus {
        if !self.analysis().is_configured() {
            return ProbeStatus::NotConfigured;
        }
        match self.analysis().analyze_with_attempts("测试", "测试", "测试", 1).await {
            Ok(result) => {
                debug!("AI 探测回复: {}", truncate_text(&result.answer, 50));
                ProbeStatus::Available
            }
            Err(e) => ProbeStatus::unavailable(e),
        }
    }

    /// 依次探测两个服务
    pub async fn probe(&self) -> ServiceHealth {
        ServiceHealth {
            ocr: self.probe_ocr().await,
            analysis: self.probe_analysis().await,
        }
    }
}
