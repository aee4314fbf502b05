//! 作业处理流程 - 流程层
//!
//! 核心职责：定义"一张作业图片"的完整处理流程
//!
//! 流程顺序：
//! 1. 校验（在 api 层读取上传时完成）
//! 2. OCR 识别文字
//! 3. 文字过短则判定为无法识别
//! 4. AI 解析
//!
//! 任何阶段失败都直接进入响应阶段，不会回到之前的阶段。

use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::clients::{AnalysisClient, OcrClient, OCR_SERVICE};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{AnalysisRequest, AnalysisResult, ImageUpload, RecognizedText};
use crate::utils::truncate_text;

/// 未配置提示中使用的 AI 服务名称
pub const ANALYSIS_DISPLAY_NAME: &str = "DeepSeek AI";

/// 识别结果少于该字符数视为没有有效文字
pub const MIN_TEXT_CHARS: usize = 5;

/// 处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Recognizing,
    Analyzing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Recognizing => "OCR识别",
            Stage::Analyzing => "AI分析",
        };
        f.write_str(name)
    }
}

/// 一次成功处理的结果
#[derive(Debug, Clone)]
pub struct HomeworkOutcome {
    pub recognized: RecognizedText,
    pub analysis: AnalysisResult,
    pub elapsed: Duration,
}

/// 作业处理流程
///
/// - 持有 OCR 和 AI 两个客户端
/// - 编排 识别 → 检查 → 解析
/// - 不关心 HTTP 细节
pub struct HomeworkFlow {
    ocr: OcrClient,
    analysis: AnalysisClient,
    default_attempts: u32,
}

impl HomeworkFlow {
    pub fn new(ocr: OcrClient, analysis: AnalysisClient, default_attempts: u32) -> Self {
        Self {
            ocr,
            analysis,
            default_attempts,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            OcrClient::new(config),
            AnalysisClient::new(config),
            config.retry_attempts,
        )
    }

    pub fn ocr(&self) -> &OcrClient {
        &self.ocr
    }

    pub fn analysis(&self) -> &AnalysisClient {
        &self.analysis
    }

    pub fn ensure_ocr_configured(&self) -> Result<()> {
        if self.ocr.is_configured() {
            Ok(())
        } else {
            Err(AppError::NotConfigured(OCR_SERVICE))
        }
    }

    pub fn ensure_analysis_configured(&self) -> Result<()> {
        if self.analysis.is_configured() {
            Ok(())
        } else {
            Err(AppError::NotConfigured(ANALYSIS_DISPLAY_NAME))
        }
    }

    /// 完整处理一张作业图片
    pub async fn process(&self, request: &AnalysisRequest) -> Result<HomeworkOutcome> {
        let started = Instant::now();
        self.ensure_ocr_configured()?;
        self.ensure_analysis_configured()?;

        info!(
            "📄 开始处理作业: {} ({} 字节) | {} {}",
            request.image.file_name,
            request.image.len(),
            request.grade,
            request.subject
        );

        // ========== 阶段 1: OCR ==========
        info!("🔍 开始OCR识别...");
        let recognized = self
            .recognize_upload(&request.image, self.default_attempts)
            .await?;

        // ========== 阶段 2: 文字检查 ==========
        if recognized.meaningful_chars() < MIN_TEXT_CHARS {
            warn!(
                "⚠️ 识别文字过短 ({} 字符)，不进行AI分析: {:?}",
                recognized.meaningful_chars(),
                truncate_text(&recognized.content, 20)
            );
            return Err(AppError::UnreadableText);
        }

        // ========== 阶段 3: AI 分析 ==========
        info!("🤖 开始AI分析...");
        let analysis = self
            .analysis
            .analyze_with_attempts(
                &recognized.content,
                &request.grade,
                &request.subject,
                self.default_attempts,
            )
            .await
            .map_err(|e| AppError::provider(Stage::Analyzing, e))?;

        let elapsed = started.elapsed();
        info!("✅ 处理完成，耗时 {:.2} 秒", elapsed.as_secs_f64());

        Ok(HomeworkOutcome {
            recognized,
            analysis,
            elapsed,
        })
    }

    /// 将上传内容写入临时文件后识别
    ///
    /// 临时文件只在识别期间存在，无论成功失败都会在返回前删除。
    pub async fn recognize_upload(&self, image: &ImageUpload, max_attempts: u32) -> Result<RecognizedText> {
        let (result, _path) = self.recognize_in_temp_file(image, max_attempts).await?;
        result
    }

    /// 返回识别结果和已删除的临时文件路径
    async fn recognize_in_temp_file(
        &self,
        image: &ImageUpload,
        max_attempts: u32,
    ) -> Result<(Result<RecognizedText>, PathBuf)> {
        let mut temp = tempfile::Builder::new()
            .prefix("homework-")
            .suffix(&image.extension)
            .tempfile()?;
        temp.write_all(&image.bytes)?;
        temp.flush()?;
        debug!("文件已保存到临时文件: {}", temp.path().display());

        let result = self.ocr.recognize_file(temp.path(), max_attempts).await;

        let path = temp.path().to_path_buf();
        match temp.close() {
            Ok(()) => debug!("已清理临时文件: {}", path.display()),
            Err(e) => warn!("清理临时文件失败: {} ({})", path.display(), e),
        }

        let result = result.map_err(|e| AppError::provider(Stage::Recognizing, e));
        Ok((result, path))
    }
}
