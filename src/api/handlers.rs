//! 路由处理函数
//!
//! 只做 HTTP 相关的事情：读取请求、调用流程、组装响应。

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::homework::or_default;
use crate::models::{DEFAULT_GRADE, DEFAULT_SUBJECT};
use crate::workflow::Stage;

use super::multipart::UploadForm;
use super::response::{local_timestamp, success, ApiError, ApiResponse, ApiResult};
use super::state::AppState;

/// 对外显示的版本号
const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Serialize)]
pub struct HomeworkData {
    pub id: String,
    pub grade: String,
    pub subject: String,
    pub ocr_text: String,
    pub ai_answer: String,
    pub processing_time: String,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct OcrTestData {
    pub text: String,
    pub char_count: usize,
}

#[derive(Debug, Serialize)]
pub struct AiTestData {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Deserialize)]
struct AiTestRequest {
    question: String,
    grade: Option<String>,
    subject: Option<String>,
}

/// GET /
pub async fn home(State(state): State<AppState>) -> Json<Value> {
    let status = if state.config.all_configured() {
        "运行正常"
    } else {
        "API密钥未配置"
    };

    Json(json!({
        "service": "作业助手API",
        "version": SERVICE_VERSION,
        "status": status,
        "endpoints": {
            "POST /api/process-homework": "处理作业图片",
            "GET /api/test": "测试接口",
            "GET /api/health": "健康检查",
            "POST /api/test-ocr": "测试OCR功能",
            "POST /api/test-ai": "测试AI功能"
        },
        "timestamp": local_timestamp(),
    }))
}

/// POST /api/process-homework
pub async fn process_homework(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<ApiResponse<HomeworkData>>> {
    state.flow.ensure_ocr_configured()?;
    state.flow.ensure_analysis_configured()?;

    let request = UploadForm::read(multipart).await?.into_request()?;
    let outcome = state.flow.process(&request).await?;

    let data = HomeworkData {
        id: Uuid::new_v4().to_string(),
        grade: request.grade,
        subject: request.subject,
        ocr_text: outcome.recognized.content,
        ai_answer: outcome.analysis.answer,
        processing_time: format!("{}秒", format_seconds(outcome.elapsed.as_secs_f64())),
        created_at: local_timestamp(),
    };
    info!("✅ 作业 {} 处理成功", data.id);

    Ok(success("处理成功", data))
}

/// GET /api/test
pub async fn test(State(state): State<AppState>) -> Json<ApiResponse<Value>> {
    let describe = |configured: bool| if configured { "已配置" } else { "未配置" };

    success(
        "服务器运行正常",
        json!({
            "status": "running",
            "services": {
                "baidu_ocr": describe(state.config.ocr_configured()),
                "deepseek_ai": describe(state.config.analysis_configured()),
            },
            "timestamp": local_timestamp(),
        }),
    )
}

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let health = state.flow.probe().await;
    info!(
        "🩺 健康检查: {} (OCR: {}, AI: {})",
        health.status_label(),
        health.ocr,
        health.analysis
    );

    Json(json!({
        "status": health.status_label(),
        "services": {
            "baidu_ocr": health.ocr.to_string(),
            "deepseek_ai": health.analysis.to_string(),
        },
        "timestamp": local_timestamp(),
    }))
}

/// POST /api/test-ocr，只尝试一次
pub async fn test_ocr(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<ApiResponse<OcrTestData>>> {
    const PREFIX: &str = "OCR测试失败";
    let fail = |e: AppError| ApiError::from_app_error(e, PREFIX);

    state.flow.ensure_ocr_configured().map_err(fail)?;

    let mut form = UploadForm::read(multipart).await.map_err(fail)?;
    let image = form.take_image().map_err(fail)?;
    let text = state
        .flow
        .recognize_upload(&image, 1)
        .await
        .map_err(fail)?;

    Ok(success(
        "OCR测试成功",
        OcrTestData {
            char_count: text.char_count(),
            text: text.content,
        },
    ))
}

/// POST /api/test-ai，只尝试一次
pub async fn test_ai(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<Json<ApiResponse<AiTestData>>> {
    const PREFIX: &str = "AI测试失败";
    let fail = |e: AppError| ApiError::from_app_error(e, PREFIX);

    state.flow.ensure_analysis_configured().map_err(fail)?;

    let body = body.map_err(|rejection| ApiError::new(rejection.status(), rejection.body_text()))?;

    let request: AiTestRequest = serde_json::from_slice(&body)
        .map_err(|_| ApiError::bad_request("请提供question参数"))?;
    let grade = or_default(request.grade, DEFAULT_GRADE);
    let subject = or_default(request.subject, DEFAULT_SUBJECT);

    let result = state
        .flow
        .analysis()
        .analyze_with_attempts(&request.question, &grade, &subject, 1)
        .await
        .map_err(|e| fail(AppError::provider(Stage::Analyzing, e)))?;

    Ok(success(
        "AI测试成功",
        AiTestData {
            question: request.question,
            answer: result.answer,
        },
    ))
}

/// 保留两位小数并去掉多余的 0（`1.20` 显示为 `1.2`，`3` 显示为 `3.0`）
fn format_seconds(secs: f64) -> String {
    let rounded = (secs * 100.0).round() / 100.0;
    let text = rounded.to_string();
    if text.contains('.') {
        text
    } else {
        format!("{}.0", text)
    }
}
