//! # Homework Helper
//!
//! 作业助手后端：接收作业照片，经百度 OCR 识别文字后交给 DeepSeek 解析，返回解题结果
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 客户端层（Clients）
//! - `clients/` - 封装外部服务的 HTTP 调用，只描述"我能调用什么"
//! - `TokenCache` - 百度 OCR 访问令牌的缓存与刷新
//! - `OcrClient` - 图片文字识别
//! - `AnalysisClient` - 大模型解题
//! - `retry::RetryPolicy` - 两个客户端共用的有限次重试
//!
//! ### ② 流程层（Workflow）
//! - `workflow/` - 定义"一张作业图片"的完整处理流程
//! - `upload` - 上传文件校验（扩展名、大小）
//! - `HomeworkFlow` - 流程编排（OCR → 文字检查 → AI 解析）
//!
//! ### ③ 接口层（API）
//! - `api/` - axum 路由、表单读取、JSON 响应
//! - `App` - 启动探测、监听端口、优雅退出
//!
//! ## 模块结构

pub mod api;
pub mod app;
pub mod clients;
pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod retry;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use api::{router, AppState};
pub use app::App;
pub use clients::{AnalysisClient, OcrClient, TokenCache};
pub use config::Config;
pub use error::{AppError, ProviderError, Result};
pub use models::{AnalysisRequest, AnalysisResult, ImageUpload, RecognizedText};
pub use retry::RetryPolicy;
pub use workflow::{HomeworkFlow, HomeworkOutcome, ServiceHealth, Stage};
