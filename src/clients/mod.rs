pub mod llm_client;
pub mod ocr_client;
pub mod token_cache;

pub use llm_client::AnalysisClient;
pub use ocr_client::OcrClient;
pub use token_cache::{Credential, TokenCache};

/// 服务名称，用于错误信息和日志
pub const OCR_SERVICE: &str = "百度OCR";
pub const ANALYSIS_SERVICE: &str = "DeepSeek";
