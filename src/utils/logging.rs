/// 日志工具模块
///
/// 提供启动信息和服务状态的输出辅助函数
use tracing::{info, warn};

use crate::config::Config;
use crate::workflow::ProbeStatus;

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 作业助手服务器启动...");
    info!("{}", "=".repeat(60));

    if config.all_configured() {
        info!("✓ 所有API密钥已配置");
    } else {
        warn!("⚠️ API密钥未完全配置，部分功能将无法使用");
        warn!("请设置以下环境变量:");
        warn!("  1. BAIDU_API_KEY");
        warn!("  2. BAIDU_SECRET_KEY");
        warn!("  3. DEEPSEEK_API_KEY");
    }
}

/// 记录单个外部服务的探测结果
pub fn log_service_status(name: &str, status: &ProbeStatus) {
    match status {
        ProbeStatus::Available => info!("✓ {}: 连接成功", name),
        ProbeStatus::NotConfigured => warn!("✗ {}: API密钥未配置", name),
        ProbeStatus::Unavailable(reason) => warn!("✗ {}: 连接失败 {}", name, reason),
    }
}

/// 记录接口列表和监听地址
pub fn log_endpoints(port: u16) {
    info!("\nAPI接口:");
    info!("  GET  /                       - 首页");
    info!("  POST /api/process-homework   - 处理作业图片");
    info!("  GET  /api/test               - 测试接口");
    info!("  GET  /api/health             - 健康检查");
    info!("  POST /api/test-ocr           - 测试OCR功能");
    info!("  POST /api/test-ai            - 测试AI功能");
    info!("{}", "=".repeat(60));
    info!("📡 监听端口: {}", port);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大字符数
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
