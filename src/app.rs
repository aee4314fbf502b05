use crate::api::{self, AppState};
use crate::config::Config;
use crate::utils::logging::{log_endpoints, log_service_status, log_startup};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// 应用主结构
pub struct App {
    state: AppState,
}

impl App {
    /// 初始化应用
    ///
    /// 探测外部服务并记录结果，探测失败不影响启动。
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        let state = AppState::new(config);

        info!("\n🔌 正在检查外部服务...");
        let health = state.flow.probe().await;
        log_service_status("百度OCR", &health.ocr);
        log_service_status("DeepSeek AI", &health.analysis);
        if !health.is_healthy() {
            warn!("⚠️ 部分外部服务不可用，相关接口会返回错误");
        }

        Ok(Self { state })
    }

    /// 运行 HTTP 服务，直到收到 Ctrl-C
    pub async fn run(self) -> Result<()> {
        let port = self.state.config.port;
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        log_endpoints(port);

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("无法监听端口 {}", port))?;
        info!("🚀 服务已启动: http://{}", addr);

        axum::serve(listener, api::router(self.state))
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP 服务异常退出")?;

        info!("👋 服务已停止");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("无法监听退出信号: {}", e);
        std::future::pending::<()>().await;
    }
    info!("\n收到退出信号，正在关闭服务...");
}
