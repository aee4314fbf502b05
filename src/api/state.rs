use std::sync::Arc;

use crate::config::Config;
use crate::workflow::HomeworkFlow;

/// 各路由共享的状态
#[derive(Clone)]
pub struct AppState {
    pub flow: Arc<HomeworkFlow>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            flow: Arc::new(HomeworkFlow::from_config(&config)),
            config: Arc::new(config),
        }
    }
}
