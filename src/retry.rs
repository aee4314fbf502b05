//! 有界重试策略
//!
//! OCR 和 AI 两个客户端共用同一个重试原语，只是可重试判断和等待时间不同。

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use crate::error::{ProviderError, ProviderResult};

/// 第 `attempt` 次尝试（从 1 开始）失败后，下一次尝试前等待的时间单位数
pub type DelayFn = fn(&ProviderError, u32) -> u32;

/// 判断错误是否值得再试一次
pub type RetryPredicate = fn(&ProviderError) -> bool;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay_unit: Duration,
    delay: DelayFn,
    retryable: RetryPredicate,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay_unit: Duration, delay: DelayFn, retryable: RetryPredicate) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay_unit,
            delay,
            retryable,
        }
    }

    /// 相同的等待与判断规则，不同的尝试次数
    pub fn with_max_attempts(&self, max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..self.clone()
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn should_retry(&self, error: &ProviderError) -> bool {
        (self.retryable)(error)
    }

    pub fn delay_for(&self, error: &ProviderError, attempt: u32) -> Duration {
        self.delay_unit * (self.delay)(error, attempt)
    }

    /// 执行 `operation`，直到成功、遇到不可重试错误或用完尝试次数
    ///
    /// `operation` 收到当前尝试序号（从 1 开始）。
    pub async fn run<F, Fut, T>(&self, label: &str, mut operation: F) -> ProviderResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if attempt >= self.max_attempts || !self.should_retry(&error) {
                        return Err(error);
                    }

                    let delay = self.delay_for(&error, attempt);
                    warn!(
                        "{} 失败，{:?} 后重试 {}/{}: {}",
                        label, delay, attempt, self.max_attempts, error
                    );
                    if !delay.is_zero() {
                        sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn always(_: &ProviderError) -> bool {
        true
    }

    fn transient_only(error: &ProviderError) -> bool {
        error.is_transient()
    }

    fn one_unit(_: &ProviderError, _: u32) -> u32 {
        1
    }

    fn graduated(_: &ProviderError, attempt: u32) -> u32 {
        (attempt * 10).min(30)
    }

    #[tokio::test]
    async fn test_stops_after_budget() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = RetryPolicy::new(2, Duration::from_millis(1), one_unit, always);

        let result: ProviderResult<()> = policy
            .run("测试", move |_| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::Timeout { service: "test" })
            })
            .await;

        assert!(matches!(result, Err(ProviderError::Timeout { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_terminal_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = RetryPolicy::new(5, Duration::from_millis(1), one_unit, transient_only);

        let result: ProviderResult<()> = policy
            .run("测试", move |_| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::EmptyInput)
            })
            .await;

        assert!(matches!(result, Err(ProviderError::EmptyInput)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_succeeds_on_later_attempt() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1), one_unit, always);

        let result = policy
            .run("测试", |attempt| async move {
                if attempt < 3 {
                    Err(ProviderError::Timeout { service: "test" })
                } else {
                    Ok(attempt)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_zero_attempts_still_runs_once() {
        let policy = RetryPolicy::new(0, Duration::from_millis(1), one_unit, always);
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.with_max_attempts(0).max_attempts(), 1);
    }

    #[test]
    fn test_delay_scales_with_unit_and_caps() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1), graduated, always);
        let err = ProviderError::Timeout { service: "test" };
        assert_eq!(policy.delay_for(&err, 1), Duration::from_secs(10));
        assert_eq!(policy.delay_for(&err, 2), Duration::from_secs(20));
        assert_eq!(policy.delay_for(&err, 7), Duration::from_secs(30));
    }
}
