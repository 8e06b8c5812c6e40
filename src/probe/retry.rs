//! 有界重试原语
//!
//! 探测、进程存活检查与后端健康检查共用同一套重试/退避策略，
//! 不允许各处各写一份。每次尝试有独立超时，尝试之间指数退避并封顶。

use std::future::Future;
use std::time::Duration;

/// 重试策略：次数、单次超时、退避上限
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// 单次尝试的超时
    pub attempt_timeout: Duration,
    /// 退避上限
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(5),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, attempt_timeout: Duration) -> Self {
        Self {
            max_attempts,
            attempt_timeout,
            ..Self::default()
        }
    }

    /// 第 attempt 次失败后的退避：min(1000 * 2^(attempt-1), max_backoff) 毫秒
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let ms = 1000u64.saturating_mul(1u64 << exp);
        Duration::from_millis(ms.min(self.max_backoff.as_millis() as u64))
    }
}

/// 按策略重试一个异步操作；返回首个成功值，或全部耗尽后的最后一个错误
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, String>>,
{
    let mut last_error = String::from("no attempts made");

    for attempt in 1..=policy.max_attempts.max(1) {
        match tokio::time::timeout(policy.attempt_timeout, op()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => {
                tracing::debug!(attempt, error = %e, "Attempt failed");
                last_error = e;
            }
            Err(_) => {
                last_error = format!(
                    "attempt {} timed out after {}ms",
                    attempt,
                    policy.attempt_timeout.as_millis()
                );
                tracing::debug!(attempt, "Attempt timed out");
            }
        }

        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.backoff_delay(attempt)).await;
        }
    }

    Err(last_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(2000));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(4000));
        assert_eq!(policy.backoff_delay(4), Duration::from_millis(5000));
        assert_eq!(policy.backoff_delay(10), Duration::from_millis(5000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let attempts = Arc::new(AtomicU32::new(0));
        let a = attempts.clone();

        let result = with_retry(&RetryPolicy::default(), move || {
            let a = a.clone();
            async move {
                if a.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("transient".to_string())
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let attempts = Arc::new(AtomicU32::new(0));
        let a = attempts.clone();

        let result: Result<(), String> = with_retry(&RetryPolicy::default(), move || {
            let n = a.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Err(format!("failure {}", n)) }
        })
        .await;

        assert_eq!(result.unwrap_err(), "failure 3");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_attempt_timeout_counts_as_failure() {
        let attempts = Arc::new(AtomicU32::new(0));
        let a = attempts.clone();

        let result: Result<(), String> = with_retry(&RetryPolicy::default(), move || {
            a.fetch_add(1, Ordering::SeqCst);
            async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            }
        })
        .await;

        assert!(result.unwrap_err().contains("timed out"));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
