//! 재시도 전략.
//!
//! 일시적 네트워크 오류는 지수 백오프로 재시도하고, 인증 오류 같은
//! 치명적 실패는 즉시 반환합니다.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::ExchangeError;

/// 재시도 설정.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// 최대 재시도 횟수
    pub max_retries: u32,
    /// 기본 지연 시간
    pub base_delay: Duration,
    /// 최대 지연 시간
    pub max_delay: Duration,
    /// 지수 백오프 배율
    pub backoff_multiplier: f64,
    /// 지연 시간에 지터 추가 여부
    pub add_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }
}

impl RetryConfig {
    /// 빠른 재시도 (짧은 지연, 시세 조회용).
    pub fn fast() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            ..Default::default()
        }
    }

    /// 재시도 없음 (주문 집행용, 중복 주문 방지).
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// attempt번째 재시도의 지연 시간 계산.
    ///
    /// 오류가 지연 시간을 지정하면 (RateLimited) 그것을 우선합니다.
    fn calculate_delay(&self, attempt: u32, error: &ExchangeError) -> Duration {
        if let Some(ms) = error.retry_delay_ms() {
            return Duration::from_millis(ms).min(self.max_delay);
        }

        let exp = self.backoff_multiplier.powi(attempt as i32);
        let mut delay_ms = (self.base_delay.as_millis() as f64 * exp) as u64;

        if self.add_jitter {
            // +-25% 지터로 동시 재시도 분산
            let jitter = delay_ms / 4;
            if jitter > 0 {
                let offset = rand::thread_rng().gen_range(0..=jitter * 2);
                delay_ms = delay_ms - jitter + offset;
            }
        }

        Duration::from_millis(delay_ms).min(self.max_delay)
    }
}

/// 재시도 래퍼.
///
/// `operation`을 성공할 때까지, 혹은 재시도 한도에 도달할 때까지
/// 반복 실행합니다.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, ExchangeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ExchangeError>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(operation = operation_name, attempt, "재시도 후 성공");
                }
                return Ok(value);
            }
            Err(error) => {
                if error.is_fatal() {
                    warn!(operation = operation_name, %error, "치명적 오류, 재시도 중단");
                    return Err(error);
                }
                if !error.is_retryable() || attempt >= config.max_retries {
                    if attempt > 0 {
                        warn!(
                            operation = operation_name,
                            attempt,
                            %error,
                            "재시도 한도 초과"
                        );
                    }
                    return Err(error);
                }

                let delay = config.calculate_delay(attempt, &error);
                debug!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    %error,
                    "재시도 대기"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_first_try() {
        let config = RetryConfig::fast();
        let result = with_retry(&config, "test", || async { Ok::<_, ExchangeError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let config = RetryConfig {
            base_delay: Duration::from_millis(1),
            add_jitter: false,
            ..RetryConfig::default()
        };
        let calls = AtomicU32::new(0);
        let result = with_retry(&config, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ExchangeError::Network("connection reset".into()))
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_error_stops_immediately() {
        let config = RetryConfig::default();
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&config, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ExchangeError::Auth("token expired".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_retryable_error_stops() {
        let config = RetryConfig::default();
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&config, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ExchangeError::OrderRejected {
                    reason: "잔고 부족".into(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn rate_limit_delay_takes_priority() {
        let config = RetryConfig {
            add_jitter: false,
            ..RetryConfig::default()
        };
        let error = ExchangeError::RateLimited { retry_after_ms: 1500 };
        let delay = config.calculate_delay(0, &error);
        assert_eq!(delay, Duration::from_millis(1500));
    }
}
