//! 거래소/데이터 제공자 에러 타입.

use thiserror::Error;

/// 외부 협력자 호출 에러.
///
/// 판단 코어는 이 에러를 보수적으로 처리합니다: 해당 종목/사이클을
/// 건너뛰고, GuardState나 PositionLedger는 건드리지 않습니다.
#[derive(Debug, Clone, Error)]
pub enum ExchangeError {
    /// 시세 필드 누락/불완전. 기본값 대체 없이 해당 종목을 제외합니다.
    #[error("데이터 없음: {symbol} ({detail})")]
    DataUnavailable { symbol: String, detail: String },

    /// 네트워크/전송 오류 (재시도 대상)
    #[error("네트워크 오류: {0}")]
    Network(String),

    /// 요청 타임아웃 (재시도 대상)
    #[error("요청 타임아웃: {0}")]
    Timeout(String),

    /// Rate limit 초과. 지정된 대기 후 재시도합니다.
    #[error("Rate limit 초과 (대기 {retry_after_ms}ms)")]
    RateLimited { retry_after_ms: u64 },

    /// 주문 거부. 체결된 것으로 처리하지 않습니다.
    #[error("주문 거부: {reason}")]
    OrderRejected { reason: String },

    /// 인증 실패 (치명적, 재시도 무의미)
    #[error("인증 실패: {0}")]
    Auth(String),
}

impl ExchangeError {
    /// 재시도로 해결될 가능성이 있는 에러인지 여부.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExchangeError::Network(_)
                | ExchangeError::Timeout(_)
                | ExchangeError::RateLimited { .. }
        )
    }

    /// 재시도 없이 즉시 실패 처리해야 하는 에러인지 여부.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ExchangeError::Auth(_))
    }

    /// 에러에 지정된 재시도 대기 시간 (ms).
    pub fn retry_delay_ms(&self) -> Option<u64> {
        match self {
            ExchangeError::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        }
    }
}
