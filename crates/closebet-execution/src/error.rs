//! 실행 계층 오류.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// 포지션 원장 오류.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// 가용 현금 부족
    #[error("현금 부족 (필요 {needed}, 가용 {available})")]
    InsufficientFunds { needed: Decimal, available: Decimal },
    /// 배정 예산으로 1주도 살 수 없음
    #[error("{symbol}: 수량 0 (예산 {budget}, 가격 {price})")]
    ZeroQuantity {
        symbol: String,
        budget: Decimal,
        price: Decimal,
    },
    /// 존재하지 않는 포지션
    #[error("포지션 없음: {0}")]
    UnknownPosition(Uuid),
    /// 티어 순서 위반 또는 이미 소비된 티어
    #[error("잘못된 티어 소비: index {index}")]
    InvalidTier { index: usize },
    /// 체결 이력이 생긴 포지션은 롤백 불가
    #[error("부분 체결된 포지션은 롤백할 수 없음: {0}")]
    RollbackDenied(Uuid),
}

/// 거래 이력 영속화 오류.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// 파일 I/O 실패
    #[error("이력 파일 I/O 오류: {0}")]
    Io(#[from] std::io::Error),
    /// JSONL 레코드 파싱 실패
    #[error("이력 레코드 파싱 오류: {0}")]
    Parse(#[from] serde_json::Error),
}

/// 라이브 엔진 오류.
///
/// 사이클 내부에서 회복 가능한 실패(제공자/주문)는 로그 후 건너뛰고,
/// 원장/이력 정합성이 깨지는 경우에만 여기로 전파됩니다.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    History(#[from] HistoryError),
}
