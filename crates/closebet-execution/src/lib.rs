//! closebet-execution: 포지션 원장, 거래 이력, 라이브 엔진.
//!
//! 원장은 포지션과 현금의 단일 소유자이며, 모든 변경은 청산
//! 상태머신/가드의 판정을 거친 뒤에만 일어납니다. 거래 이력은
//! JSONL로 영속화되어 재시작 후에도 켈리/가드 입력이 유지됩니다.

pub mod engine;
pub mod error;
pub mod history;
pub mod ledger;

pub use engine::LiveEngine;
pub use error::{EngineError, HistoryError, LedgerError};
pub use history::TradeHistory;
pub use ledger::PositionLedger;
