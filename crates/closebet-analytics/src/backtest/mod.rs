//! 백테스트 모듈.
//!
//! - [`HistoricalData`]: 커서 기준 과거만 보이는 데이터 저장소
//! - [`BacktestConfig`]: 초기 자본, 수수료, 슬리피지 설정
//! - [`BacktestEngine`]: 일 단위 재생 엔진 (오전 청산 → 종가 진입)
//! - [`BacktestReport`]: 거래 기록, 자산 곡선, 요약 지표

pub mod data;
pub mod engine;

pub use data::{HistoricalData, SymbolHistory};
pub use engine::{
    BacktestConfig, BacktestEngine, BacktestError, BacktestReport, EquityPoint, SummaryMetrics,
};
