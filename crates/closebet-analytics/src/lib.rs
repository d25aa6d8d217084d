//! closebet-analytics: 백테스트, 파라미터 최적화, 성과 분석.
//!
//! 백테스트는 라이브 엔진과 동일한 파이프라인/청산 상태머신/가드를
//! 재생합니다. 분석 전용 판단 코드는 없습니다. 커서 이전 데이터만
//! 보이는 `HistoricalData` 뷰로 미래 참조를 구조적으로 차단합니다.

pub mod backtest;
pub mod optimizer;
pub mod performance;

pub use backtest::{
    BacktestConfig, BacktestEngine, BacktestError, BacktestReport, EquityPoint, HistoricalData,
    SummaryMetrics, SymbolHistory,
};
pub use optimizer::{
    OptimizationEntry, OptimizationReport, ParameterOptimizer, ParameterSpace, RankMetric,
    SearchMode,
};
pub use performance::{Period, PerformanceAnalyzer, PerformanceSummary, SymbolPerformance};
