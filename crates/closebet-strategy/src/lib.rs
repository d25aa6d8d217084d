//! closebet-strategy: 종가 베팅 스코어링 파이프라인.
//!
//! 거래대금 스크리닝 → 기술적 분석 → VETO/감성 → 장중 V자 반등 →
//! 앙상블 합산까지, 진입 판단에 쓰이는 모든 스코어링 프리미티브를
//! 정의합니다. 전부 동기 순수 함수라 라이브 엔진과 백테스터가 같은
//! 코드를 호출합니다. I/O는 호출자 몫입니다.

pub mod ensemble;
pub mod error;
pub mod intraday;
pub mod pipeline;
pub mod screener;
pub mod sizing;
pub mod technical;
pub mod veto;

pub use ensemble::EnsembleScorer;
pub use error::ScoreError;
pub use intraday::IntradayPatternDetector;
pub use pipeline::{CandidateData, EntryPipeline};
pub use screener::{ScreenedCandidate, Screener};
pub use sizing::{KellyCriterion, PositionSizer, QTablePolicy, SizingContext, TradeStats};
pub use technical::TechnicalScorer;
pub use veto::{VetoScanner, VetoVerdict};
