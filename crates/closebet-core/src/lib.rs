//! closebet-core: 종가 베팅 엔진의 핵심 도메인 타입.
//!
//! 스코어링 파이프라인, 리스크 가드, 청산 상태머신, 백테스터가 공유하는
//! 불변 도메인 타입과 전략 파라미터를 정의합니다.
//!
//! 라이브 경로와 백테스트 경로가 바이트 단위로 동일한 판단 로직을 쓰려면
//! 두 경로가 같은 타입 위에서 동작해야 하므로, 이 크레이트는 I/O나
//! 외부 의존 없이 순수 타입만 제공합니다.

pub mod clock;
pub mod domain;
pub mod params;

pub use domain::{
    guard::GuardState,
    position::{ExitReason, ExitTier, Position, TradeRecord},
    score::{
        EnsembleResult, EntryTier, IntradaySignals, PartialScore, PhaseSignals, ScorePhase,
        ScreenSignals, SentimentSignals, TechnicalSignals,
    },
    snapshot::{DailyBar, InvestorFlow, MinuteBar, NewsItem, Snapshot},
};
pub use params::{ConfigError, StrategyParams, TierSpec};
