//! 단계별 부분 점수와 앙상블 결과.
//!
//! 스코어링 파이프라인의 단계 간 인터페이스는 느슨한 딕셔너리가 아니라
//! 단계별로 태깅된 구조체입니다. 각 단계가 산출한 하위 신호를 그대로
//! 보존해 라이브/백테스트 판단 diff와 사후 감사가 가능합니다.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// 스코어링 단계.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorePhase {
    /// 거래대금 스크리닝
    Screen,
    /// 기술적 분석
    Technical,
    /// 뉴스 감성 / VETO
    Sentiment,
    /// 장중 V자 반등
    Intraday,
}

impl std::fmt::Display for ScorePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScorePhase::Screen => write!(f, "SCREEN"),
            ScorePhase::Technical => write!(f, "TECHNICAL"),
            ScorePhase::Sentiment => write!(f, "SENTIMENT"),
            ScorePhase::Intraday => write!(f, "INTRADAY"),
        }
    }
}

/// 스크리닝 단계 하위 신호.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenSignals {
    /// 거래대금 (원)
    pub trading_value: Decimal,
    /// 거래대금 내림차순 순위 (1부터)
    pub rank: usize,
    /// 주도주 여부 (거래대금 1조 이상)
    pub dominant: bool,
}

/// 기술적 분석 단계 하위 신호.
///
/// `ma200_uptrend`는 점수에 반영되지 않는 감사용 보조 신호입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechnicalSignals {
    /// N일 신고가 돌파
    pub is_new_high: bool,
    /// 정배열 (ma5 > ma20 > ma60)
    pub is_aligned: bool,
    /// 200일선 상승 추세
    pub ma200_uptrend: bool,
    /// 외국인 순매수
    pub foreign_buying: bool,
    /// 기관 순매수
    pub institution_buying: bool,
}

/// 감성/VETO 단계 하위 신호.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SentimentSignals {
    /// 스캔한 뉴스 항목 수
    pub scanned_items: usize,
    /// 긍정 키워드 적중 수
    pub positive_hits: usize,
    /// 부정 키워드 적중 수
    pub negative_hits: usize,
    /// 매칭된 VETO 키워드
    pub veto_keywords: Vec<String>,
    /// 매칭된 VETO 카테고리
    pub veto_categories: Vec<String>,
    /// VETO가 발견된 원문 제목 (최대 5개)
    pub source_titles: Vec<String>,
}

/// 장중 V자 반등 단계 하위 신호.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntradaySignals {
    /// V자 패턴 감지 여부
    pub v_detected: bool,
    /// 고점 대비 하락률 (%)
    pub drop_pct: Decimal,
    /// 저점 대비 반등률 (%)
    pub rebound_pct: Decimal,
    /// 매수세 (최근 5봉 양봉 비율, %)
    pub buying_pressure: Decimal,
    /// 거래량 급증 여부
    pub volume_surge: bool,
    /// 저점 상승 지지 여부
    pub price_support: bool,
    /// 거래량 가중 모멘텀 (-100 ~ 100)
    pub momentum: Decimal,
}

/// 단계별로 태깅된 하위 신호.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum PhaseSignals {
    /// 스크리닝
    Screen(ScreenSignals),
    /// 기술적 분석
    Technical(TechnicalSignals),
    /// 감성/VETO
    Sentiment(SentimentSignals),
    /// 장중 분석
    Intraday(IntradaySignals),
}

/// 단일 스코어링 단계의 결과. 산출 이후 불변.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialScore {
    /// 단계
    pub phase: ScorePhase,
    /// 점수 (0 ~ 100)
    pub value: Decimal,
    /// 점수를 만든 하위 신호
    pub signals: PhaseSignals,
}

impl PartialScore {
    /// 점수를 [0, 100] 범위로 클램핑해 생성합니다.
    pub fn new(phase: ScorePhase, value: Decimal, signals: PhaseSignals) -> Self {
        Self {
            phase,
            value: value.clamp(Decimal::ZERO, dec!(100)),
            signals,
        }
    }
}

/// 앙상블 점수 기반 진입 등급.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryTier {
    /// 우선 진입 (비중 확대)
    Priority,
    /// 표준 진입
    Standard,
    /// 소액 진입 (비중 축소)
    Small,
    /// 진입 안함
    Skip,
}

impl EntryTier {
    /// 등급별 포지션 비중 배수.
    pub fn multiplier(&self) -> Decimal {
        match self {
            EntryTier::Priority => dec!(1.5),
            EntryTier::Standard => dec!(1.0),
            EntryTier::Small => dec!(0.5),
            EntryTier::Skip => Decimal::ZERO,
        }
    }
}

impl std::fmt::Display for EntryTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryTier::Priority => write!(f, "PRIORITY"),
            EntryTier::Standard => write!(f, "STANDARD"),
            EntryTier::Small => write!(f, "SMALL"),
            EntryTier::Skip => write!(f, "SKIP"),
        }
    }
}

/// 앙상블 종합 결과.
///
/// `vetoed`가 true면 `score`와 무관하게 진입이 거부됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleResult {
    /// 종목코드
    pub symbol: String,
    /// 종목명
    pub name: String,
    /// 가중 합산 점수 (0 ~ 100)
    pub score: Decimal,
    /// VETO 발동 여부 (점수 무관 절대 거부)
    pub vetoed: bool,
    /// 진입 등급
    pub entry_tier: EntryTier,
    /// 포지션 비중 (0 ~ max_weight_per_stock)
    pub weight: Decimal,
    /// 기여한 단계별 부분 점수
    pub partials: Vec<PartialScore>,
}

impl EnsembleResult {
    /// 진입 가능 여부 (VETO 없음 + SKIP 아님).
    pub fn approved(&self) -> bool {
        !self.vetoed && self.entry_tier != EntryTier::Skip
    }

    /// 특정 단계의 부분 점수 조회.
    pub fn partial(&self, phase: ScorePhase) -> Option<&PartialScore> {
        self.partials.iter().find(|p| p.phase == phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_score_clamps_to_valid_range() {
        let signals = PhaseSignals::Technical(TechnicalSignals {
            is_new_high: true,
            is_aligned: true,
            ma200_uptrend: true,
            foreign_buying: true,
            institution_buying: true,
        });

        let over = PartialScore::new(ScorePhase::Technical, dec!(130), signals.clone());
        assert_eq!(over.value, dec!(100));

        let under = PartialScore::new(ScorePhase::Technical, dec!(-5), signals);
        assert_eq!(under.value, Decimal::ZERO);
    }

    #[test]
    fn tier_multipliers() {
        assert_eq!(EntryTier::Priority.multiplier(), dec!(1.5));
        assert_eq!(EntryTier::Standard.multiplier(), dec!(1.0));
        assert_eq!(EntryTier::Small.multiplier(), dec!(0.5));
        assert_eq!(EntryTier::Skip.multiplier(), Decimal::ZERO);
    }
}
