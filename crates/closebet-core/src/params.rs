//! 전략 파라미터.
//!
//! 스코어링 파이프라인, 가드, 청산 상태머신이 쓰는 모든 튜닝 가능한
//! 임계값/가중치/시간 윈도우를 한 곳에 모읍니다. ParameterOptimizer가
//! 탐색하는 공간도 이 타입의 필드입니다.
//!
//! 기본값은 운영 검증된 원 전략 값입니다: 거래대금 2000억 플로어,
//! 기술 점수 70 통과, 손절 -3%, 분할 익절 33/33/34 (+2/+3/+5%),
//! 일일 최대 3회 진입, 3연패 쿨다운, 일일 손실 한도 -5%.

use chrono::NaiveTime;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 설정 오류. 프로세스 기동 시에만 치명적입니다.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// 파라미터 값이 유효 범위를 벗어남
    #[error("잘못된 파라미터: {0}")]
    Invalid(String),
}

/// 분할 익절 티어 사양 (설정용).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierSpec {
    /// 청산 비율 (0 ~ 1)
    pub ratio: Decimal,
    /// 트리거 수익률 (%)
    pub trigger_pct: Decimal,
}

/// 전략 파라미터 전체.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyParams {
    // === 스크리닝 ===
    /// 최소 거래대금 (원). 미만 종목은 무조건 제외.
    #[serde(default = "default_min_trading_value")]
    pub min_trading_value: Decimal,
    /// 주도주 기준 거래대금 (원)
    #[serde(default = "default_dominant_trading_value")]
    pub dominant_trading_value: Decimal,
    /// 상위 후보 종목 수
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    // === 기술적 분석 ===
    /// 신고가 기준 일수
    #[serde(default = "default_new_high_days")]
    pub new_high_days: usize,
    /// 기술 점수 통과 기준
    #[serde(default = "default_technical_pass_score")]
    pub technical_pass_score: Decimal,
    /// 200일선 추세 비교 기준 일수
    #[serde(default = "default_ma200_lookback_days")]
    pub ma200_lookback_days: usize,

    // === 장중 V자 반등 ===
    /// V자 최소 하락률 (%)
    #[serde(default = "default_min_drop_pct")]
    pub min_drop_pct: Decimal,
    /// V자 최소 반등률 (%)
    #[serde(default = "default_min_rebound_pct")]
    pub min_rebound_pct: Decimal,
    /// V자 신호 강도 진입 기준
    #[serde(default = "default_v_signal_threshold")]
    pub v_signal_threshold: Decimal,
    /// 장중 분석 윈도우 시작 (KST)
    #[serde(default = "default_intraday_window_start")]
    pub intraday_window_start: NaiveTime,
    /// 장중 분석 윈도우 종료 (KST)
    #[serde(default = "default_intraday_window_end")]
    pub intraday_window_end: NaiveTime,

    // === 앙상블 ===
    /// 스크리닝 단계 가중치
    #[serde(default = "default_weight_screen")]
    pub weight_screen: Decimal,
    /// 기술적 분석 단계 가중치
    #[serde(default = "default_weight_technical")]
    pub weight_technical: Decimal,
    /// 감성 단계 가중치
    #[serde(default = "default_weight_sentiment")]
    pub weight_sentiment: Decimal,
    /// 장중 분석 단계 가중치
    #[serde(default = "default_weight_intraday")]
    pub weight_intraday: Decimal,
    /// PRIORITY 등급 기준 점수
    #[serde(default = "default_tier_priority")]
    pub tier_priority_score: Decimal,
    /// STANDARD 등급 기준 점수
    #[serde(default = "default_tier_standard")]
    pub tier_standard_score: Decimal,
    /// SMALL 등급 기준 점수 (미만이면 SKIP)
    #[serde(default = "default_tier_small")]
    pub tier_small_score: Decimal,

    // === 포지션 사이징 ===
    /// 단일 종목 최대 비중 (0 ~ 1)
    #[serde(default = "default_max_weight_per_stock")]
    pub max_weight_per_stock: Decimal,
    /// 켈리 계산에 쓰는 최근 거래 수
    #[serde(default = "default_kelly_recent_trades")]
    pub kelly_recent_trades: usize,
    /// 반켈리 사용 여부
    #[serde(default = "default_use_half_kelly")]
    pub use_half_kelly: bool,
    /// 켈리 비율 상한
    #[serde(default = "default_kelly_max_fraction")]
    pub kelly_max_fraction: Decimal,

    // === 진입/청산 시간 윈도우 (KST) ===
    /// 진입 윈도우 시작
    #[serde(default = "default_entry_window_start")]
    pub entry_window_start: NaiveTime,
    /// 진입 윈도우 종료
    #[serde(default = "default_entry_window_end")]
    pub entry_window_end: NaiveTime,
    /// 장 시작 시각
    #[serde(default = "default_market_open")]
    pub market_open: NaiveTime,
    /// 시초가 돌파 확인 시간 (분)
    #[serde(default = "default_open_window_minutes")]
    pub open_window_minutes: u32,
    /// 강제 청산 시각
    #[serde(default = "default_time_fallback")]
    pub time_fallback: NaiveTime,

    // === 손절/익절 ===
    /// 고정 손절률 (%, 음수)
    #[serde(default = "default_stop_loss_pct")]
    pub stop_loss_pct: Decimal,
    /// 비상 청산 지수 등락률 기준 (%, 음수)
    #[serde(default = "default_emergency_index_drop_pct")]
    pub emergency_index_drop_pct: Decimal,
    /// 이동평균선 이탈 마진 (%)
    #[serde(default = "default_ma_break_margin_pct")]
    pub ma_break_margin_pct: Decimal,
    /// 분할 익절 티어 (트리거 오름차순)
    #[serde(default = "default_exit_tiers")]
    pub exit_tiers: Vec<TierSpec>,

    // === 리스크 가드 ===
    /// 일일 최대 진입 횟수
    #[serde(default = "default_max_entries_per_day")]
    pub max_entries_per_day: u32,
    /// 연속 손실 쿨다운 기준
    #[serde(default = "default_loss_streak_cooldown")]
    pub loss_streak_cooldown: u32,
    /// 일일 손실 한도 (%, 음수)
    #[serde(default = "default_daily_loss_floor_pct")]
    pub daily_loss_floor_pct: Decimal,
}

// 설정 기본값 함수들 (serde default용)
fn default_min_trading_value() -> Decimal {
    dec!(200_000_000_000)
}
fn default_dominant_trading_value() -> Decimal {
    dec!(1_000_000_000_000)
}
fn default_top_n() -> usize {
    5
}
fn default_new_high_days() -> usize {
    20
}
fn default_technical_pass_score() -> Decimal {
    dec!(70)
}
fn default_ma200_lookback_days() -> usize {
    20
}
fn default_min_drop_pct() -> Decimal {
    dec!(1.0)
}
fn default_min_rebound_pct() -> Decimal {
    dec!(0.5)
}
fn default_v_signal_threshold() -> Decimal {
    dec!(70)
}
fn default_intraday_window_start() -> NaiveTime {
    NaiveTime::from_hms_opt(15, 0, 0).unwrap()
}
fn default_intraday_window_end() -> NaiveTime {
    NaiveTime::from_hms_opt(15, 20, 0).unwrap()
}
fn default_weight_screen() -> Decimal {
    dec!(0.15)
}
fn default_weight_technical() -> Decimal {
    dec!(0.35)
}
fn default_weight_sentiment() -> Decimal {
    dec!(0.15)
}
fn default_weight_intraday() -> Decimal {
    dec!(0.35)
}
fn default_tier_priority() -> Decimal {
    dec!(70)
}
fn default_tier_standard() -> Decimal {
    dec!(55)
}
fn default_tier_small() -> Decimal {
    dec!(40)
}
fn default_max_weight_per_stock() -> Decimal {
    dec!(0.30)
}
fn default_kelly_recent_trades() -> usize {
    20
}
fn default_use_half_kelly() -> bool {
    true
}
fn default_kelly_max_fraction() -> Decimal {
    dec!(0.25)
}
fn default_entry_window_start() -> NaiveTime {
    NaiveTime::from_hms_opt(14, 30, 0).unwrap()
}
fn default_entry_window_end() -> NaiveTime {
    NaiveTime::from_hms_opt(15, 20, 0).unwrap()
}
fn default_market_open() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap()
}
fn default_open_window_minutes() -> u32 {
    3
}
fn default_time_fallback() -> NaiveTime {
    NaiveTime::from_hms_opt(10, 0, 0).unwrap()
}
fn default_stop_loss_pct() -> Decimal {
    dec!(-3.0)
}
fn default_emergency_index_drop_pct() -> Decimal {
    dec!(-2.0)
}
fn default_ma_break_margin_pct() -> Decimal {
    dec!(1.5)
}
fn default_exit_tiers() -> Vec<TierSpec> {
    vec![
        TierSpec {
            ratio: dec!(0.33),
            trigger_pct: dec!(2.0),
        },
        TierSpec {
            ratio: dec!(0.33),
            trigger_pct: dec!(3.0),
        },
        TierSpec {
            ratio: dec!(0.34),
            trigger_pct: dec!(5.0),
        },
    ]
}
fn default_max_entries_per_day() -> u32 {
    3
}
fn default_loss_streak_cooldown() -> u32 {
    3
}
fn default_daily_loss_floor_pct() -> Decimal {
    dec!(-5.0)
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            min_trading_value: default_min_trading_value(),
            dominant_trading_value: default_dominant_trading_value(),
            top_n: default_top_n(),
            new_high_days: default_new_high_days(),
            technical_pass_score: default_technical_pass_score(),
            ma200_lookback_days: default_ma200_lookback_days(),
            min_drop_pct: default_min_drop_pct(),
            min_rebound_pct: default_min_rebound_pct(),
            v_signal_threshold: default_v_signal_threshold(),
            intraday_window_start: default_intraday_window_start(),
            intraday_window_end: default_intraday_window_end(),
            weight_screen: default_weight_screen(),
            weight_technical: default_weight_technical(),
            weight_sentiment: default_weight_sentiment(),
            weight_intraday: default_weight_intraday(),
            tier_priority_score: default_tier_priority(),
            tier_standard_score: default_tier_standard(),
            tier_small_score: default_tier_small(),
            max_weight_per_stock: default_max_weight_per_stock(),
            kelly_recent_trades: default_kelly_recent_trades(),
            use_half_kelly: default_use_half_kelly(),
            kelly_max_fraction: default_kelly_max_fraction(),
            entry_window_start: default_entry_window_start(),
            entry_window_end: default_entry_window_end(),
            market_open: default_market_open(),
            open_window_minutes: default_open_window_minutes(),
            time_fallback: default_time_fallback(),
            stop_loss_pct: default_stop_loss_pct(),
            emergency_index_drop_pct: default_emergency_index_drop_pct(),
            ma_break_margin_pct: default_ma_break_margin_pct(),
            exit_tiers: default_exit_tiers(),
            max_entries_per_day: default_max_entries_per_day(),
            loss_streak_cooldown: default_loss_streak_cooldown(),
            daily_loss_floor_pct: default_daily_loss_floor_pct(),
        }
    }
}

impl StrategyParams {
    /// 최소 거래대금 설정.
    pub fn with_min_trading_value(mut self, value: Decimal) -> Self {
        self.min_trading_value = value;
        self
    }

    /// 후보 종목 수 설정.
    pub fn with_top_n(mut self, n: usize) -> Self {
        self.top_n = n;
        self
    }

    /// V자 신호 기준 설정.
    pub fn with_v_signal_threshold(mut self, threshold: Decimal) -> Self {
        self.v_signal_threshold = threshold;
        self
    }

    /// 고정 손절률 설정 (음수).
    pub fn with_stop_loss_pct(mut self, pct: Decimal) -> Self {
        self.stop_loss_pct = pct;
        self
    }

    /// 분할 익절 티어 설정.
    pub fn with_exit_tiers(mut self, tiers: Vec<TierSpec>) -> Self {
        self.exit_tiers = tiers;
        self
    }

    /// 일일 최대 진입 횟수 설정.
    pub fn with_max_entries_per_day(mut self, max: u32) -> Self {
        self.max_entries_per_day = max;
        self
    }

    /// 파라미터 정합성 검증.
    ///
    /// 실패는 기동 시에만 치명적입니다. 판단 루프 안에서는 이미 검증된
    /// 파라미터만 돕니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_n == 0 {
            return Err(ConfigError::Invalid("top_n은 1 이상이어야 합니다".into()));
        }
        if self.min_trading_value <= Decimal::ZERO {
            return Err(ConfigError::Invalid(
                "min_trading_value는 0보다 커야 합니다".into(),
            ));
        }

        let weight_sum =
            self.weight_screen + self.weight_technical + self.weight_sentiment + self.weight_intraday;
        if weight_sum != Decimal::ONE {
            return Err(ConfigError::Invalid(format!(
                "앙상블 가중치 합은 1이어야 합니다 (현재 {})",
                weight_sum
            )));
        }

        if !(self.tier_priority_score >= self.tier_standard_score
            && self.tier_standard_score >= self.tier_small_score)
        {
            return Err(ConfigError::Invalid(
                "진입 등급 기준은 priority ≥ standard ≥ small 순이어야 합니다".into(),
            ));
        }

        if self.stop_loss_pct >= Decimal::ZERO {
            return Err(ConfigError::Invalid(
                "stop_loss_pct는 음수여야 합니다".into(),
            ));
        }
        if self.daily_loss_floor_pct >= Decimal::ZERO {
            return Err(ConfigError::Invalid(
                "daily_loss_floor_pct는 음수여야 합니다".into(),
            ));
        }

        if self.exit_tiers.is_empty() {
            return Err(ConfigError::Invalid(
                "exit_tiers는 최소 1개 티어가 필요합니다".into(),
            ));
        }
        let ratio_sum: Decimal = self.exit_tiers.iter().map(|t| t.ratio).sum();
        if ratio_sum > Decimal::ONE {
            return Err(ConfigError::Invalid(format!(
                "티어 비율 합은 100%를 넘을 수 없습니다 (현재 {})",
                ratio_sum
            )));
        }
        let ascending = self
            .exit_tiers
            .windows(2)
            .all(|w| w[0].trigger_pct < w[1].trigger_pct);
        if !ascending {
            return Err(ConfigError::Invalid(
                "티어 트리거는 오름차순이어야 합니다".into(),
            ));
        }

        if self.max_weight_per_stock <= Decimal::ZERO || self.max_weight_per_stock > Decimal::ONE {
            return Err(ConfigError::Invalid(
                "max_weight_per_stock은 (0, 1] 범위여야 합니다".into(),
            ));
        }

        if self.entry_window_start >= self.entry_window_end {
            return Err(ConfigError::Invalid(
                "진입 윈도우가 비어 있습니다".into(),
            ));
        }
        if self.market_open >= self.time_fallback {
            return Err(ConfigError::Invalid(
                "강제 청산 시각은 장 시작 이후여야 합니다".into(),
            ));
        }

        Ok(())
    }

    /// 청산 시 마지막 티어의 목표 수익률 (%).
    pub fn target_profit_pct(&self) -> Decimal {
        self.exit_tiers
            .last()
            .map(|t| t.trigger_pct)
            .unwrap_or(Decimal::ZERO)
    }
}
