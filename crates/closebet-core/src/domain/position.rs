//! 포지션과 거래 기록.
//!
//! `Position`은 PositionLedger가 단독 소유하며, 청산 상태머신의 결정을
//! 통해서만 변경됩니다. `TradeRecord`는 기록 이후 불변(append-only)입니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 청산 사유. 청산 상태머신의 트리거 종류와 1:1 대응합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// 비상 청산 (지수 급락)
    Emergency,
    /// 가격 손절 (진입가 대비 고정 손절률)
    StopLoss,
    /// 이동평균선 이탈
    MaBreak,
    /// 시초가 미돌파 (3분 룰)
    OpenWindow,
    /// 시간 마감 (10시 강제 청산)
    TimeFallback,
    /// 분할 익절 (n차 티어)
    TakeProfitTier(u8),
    /// 백테스트 종료 시 잔여 포지션 정리
    EndOfReplay,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::Emergency => write!(f, "EMERGENCY"),
            ExitReason::StopLoss => write!(f, "PRICE_STOP"),
            ExitReason::MaBreak => write!(f, "MA_BREAK"),
            ExitReason::OpenWindow => write!(f, "OPEN_WINDOW"),
            ExitReason::TimeFallback => write!(f, "TIMEOUT"),
            ExitReason::TakeProfitTier(n) => write!(f, "TAKE_PROFIT_T{}", n),
            ExitReason::EndOfReplay => write!(f, "END_OF_REPLAY"),
        }
    }
}

/// 분할 익절 티어.
///
/// 각 티어는 최대 한 번만 소비되며, 정의된 순서(낮은 트리거부터)로
/// 소비됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExitTier {
    /// 청산 비율 (0 ~ 1, 진입 수량 기준)
    pub ratio: Decimal,
    /// 트리거 수익률 (%, 진입가 대비)
    pub trigger_pct: Decimal,
    /// 소비 여부
    pub consumed: bool,
}

impl ExitTier {
    /// 미소비 티어를 생성합니다.
    pub fn new(ratio: Decimal, trigger_pct: Decimal) -> Self {
        Self {
            ratio,
            trigger_pct,
            consumed: false,
        }
    }

    /// 진입가 기준 트리거 가격.
    pub fn trigger_price(&self, entry_price: Decimal) -> Decimal {
        entry_price * (Decimal::ONE + self.trigger_pct / dec!(100))
    }
}

/// 보유 포지션.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// 포지션 ID
    pub id: Uuid,
    /// 종목코드
    pub symbol: String,
    /// 종목명
    pub name: String,
    /// 진입가
    pub entry_price: Decimal,
    /// 진입 시각 (UTC)
    pub entry_time: DateTime<Utc>,
    /// 진입 수량 (주)
    pub quantity: Decimal,
    /// 잔여 수량 (주)
    pub remaining_quantity: Decimal,
    /// 분할 익절 티어 (트리거 오름차순)
    pub tiers: Vec<ExitTier>,
    /// 손절 가격
    pub stop_loss_price: Decimal,
    /// 목표 가격 (최종 티어 트리거)
    pub target_price: Decimal,
}

impl Position {
    /// 소비된 티어 비율 합계.
    pub fn consumed_ratio(&self) -> Decimal {
        self.tiers
            .iter()
            .filter(|t| t.consumed)
            .map(|t| t.ratio)
            .sum()
    }

    /// 가장 낮은 미소비 티어의 인덱스.
    pub fn next_tier_index(&self) -> Option<usize> {
        self.tiers.iter().position(|t| !t.consumed)
    }

    /// 전량 청산 완료 여부.
    pub fn is_closed(&self) -> bool {
        self.remaining_quantity <= Decimal::ZERO
    }

    /// 현재가 기준 수익률 (%).
    pub fn pnl_pct(&self, current_price: Decimal) -> Decimal {
        if self.entry_price.is_zero() {
            return Decimal::ZERO;
        }
        (current_price - self.entry_price) / self.entry_price * dec!(100)
    }
}

/// 완결된 거래 기록. 기록 이후 불변.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// 기록 ID
    pub id: Uuid,
    /// 포지션 ID
    pub position_id: Uuid,
    /// 종목코드
    pub symbol: String,
    /// 종목명
    pub name: String,
    /// 진입가
    pub entry_price: Decimal,
    /// 청산가
    pub exit_price: Decimal,
    /// 청산 수량 (주)
    pub quantity: Decimal,
    /// 진입 시각 (UTC)
    pub entry_time: DateTime<Utc>,
    /// 청산 시각 (UTC)
    pub exit_time: DateTime<Utc>,
    /// 실현 손익 (원)
    pub pnl: Decimal,
    /// 실현 수익률 (%)
    pub pnl_pct: Decimal,
    /// 보유 시간 (분)
    pub holding_minutes: i64,
    /// 청산 사유
    pub exit_reason: ExitReason,
}

impl TradeRecord {
    /// 수익 거래 여부.
    pub fn is_win(&self) -> bool {
        self.pnl > Decimal::ZERO
    }

    /// 손실 거래 여부.
    pub fn is_loss(&self) -> bool {
        self.pnl < Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_position() -> Position {
        Position {
            id: Uuid::new_v4(),
            symbol: "005930".to_string(),
            name: "삼성전자".to_string(),
            entry_price: dec!(10000),
            entry_time: Utc::now(),
            quantity: dec!(30),
            remaining_quantity: dec!(30),
            tiers: vec![
                ExitTier::new(dec!(0.33), dec!(2.0)),
                ExitTier::new(dec!(0.33), dec!(3.0)),
                ExitTier::new(dec!(0.34), dec!(5.0)),
            ],
            stop_loss_price: dec!(9700),
            target_price: dec!(10500),
        }
    }

    #[test]
    fn tier_trigger_price_from_entry() {
        let tier = ExitTier::new(dec!(0.33), dec!(2.0));
        assert_eq!(tier.trigger_price(dec!(10000)), dec!(10200));
    }

    #[test]
    fn consumed_ratio_tracks_tiers_in_order() {
        let mut pos = sample_position();
        assert_eq!(pos.consumed_ratio(), Decimal::ZERO);
        assert_eq!(pos.next_tier_index(), Some(0));

        pos.tiers[0].consumed = true;
        assert_eq!(pos.consumed_ratio(), dec!(0.33));
        assert_eq!(pos.next_tier_index(), Some(1));

        pos.tiers[1].consumed = true;
        pos.tiers[2].consumed = true;
        assert_eq!(pos.consumed_ratio(), dec!(1.00));
        assert_eq!(pos.next_tier_index(), None);
    }

    #[test]
    fn pnl_pct_against_entry() {
        let pos = sample_position();
        assert_eq!(pos.pnl_pct(dec!(10300)), dec!(3));
        assert_eq!(pos.pnl_pct(dec!(9700)), dec!(-3));
    }
}
