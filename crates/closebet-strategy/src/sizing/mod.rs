//! 포지션 사이징.
//!
//! 사이저는 "자본 대비 기본 베팅 비율"만 결정합니다. 진입 등급 배수와
//! 종목당 상한 적용은 앙상블 쪽 책임입니다.

mod kelly;
mod rl_policy;

pub use kelly::KellyCriterion;
pub use rl_policy::QTablePolicy;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 최근 거래 통계. TradeHistory가 산출하는 읽기 전용 입력입니다.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TradeStats {
    /// 집계한 거래 수
    pub total_trades: usize,
    /// 수익 거래 수
    pub wins: usize,
    /// 손실 거래 수
    pub losses: usize,
    /// 승률 (0 ~ 1)
    pub win_rate: Decimal,
    /// 평균 수익률 (%, 수익 거래만)
    pub avg_win_pct: Decimal,
    /// 평균 손실률 (%, 손실 거래만, 음수)
    pub avg_loss_pct: Decimal,
}

/// 사이징 판단에 쓰이는 컨텍스트.
#[derive(Debug, Clone, Copy)]
pub struct SizingContext<'a> {
    /// 최근 거래 통계
    pub stats: &'a TradeStats,
    /// 후보의 앙상블 점수 (0 ~ 100)
    pub score: Decimal,
    /// 현재 연속 손실 횟수
    pub consecutive_losses: u32,
    /// 당일 누적 손익률 (%)
    pub daily_pnl_pct: Decimal,
}

/// 포지션 사이저 계약.
///
/// 입력만으로 결정되는 순수 조회여야 합니다 (학습 상태 갱신은 별도
/// 메서드로). 반환값은 자본 대비 비율 (0 ~ 1)입니다.
pub trait PositionSizer: Send + Sync {
    /// 기본 베팅 비율 산출.
    fn fraction(&self, ctx: &SizingContext<'_>) -> Decimal;
}
