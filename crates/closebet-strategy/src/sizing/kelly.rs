//! 켈리 공식 사이저.
//!
//! f = (p·b - q) / b. 거래 데이터가 부족하거나 승률이 낮으면 공식
//! 대신 고정 폴백 비율을 씁니다.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use closebet_core::StrategyParams;

use super::{PositionSizer, SizingContext};

/// 켈리 공식을 적용하는 최소 거래 수.
const MIN_TRADES: usize = 10;
/// 켈리 공식을 적용하는 최소 승률.
const MIN_WIN_RATE: Decimal = dec!(0.4);
/// 데이터 부족 시 폴백 비율.
const FALLBACK_FRACTION: Decimal = dec!(0.10);
/// 저승률/음수 기댓값 시 최소 비율.
const FLOOR_FRACTION: Decimal = dec!(0.05);

/// 켈리 공식 계산기.
#[derive(Debug, Clone)]
pub struct KellyCriterion {
    use_half_kelly: bool,
    max_fraction: Decimal,
}

impl KellyCriterion {
    pub fn new(params: &StrategyParams) -> Self {
        Self {
            use_half_kelly: params.use_half_kelly,
            max_fraction: params.kelly_max_fraction,
        }
    }
}

impl PositionSizer for KellyCriterion {
    fn fraction(&self, ctx: &SizingContext<'_>) -> Decimal {
        let stats = ctx.stats;

        if stats.total_trades < MIN_TRADES {
            debug!(trades = stats.total_trades, "거래 데이터 부족, 폴백 비율");
            return FALLBACK_FRACTION;
        }

        let p = stats.win_rate;
        if p < MIN_WIN_RATE {
            debug!(win_rate = %p, "낮은 승률, 최소 비율");
            return FLOOR_FRACTION;
        }

        let avg_win = stats.avg_win_pct / dec!(100);
        let avg_loss = (stats.avg_loss_pct / dec!(100)).abs();

        // 전 거래 이익이면 손실률이 0이라 b가 정의되지 않음
        if avg_loss.is_zero() {
            return self.max_fraction;
        }

        let q = Decimal::ONE - p;
        let b = avg_win / avg_loss;
        let mut kelly = (p * b - q) / b;

        if kelly <= Decimal::ZERO {
            debug!(kelly = %kelly, "음수 기댓값, 최소 비율");
            return FLOOR_FRACTION;
        }

        if self.use_half_kelly {
            kelly /= dec!(2);
        }
        let fraction = kelly.min(self.max_fraction);

        debug!(
            win_rate = %p,
            b = %b,
            fraction = %fraction,
            "켈리 비율 산출"
        );
        fraction
    }
}

#[cfg(test)]
mod tests {
    use super::super::TradeStats;
    use super::*;

    fn ctx(stats: &TradeStats) -> SizingContext<'_> {
        SizingContext {
            stats,
            score: dec!(60),
            consecutive_losses: 0,
            daily_pnl_pct: Decimal::ZERO,
        }
    }

    fn stats(total: usize, win_rate: Decimal, avg_win: Decimal, avg_loss: Decimal) -> TradeStats {
        TradeStats {
            total_trades: total,
            wins: 0,
            losses: 0,
            win_rate,
            avg_win_pct: avg_win,
            avg_loss_pct: avg_loss,
        }
    }

    #[test]
    fn few_trades_fall_back_to_ten_percent() {
        let sizer = KellyCriterion::new(&StrategyParams::default());
        let stats = stats(5, dec!(0.8), dec!(3.0), dec!(-2.0));
        assert_eq!(sizer.fraction(&ctx(&stats)), dec!(0.10));
    }

    #[test]
    fn low_win_rate_uses_floor() {
        let sizer = KellyCriterion::new(&StrategyParams::default());
        let stats = stats(20, dec!(0.3), dec!(3.0), dec!(-2.0));
        assert_eq!(sizer.fraction(&ctx(&stats)), dec!(0.05));
    }

    #[test]
    fn negative_expectancy_uses_floor() {
        let sizer = KellyCriterion::new(&StrategyParams::default());
        // p=0.45, b=1.0 → f = 0.45 - 0.55 < 0
        let stats = stats(20, dec!(0.45), dec!(2.0), dec!(-2.0));
        assert_eq!(sizer.fraction(&ctx(&stats)), dec!(0.05));
    }

    #[test]
    fn half_kelly_halves_raw_fraction() {
        let sizer = KellyCriterion::new(&StrategyParams::default());
        // p=0.6, q=0.4, b=1.5 → f = (0.9-0.4)/1.5 = 1/3, half → ~0.1667
        let stats = stats(20, dec!(0.6), dec!(3.0), dec!(-2.0));
        let fraction = sizer.fraction(&ctx(&stats));
        assert!(fraction > dec!(0.16) && fraction < dec!(0.17));
    }

    #[test]
    fn fraction_is_capped_at_max() {
        let sizer = KellyCriterion::new(&StrategyParams::default());
        // 매우 유리한 통계라도 상한 0.25를 넘지 않음
        let stats = stats(30, dec!(0.9), dec!(8.0), dec!(-1.0));
        assert_eq!(sizer.fraction(&ctx(&stats)), dec!(0.25));
    }

    #[test]
    fn all_wins_use_max_fraction() {
        let sizer = KellyCriterion::new(&StrategyParams::default());
        let stats = stats(15, dec!(1.0), dec!(4.0), Decimal::ZERO);
        assert_eq!(sizer.fraction(&ctx(&stats)), dec!(0.25));
    }
}
