//! 청산 상태머신.
//!
//! 우선순위가 고정된 규칙 집합을 위에서부터 스캔해 첫 매칭에서
//! 멈춥니다. 순서는 닫혀 있고 변경 불가입니다:
//!
//! 1. 비상 청산 (지수 급락)
//! 2. 가격 손절
//! 3. 이동평균선 이탈
//! 4. 시초가 미돌파 (3분 룰)
//! 5. 시간 마감 (10시 강제 청산)
//! 6. 분할 익절 (손절류보다 항상 낮은 우선순위)
//!
//! 평가 자체는 순수 함수이며 포지션을 변경하지 않습니다. 실제 수량
//! 차감은 PositionLedger가 수행합니다.

use chrono::NaiveTime;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use closebet_core::clock::kst_time;
use closebet_core::{ExitReason, MinuteBar, Position, StrategyParams};

/// EMA 기간 (분).
const EMA_PERIOD: usize = 20;

/// 한 틱의 청산 평가 입력.
#[derive(Debug, Clone)]
pub struct ExitContext<'a> {
    /// 현재 KST 시각
    pub now_kst: NaiveTime,
    /// 현재가
    pub current_price: Decimal,
    /// 시장 지수(코스피) 등락률 (%)
    pub index_change_pct: Decimal,
    /// 당일 시초가
    pub open_price: Decimal,
    /// 당일 분봉 (최신 순)
    pub minute_bars: &'a [MinuteBar],
}

/// 청산 판정. 틱당 정확히 하나.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExitDecision {
    /// 보유 유지
    Hold,
    /// 전량 청산
    FullClose { reason: ExitReason },
    /// 분할 익절. `last`면 잔량 전체를 쓸어 담습니다.
    TierClose {
        tier_index: usize,
        ratio: Decimal,
        last: bool,
        reason: ExitReason,
    },
}

/// 청산 상태머신.
#[derive(Debug, Clone)]
pub struct ExitStateMachine {
    emergency_index_drop_pct: Decimal,
    ma_break_margin_pct: Decimal,
    market_open: NaiveTime,
    open_window_minutes: u32,
    time_fallback: NaiveTime,
}

impl ExitStateMachine {
    pub fn new(params: &StrategyParams) -> Self {
        Self {
            emergency_index_drop_pct: params.emergency_index_drop_pct,
            ma_break_margin_pct: params.ma_break_margin_pct,
            market_open: params.market_open,
            open_window_minutes: params.open_window_minutes,
            time_fallback: params.time_fallback,
        }
    }

    /// 규칙 집합을 우선순위 순서로 평가합니다.
    pub fn evaluate(&self, position: &Position, ctx: &ExitContext<'_>) -> ExitDecision {
        // 1. 비상 청산
        if ctx.index_change_pct <= self.emergency_index_drop_pct {
            debug!(
                symbol = %position.symbol,
                index_change = %ctx.index_change_pct,
                "비상 청산"
            );
            return ExitDecision::FullClose {
                reason: ExitReason::Emergency,
            };
        }

        // 2. 가격 손절
        if ctx.current_price <= position.stop_loss_price {
            debug!(
                symbol = %position.symbol,
                price = %ctx.current_price,
                stop = %position.stop_loss_price,
                "가격 손절"
            );
            return ExitDecision::FullClose {
                reason: ExitReason::StopLoss,
            };
        }

        // 3. 이동평균선 이탈
        if self.is_ma_break(ctx) {
            debug!(symbol = %position.symbol, "이평선 이탈 청산");
            return ExitDecision::FullClose {
                reason: ExitReason::MaBreak,
            };
        }

        // 4. 시초가 미돌파 (3분 룰)
        if self.is_open_window_fail(ctx) {
            debug!(symbol = %position.symbol, "시초가 미돌파 청산");
            return ExitDecision::FullClose {
                reason: ExitReason::OpenWindow,
            };
        }

        // 5. 시간 마감
        if ctx.now_kst >= self.time_fallback {
            debug!(symbol = %position.symbol, "강제 청산 시각 도달");
            return ExitDecision::FullClose {
                reason: ExitReason::TimeFallback,
            };
        }

        // 6. 분할 익절. 낮은 트리거의 미소비 티어부터, 틱당 한 티어만.
        if let Some(idx) = position.next_tier_index() {
            let tier = &position.tiers[idx];
            if ctx.current_price >= tier.trigger_price(position.entry_price) {
                let last = idx == position.tiers.len() - 1;
                debug!(
                    symbol = %position.symbol,
                    tier = idx + 1,
                    price = %ctx.current_price,
                    last,
                    "분할 익절"
                );
                return ExitDecision::TierClose {
                    tier_index: idx,
                    ratio: tier.ratio,
                    last,
                    reason: ExitReason::TakeProfitTier(idx as u8 + 1),
                };
            }
        }

        ExitDecision::Hold
    }

    /// 1분봉 EMA-20 대비 마진 이상 이탈 여부. 분봉 20개 미만이면
    /// 판단하지 않고 보유합니다.
    fn is_ma_break(&self, ctx: &ExitContext<'_>) -> bool {
        if ctx.minute_bars.len() < EMA_PERIOD {
            return false;
        }
        let ema = ema_20(ctx.minute_bars);
        if ema.is_zero() {
            return false;
        }
        let distance_pct = (ctx.current_price - ema) / ema * dec!(100);
        distance_pct < -self.ma_break_margin_pct
    }

    /// 장 시작 후 확인 시간이 지났는데 첫 3분 구간의 고가가 시초가를
    /// 넘지 못했는지 여부.
    fn is_open_window_fail(&self, ctx: &ExitContext<'_>) -> bool {
        let deadline = self.market_open + chrono::Duration::minutes(self.open_window_minutes as i64);
        if ctx.now_kst < deadline {
            return false;
        }

        let broke_out = ctx
            .minute_bars
            .iter()
            .filter(|bar| {
                let t = kst_time(bar.timestamp);
                t >= self.market_open && t < deadline
            })
            .any(|bar| bar.high > ctx.open_price);
        !broke_out
    }
}

/// 최근 20개 분봉 종가의 지수이동평균. SMA로 시드한 뒤 과거에서
/// 현재 방향으로 갱신합니다.
fn ema_20(bars: &[MinuteBar]) -> Decimal {
    let window = &bars[..EMA_PERIOD];
    let sma: Decimal =
        window.iter().map(|b| b.close).sum::<Decimal>() / Decimal::from(EMA_PERIOD as u64);

    let multiplier = dec!(2) / Decimal::from((EMA_PERIOD + 1) as u64);
    let mut ema = sma;
    for bar in window.iter().rev() {
        ema = bar.close * multiplier + ema * (Decimal::ONE - multiplier);
    }
    ema
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use chrono_tz::Asia::Seoul;
    use uuid::Uuid;

    use closebet_core::ExitTier;

    fn machine() -> ExitStateMachine {
        ExitStateMachine::new(&StrategyParams::default())
    }

    fn position(entry: Decimal) -> Position {
        Position {
            id: Uuid::new_v4(),
            symbol: "005930".to_string(),
            name: "삼성전자".to_string(),
            entry_price: entry,
            entry_time: Seoul
                .from_local_datetime(
                    &NaiveDate::from_ymd_opt(2025, 6, 27)
                        .unwrap()
                        .and_hms_opt(15, 10, 0)
                        .unwrap(),
                )
                .unwrap()
                .with_timezone(&chrono::Utc),
            quantity: dec!(30),
            remaining_quantity: dec!(30),
            tiers: vec![
                ExitTier::new(dec!(0.33), dec!(2.0)),
                ExitTier::new(dec!(0.33), dec!(3.0)),
                ExitTier::new(dec!(0.34), dec!(5.0)),
            ],
            stop_loss_price: entry * dec!(0.97),
            target_price: entry * dec!(1.05),
        }
    }

    /// KST 시각의 분봉 하나.
    fn bar_at(hour: u32, minute: u32, high: Decimal, close: Decimal) -> MinuteBar {
        let local = NaiveDate::from_ymd_opt(2025, 6, 30)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap();
        MinuteBar {
            timestamp: Seoul
                .from_local_datetime(&local)
                .unwrap()
                .with_timezone(&chrono::Utc),
            open: close,
            high,
            low: close,
            close,
            volume: dec!(10000),
        }
    }

    /// 시초가 돌파에 성공한 아침 분봉 (최신 순).
    fn breakout_bars(level: Decimal) -> Vec<MinuteBar> {
        vec![
            bar_at(9, 4, level, level),
            bar_at(9, 2, level * dec!(1.01), level),
            bar_at(9, 1, level, level),
            bar_at(9, 0, level, level),
        ]
    }

    fn ctx<'a>(
        now: NaiveTime,
        price: Decimal,
        index_change: Decimal,
        bars: &'a [MinuteBar],
    ) -> ExitContext<'a> {
        ExitContext {
            now_kst: now,
            current_price: price,
            index_change_pct: index_change,
            open_price: dec!(10000),
            minute_bars: bars,
        }
    }

    fn morning() -> NaiveTime {
        NaiveTime::from_hms_opt(9, 30, 0).unwrap()
    }

    #[test]
    fn emergency_beats_everything() {
        let pos = position(dec!(10000));
        let bars = breakout_bars(dec!(10100));
        // 익절 트리거도 동시에 충족되는 가격
        let decision = machine().evaluate(&pos, &ctx(morning(), dec!(10300), dec!(-2.5), &bars));
        assert_eq!(
            decision,
            ExitDecision::FullClose {
                reason: ExitReason::Emergency
            }
        );
    }

    #[test]
    fn stop_loss_at_three_percent_below_entry() {
        let pos = position(dec!(10000));
        let bars = breakout_bars(dec!(10100));

        let decision = machine().evaluate(&pos, &ctx(morning(), dec!(9700), dec!(0.5), &bars));
        assert_eq!(
            decision,
            ExitDecision::FullClose {
                reason: ExitReason::StopLoss
            }
        );

        // 손절선 바로 위는 보유
        let decision = machine().evaluate(&pos, &ctx(morning(), dec!(9701), dec!(0.5), &bars));
        assert_eq!(decision, ExitDecision::Hold);
    }

    #[test]
    fn stop_loss_beats_take_profit_tier() {
        // 손절선과 익절 티어가 동시에 걸리도록 구성된 포지션
        let mut pos = position(dec!(10000));
        pos.stop_loss_price = dec!(10200);

        let bars = breakout_bars(dec!(10100));
        let decision = machine().evaluate(&pos, &ctx(morning(), dec!(10200), dec!(0.5), &bars));
        assert_eq!(
            decision,
            ExitDecision::FullClose {
                reason: ExitReason::StopLoss
            }
        );
    }

    #[test]
    fn ma_break_closes_position() {
        let pos = position(dec!(10000));
        // EMA-20 약 10000 수준의 평평한 분봉 + 현재가 대폭 이탈
        let mut bars: Vec<MinuteBar> = (0..20u32)
            .map(|i| bar_at(9, 25 - i, dec!(10000), dec!(10000)))
            .collect();
        bars.extend(breakout_bars(dec!(10100)));

        let decision = machine().evaluate(&pos, &ctx(morning(), dec!(9800), dec!(0.5), &bars));
        assert_eq!(
            decision,
            ExitDecision::FullClose {
                reason: ExitReason::MaBreak
            }
        );
    }

    #[test]
    fn few_minute_bars_skip_ma_rule() {
        let pos = position(dec!(10000));
        let bars = breakout_bars(dec!(10100));

        // 분봉 4개뿐이라 이평선 판단 없이 보유
        let decision = machine().evaluate(&pos, &ctx(morning(), dec!(9800), dec!(0.5), &bars));
        assert_eq!(decision, ExitDecision::Hold);
    }

    #[test]
    fn open_window_failure_closes_after_deadline() {
        let pos = position(dec!(10000));
        // 첫 3분 고가가 시초가(10000)를 넘지 못함
        let bars = vec![
            bar_at(9, 4, dec!(9990), dec!(9980)),
            bar_at(9, 2, dec!(9995), dec!(9985)),
            bar_at(9, 1, dec!(9990), dec!(9980)),
            bar_at(9, 0, dec!(9985), dec!(9975)),
        ];

        let after_deadline = NaiveTime::from_hms_opt(9, 3, 0).unwrap();
        let decision =
            machine().evaluate(&pos, &ctx(after_deadline, dec!(9980), dec!(0.5), &bars));
        assert_eq!(
            decision,
            ExitDecision::FullClose {
                reason: ExitReason::OpenWindow
            }
        );

        // 마감 전에는 판단 보류
        let before_deadline = NaiveTime::from_hms_opt(9, 2, 0).unwrap();
        let decision =
            machine().evaluate(&pos, &ctx(before_deadline, dec!(9980), dec!(0.5), &bars));
        assert_eq!(decision, ExitDecision::Hold);
    }

    #[test]
    fn breakout_within_window_holds() {
        let pos = position(dec!(10000));
        let bars = breakout_bars(dec!(10100));

        let after_deadline = NaiveTime::from_hms_opt(9, 5, 0).unwrap();
        let decision =
            machine().evaluate(&pos, &ctx(after_deadline, dec!(10050), dec!(0.5), &bars));
        assert_eq!(decision, ExitDecision::Hold);
    }

    #[test]
    fn time_fallback_closes_at_ten() {
        let pos = position(dec!(10000));
        let bars = breakout_bars(dec!(10100));

        let ten = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        let decision = machine().evaluate(&pos, &ctx(ten, dec!(10050), dec!(0.5), &bars));
        assert_eq!(
            decision,
            ExitDecision::FullClose {
                reason: ExitReason::TimeFallback
            }
        );
    }

    #[test]
    fn lowest_unconsumed_tier_fires_first() {
        let pos = position(dec!(10000));
        let bars = breakout_bars(dec!(10100));

        // +5% 가격이어도 1차 티어부터 소비
        let decision = machine().evaluate(&pos, &ctx(morning(), dec!(10500), dec!(0.5), &bars));
        assert_eq!(
            decision,
            ExitDecision::TierClose {
                tier_index: 0,
                ratio: dec!(0.33),
                last: false,
                reason: ExitReason::TakeProfitTier(1),
            }
        );
    }

    #[test]
    fn last_tier_sweeps_remainder() {
        let mut pos = position(dec!(10000));
        pos.tiers[0].consumed = true;
        pos.tiers[1].consumed = true;
        pos.remaining_quantity = dec!(10);

        let bars = breakout_bars(dec!(10100));
        let decision = machine().evaluate(&pos, &ctx(morning(), dec!(10500), dec!(0.5), &bars));
        assert_eq!(
            decision,
            ExitDecision::TierClose {
                tier_index: 2,
                ratio: dec!(0.34),
                last: true,
                reason: ExitReason::TakeProfitTier(3),
            }
        );
    }

    #[test]
    fn below_first_trigger_holds() {
        let pos = position(dec!(10000));
        let bars = breakout_bars(dec!(10100));

        let decision = machine().evaluate(&pos, &ctx(morning(), dec!(10100), dec!(0.5), &bars));
        assert_eq!(decision, ExitDecision::Hold);
    }
}
