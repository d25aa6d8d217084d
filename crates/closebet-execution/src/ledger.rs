//! 포지션 원장.
//!
//! 현금과 포지션의 단일 소유자입니다. 진입은 비중 기반 수량 산정과
//! 현금 차감을 원자적으로 수행하고, 주문 거부 시 `rollback_open`으로
//! 되돌립니다. 분할 청산의 실현 금액을 추적해 전량 청산 시점에
//! 가중 평균 청산가로 단일 TradeRecord를 만듭니다.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, info};
use uuid::Uuid;

use closebet_core::{ExitReason, ExitTier, Position, StrategyParams, TradeRecord};

use crate::error::LedgerError;

/// 보유 중인 포지션과 분할 청산 실현 내역.
#[derive(Debug, Clone)]
struct OpenLot {
    position: Position,
    /// 분할 청산으로 실현된 매도 대금 합계
    realized_value: Decimal,
}

/// 포지션 원장.
#[derive(Debug, Clone)]
pub struct PositionLedger {
    cash: Decimal,
    lots: HashMap<Uuid, OpenLot>,
}

impl PositionLedger {
    pub fn new(initial_cash: Decimal) -> Self {
        Self {
            cash: initial_cash,
            lots: HashMap::new(),
        }
    }

    /// 가용 현금.
    pub fn cash(&self) -> Decimal {
        self.cash
    }

    /// 열린 포지션 ID 목록.
    pub fn position_ids(&self) -> Vec<Uuid> {
        self.lots.keys().copied().collect()
    }

    /// 포지션 조회.
    pub fn position(&self, id: Uuid) -> Option<&Position> {
        self.lots.get(&id).map(|lot| &lot.position)
    }

    /// 열린 포지션 목록.
    pub fn positions(&self) -> Vec<&Position> {
        self.lots.values().map(|lot| &lot.position).collect()
    }

    /// 현금 + 보유 평가액. 시세가 없는 종목은 진입가로 평가합니다.
    pub fn equity(&self, prices: &HashMap<String, Decimal>) -> Decimal {
        let holdings: Decimal = self
            .lots
            .values()
            .map(|lot| {
                let price = prices
                    .get(&lot.position.symbol)
                    .copied()
                    .unwrap_or(lot.position.entry_price);
                lot.position.remaining_quantity * price
            })
            .sum();
        self.cash + holdings
    }

    /// 포지션 개설.
    ///
    /// 수량 = ⌊현금 × 비중 / 가격⌋. 1주도 못 사면 ZeroQuantity.
    /// 현금은 즉시 차감됩니다. 주문이 거부되면 `rollback_open`으로
    /// 되돌려야 합니다.
    pub fn open(
        &mut self,
        symbol: &str,
        name: &str,
        weight: Decimal,
        price: Decimal,
        time: DateTime<Utc>,
        params: &StrategyParams,
    ) -> Result<Position, LedgerError> {
        let budget = self.cash * weight;
        let quantity = (budget / price).floor();
        if quantity <= Decimal::ZERO {
            return Err(LedgerError::ZeroQuantity {
                symbol: symbol.to_string(),
                budget,
                price,
            });
        }

        let cost = quantity * price;
        if cost > self.cash {
            return Err(LedgerError::InsufficientFunds {
                needed: cost,
                available: self.cash,
            });
        }

        let tiers: Vec<ExitTier> = params
            .exit_tiers
            .iter()
            .map(|t| ExitTier::new(t.ratio, t.trigger_pct))
            .collect();
        let stop_loss_price = price * (Decimal::ONE + params.stop_loss_pct / dec!(100));
        let target_price = price * (Decimal::ONE + params.target_profit_pct() / dec!(100));

        let position = Position {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            name: name.to_string(),
            entry_price: price,
            entry_time: time,
            quantity,
            remaining_quantity: quantity,
            tiers,
            stop_loss_price,
            target_price,
        };

        self.cash -= cost;
        info!(
            symbol,
            quantity = %quantity,
            price = %price,
            cash = %self.cash,
            "포지션 개설"
        );

        let id = position.id;
        self.lots.insert(
            id,
            OpenLot {
                position: position.clone(),
                realized_value: Decimal::ZERO,
            },
        );
        Ok(position)
    }

    /// 주문 거부된 포지션 롤백. 현금을 복원하고 포지션을 제거합니다.
    pub fn rollback_open(&mut self, id: Uuid) -> Result<(), LedgerError> {
        let lot = self
            .lots
            .get(&id)
            .ok_or(LedgerError::UnknownPosition(id))?;
        if lot.realized_value != Decimal::ZERO
            || lot.position.remaining_quantity != lot.position.quantity
        {
            return Err(LedgerError::RollbackDenied(id));
        }

        let lot = self.lots.remove(&id).ok_or(LedgerError::UnknownPosition(id))?;
        self.cash += lot.position.quantity * lot.position.entry_price;
        info!(symbol = %lot.position.symbol, "포지션 롤백");
        Ok(())
    }

    /// 분할 청산. 해당 티어를 소비하고 수량을 줄이며 현금을 회수합니다.
    ///
    /// 티어는 반드시 가장 낮은 미소비 티어부터 순서대로 소비되어야
    /// 합니다. 반환값은 실제 매도 수량입니다.
    pub fn partial_close(
        &mut self,
        id: Uuid,
        tier_index: usize,
        price: Decimal,
    ) -> Result<Decimal, LedgerError> {
        let lot = self
            .lots
            .get_mut(&id)
            .ok_or(LedgerError::UnknownPosition(id))?;

        if lot.position.next_tier_index() != Some(tier_index) {
            return Err(LedgerError::InvalidTier { index: tier_index });
        }

        let tier = lot.position.tiers[tier_index];
        let quantity = (lot.position.quantity * tier.ratio)
            .floor()
            .min(lot.position.remaining_quantity);

        lot.position.tiers[tier_index].consumed = true;
        lot.position.remaining_quantity -= quantity;
        let proceeds = quantity * price;
        lot.realized_value += proceeds;
        self.cash += proceeds;

        debug!(
            symbol = %lot.position.symbol,
            tier = tier_index + 1,
            quantity = %quantity,
            remaining = %lot.position.remaining_quantity,
            "분할 청산"
        );
        Ok(quantity)
    }

    /// 전량 청산. 포지션을 제거하고 거래 전체를 요약한 TradeRecord를
    /// 반환합니다. 분할 청산분은 가중 평균 청산가에 반영됩니다.
    pub fn close(
        &mut self,
        id: Uuid,
        price: Decimal,
        reason: ExitReason,
        time: DateTime<Utc>,
    ) -> Result<TradeRecord, LedgerError> {
        let lot = self.lots.remove(&id).ok_or(LedgerError::UnknownPosition(id))?;
        let position = lot.position;

        let final_proceeds = position.remaining_quantity * price;
        self.cash += final_proceeds;

        let total_proceeds = lot.realized_value + final_proceeds;
        let cost = position.quantity * position.entry_price;
        let pnl = total_proceeds - cost;
        let pnl_pct = if cost.is_zero() {
            Decimal::ZERO
        } else {
            pnl / cost * dec!(100)
        };
        let exit_price = if position.quantity.is_zero() {
            price
        } else {
            total_proceeds / position.quantity
        };

        let record = TradeRecord {
            id: Uuid::new_v4(),
            position_id: position.id,
            symbol: position.symbol.clone(),
            name: position.name.clone(),
            entry_price: position.entry_price,
            exit_price,
            quantity: position.quantity,
            entry_time: position.entry_time,
            exit_time: time,
            pnl,
            pnl_pct,
            holding_minutes: (time - position.entry_time).num_minutes(),
            exit_reason: reason,
        };

        info!(
            symbol = %record.symbol,
            reason = %reason,
            pnl = %pnl,
            pnl_pct = %pnl_pct,
            cash = %self.cash,
            "포지션 종결"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn params() -> StrategyParams {
        StrategyParams::default()
    }

    fn entry_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 27, 6, 10, 0).unwrap()
    }

    #[test]
    fn open_debits_cash_and_builds_tiers() {
        let mut ledger = PositionLedger::new(dec!(10_000_000));
        let position = ledger
            .open("005930", "삼성전자", dec!(0.10), dec!(10000), entry_time(), &params())
            .unwrap();

        // 예산 100만 → 100주
        assert_eq!(position.quantity, dec!(100));
        assert_eq!(position.stop_loss_price, dec!(9700.00));
        assert_eq!(position.target_price, dec!(10500.00));
        assert_eq!(position.tiers.len(), 3);
        assert_eq!(ledger.cash(), dec!(9_000_000));
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let mut ledger = PositionLedger::new(dec!(50_000));
        let result = ledger.open(
            "005930",
            "삼성전자",
            dec!(0.10),
            dec!(10000),
            entry_time(),
            &params(),
        );
        assert!(matches!(result, Err(LedgerError::ZeroQuantity { .. })));
        assert_eq!(ledger.cash(), dec!(50_000));
    }

    #[test]
    fn rollback_restores_cash() {
        let mut ledger = PositionLedger::new(dec!(10_000_000));
        let position = ledger
            .open("005930", "삼성전자", dec!(0.10), dec!(10000), entry_time(), &params())
            .unwrap();

        ledger.rollback_open(position.id).unwrap();
        assert_eq!(ledger.cash(), dec!(10_000_000));
        assert!(ledger.position(position.id).is_none());
    }

    #[test]
    fn rollback_denied_after_partial_close() {
        let mut ledger = PositionLedger::new(dec!(10_000_000));
        let position = ledger
            .open("005930", "삼성전자", dec!(0.10), dec!(10000), entry_time(), &params())
            .unwrap();

        ledger.partial_close(position.id, 0, dec!(10200)).unwrap();
        assert!(matches!(
            ledger.rollback_open(position.id),
            Err(LedgerError::RollbackDenied(_))
        ));
    }

    #[test]
    fn tier_ladder_consumes_in_order() {
        let mut ledger = PositionLedger::new(dec!(10_000_000));
        let position = ledger
            .open("005930", "삼성전자", dec!(0.10), dec!(10000), entry_time(), &params())
            .unwrap();
        let id = position.id;

        // 순서 건너뛰기 금지
        assert!(matches!(
            ledger.partial_close(id, 1, dec!(10300)),
            Err(LedgerError::InvalidTier { index: 1 })
        ));

        // 100주 기준 33 / 33 / 잔량 34
        let q1 = ledger.partial_close(id, 0, dec!(10200)).unwrap();
        assert_eq!(q1, dec!(33));
        let q2 = ledger.partial_close(id, 1, dec!(10300)).unwrap();
        assert_eq!(q2, dec!(33));

        let remaining = ledger.position(id).unwrap().remaining_quantity;
        assert_eq!(remaining, dec!(34));

        // 같은 티어 재소비 금지
        assert!(matches!(
            ledger.partial_close(id, 1, dec!(10300)),
            Err(LedgerError::InvalidTier { index: 1 })
        ));
    }

    #[test]
    fn close_merges_partial_fills_into_one_record() {
        let mut ledger = PositionLedger::new(dec!(10_000_000));
        let position = ledger
            .open("005930", "삼성전자", dec!(0.10), dec!(10000), entry_time(), &params())
            .unwrap();
        let id = position.id;

        ledger.partial_close(id, 0, dec!(10200)).unwrap();
        ledger.partial_close(id, 1, dec!(10300)).unwrap();

        let exit_time = entry_time() + chrono::Duration::hours(18);
        let record = ledger
            .close(id, dec!(10500), ExitReason::TakeProfitTier(3), exit_time)
            .unwrap();

        // 33×10200 + 33×10300 + 34×10500 = 1,033,500
        assert_eq!(record.quantity, dec!(100));
        assert_eq!(record.pnl, dec!(33500));
        assert_eq!(record.pnl_pct, dec!(3.35));
        assert_eq!(record.exit_price, dec!(10335));
        assert_eq!(record.holding_minutes, 1080);
        assert!(record.is_win());

        // 현금 복원: 900만 + 103.35만
        assert_eq!(ledger.cash(), dec!(10_033_500));
        assert!(ledger.position(id).is_none());
    }

    #[test]
    fn full_close_at_stop_loss() {
        let mut ledger = PositionLedger::new(dec!(10_000_000));
        let position = ledger
            .open("005930", "삼성전자", dec!(0.10), dec!(10000), entry_time(), &params())
            .unwrap();

        let record = ledger
            .close(
                position.id,
                dec!(9700),
                ExitReason::StopLoss,
                entry_time() + chrono::Duration::hours(18),
            )
            .unwrap();

        assert_eq!(record.pnl, dec!(-30000));
        assert_eq!(record.pnl_pct, dec!(-3));
        assert!(record.is_loss());
    }

    #[test]
    fn equity_values_open_positions() {
        let mut ledger = PositionLedger::new(dec!(10_000_000));
        let position = ledger
            .open("005930", "삼성전자", dec!(0.10), dec!(10000), entry_time(), &params())
            .unwrap();

        let mut prices = HashMap::new();
        prices.insert(position.symbol.clone(), dec!(10500));
        // 900만 현금 + 100주 × 10500
        assert_eq!(ledger.equity(&prices), dec!(10_050_000));
    }
}
