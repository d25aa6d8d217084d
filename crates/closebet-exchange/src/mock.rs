//! 테스트와 모의 투자용 인메모리 제공자.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use closebet_core::{DailyBar, MinuteBar, NewsItem, Snapshot};

use crate::provider::{Balance, BrokerExecutor, MarketDataProvider, NewsProvider, OrderSide};
use crate::ExchangeError;

/// 인메모리 시세 제공자.
///
/// 테스트 픽스처를 종목별로 등록해 두고 조회합니다. 등록되지 않은
/// 종목은 `DataUnavailable`.
#[derive(Debug, Default)]
pub struct MockMarket {
    snapshots: Mutex<HashMap<String, Snapshot>>,
    minute_bars: Mutex<HashMap<String, Vec<MinuteBar>>>,
    daily_bars: Mutex<HashMap<String, Vec<DailyBar>>>,
    headlines: Mutex<HashMap<String, Vec<NewsItem>>>,
    index_change: Mutex<Decimal>,
}

impl MockMarket {
    pub fn new() -> Self {
        Self::default()
    }

    /// 종목 스냅샷 등록 (덮어쓰기).
    pub fn set_snapshot(&self, snapshot: Snapshot) {
        let mut map = self.snapshots.lock().unwrap();
        map.insert(snapshot.symbol.clone(), snapshot);
    }

    /// 분봉 등록 (최신 순).
    pub fn set_minute_bars(&self, symbol: &str, bars: Vec<MinuteBar>) {
        self.minute_bars.lock().unwrap().insert(symbol.to_string(), bars);
    }

    /// 일봉 등록 (최신 순).
    pub fn set_daily_bars(&self, symbol: &str, bars: Vec<DailyBar>) {
        self.daily_bars.lock().unwrap().insert(symbol.to_string(), bars);
    }

    /// 헤드라인 등록.
    pub fn set_headlines(&self, symbol: &str, items: Vec<NewsItem>) {
        self.headlines.lock().unwrap().insert(symbol.to_string(), items);
    }

    /// 지수 등락률 설정.
    pub fn set_index_change_pct(&self, pct: Decimal) {
        *self.index_change.lock().unwrap() = pct;
    }
}

#[async_trait]
impl MarketDataProvider for MockMarket {
    async fn snapshot(&self, symbol: &str) -> Result<Snapshot, ExchangeError> {
        self.snapshots
            .lock()
            .unwrap()
            .get(symbol)
            .cloned()
            .ok_or_else(|| ExchangeError::DataUnavailable {
                symbol: symbol.to_string(),
                detail: "스냅샷 미등록".to_string(),
            })
    }

    async fn minute_bars(&self, symbol: &str, count: usize) -> Result<Vec<MinuteBar>, ExchangeError> {
        let map = self.minute_bars.lock().unwrap();
        let bars = map.get(symbol).ok_or_else(|| ExchangeError::DataUnavailable {
            symbol: symbol.to_string(),
            detail: "분봉 미등록".to_string(),
        })?;
        Ok(bars.iter().take(count).cloned().collect())
    }

    async fn daily_bars(&self, symbol: &str, days: usize) -> Result<Vec<DailyBar>, ExchangeError> {
        let map = self.daily_bars.lock().unwrap();
        let bars = map.get(symbol).ok_or_else(|| ExchangeError::DataUnavailable {
            symbol: symbol.to_string(),
            detail: "일봉 미등록".to_string(),
        })?;
        Ok(bars.iter().take(days).cloned().collect())
    }

    async fn top_by_change(&self, n: usize) -> Result<Vec<Snapshot>, ExchangeError> {
        let map = self.snapshots.lock().unwrap();
        let mut all: Vec<Snapshot> = map.values().cloned().collect();
        all.sort_by(|a, b| b.change_rate.cmp(&a.change_rate));
        all.truncate(n);
        Ok(all)
    }

    async fn index_change_pct(&self) -> Result<Decimal, ExchangeError> {
        Ok(*self.index_change.lock().unwrap())
    }
}

#[async_trait]
impl NewsProvider for MockMarket {
    async fn recent_headlines(&self, symbol: &str) -> Result<Vec<NewsItem>, ExchangeError> {
        Ok(self
            .headlines
            .lock()
            .unwrap()
            .get(symbol)
            .cloned()
            .unwrap_or_default())
    }
}

/// 기록된 주문.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedOrder {
    pub symbol: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub side: OrderSide,
}

/// 인메모리 브로커.
///
/// 주문은 기록만 하고 항상 체결로 처리합니다. `reject_next`로 다음
/// 주문의 거부를 예약할 수 있습니다.
#[derive(Debug)]
pub struct MockBroker {
    cash: Mutex<Decimal>,
    holdings_value: Mutex<Decimal>,
    orders: Mutex<Vec<RecordedOrder>>,
    reject_reason: Mutex<Option<String>>,
}

impl MockBroker {
    pub fn new(cash: Decimal) -> Self {
        Self {
            cash: Mutex::new(cash),
            holdings_value: Mutex::new(dec!(0)),
            orders: Mutex::new(Vec::new()),
            reject_reason: Mutex::new(None),
        }
    }

    /// 다음 주문을 지정한 사유로 거부.
    pub fn reject_next(&self, reason: &str) {
        *self.reject_reason.lock().unwrap() = Some(reason.to_string());
    }

    /// 지금까지 기록된 주문.
    pub fn orders(&self) -> Vec<RecordedOrder> {
        self.orders.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrokerExecutor for MockBroker {
    async fn balance(&self) -> Result<Balance, ExchangeError> {
        Ok(Balance {
            cash: *self.cash.lock().unwrap(),
            holdings_value: *self.holdings_value.lock().unwrap(),
        })
    }

    async fn place_order(
        &self,
        symbol: &str,
        quantity: Decimal,
        price: Decimal,
        side: OrderSide,
    ) -> Result<(), ExchangeError> {
        if let Some(reason) = self.reject_reason.lock().unwrap().take() {
            return Err(ExchangeError::OrderRejected { reason });
        }

        let notional = quantity * price;
        {
            let mut cash = self.cash.lock().unwrap();
            let mut holdings = self.holdings_value.lock().unwrap();
            match side {
                OrderSide::Buy => {
                    if notional > *cash {
                        return Err(ExchangeError::OrderRejected {
                            reason: "잔고 부족".to_string(),
                        });
                    }
                    *cash -= notional;
                    *holdings += notional;
                }
                OrderSide::Sell => {
                    *cash += notional;
                    *holdings = (*holdings - notional).max(dec!(0));
                }
            }
        }

        self.orders.lock().unwrap().push(RecordedOrder {
            symbol: symbol.to_string(),
            quantity,
            price,
            side,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use closebet_core::InvestorFlow;

    fn snapshot(symbol: &str, change_rate: Decimal) -> Snapshot {
        Snapshot {
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            timestamp: Utc::now(),
            price: dec!(10000),
            open_price: dec!(9800),
            volume: dec!(100000),
            trading_value: dec!(250000000000),
            change_rate,
            flow: InvestorFlow::default(),
        }
    }

    #[tokio::test]
    async fn unknown_symbol_is_unavailable() {
        let market = MockMarket::new();
        let err = market.snapshot("005930").await.unwrap_err();
        assert!(matches!(err, ExchangeError::DataUnavailable { .. }));
    }

    #[tokio::test]
    async fn top_by_change_sorts_descending() {
        let market = MockMarket::new();
        market.set_snapshot(snapshot("A", dec!(3.5)));
        market.set_snapshot(snapshot("B", dec!(8.2)));
        market.set_snapshot(snapshot("C", dec!(1.1)));

        let top = market.top_by_change(2).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].symbol, "B");
        assert_eq!(top[1].symbol, "A");
    }

    #[tokio::test]
    async fn broker_rejects_when_scheduled() {
        let broker = MockBroker::new(dec!(10000000));
        broker.reject_next("시장가 불가");

        let err = broker
            .place_order("005930", dec!(10), dec!(70000), OrderSide::Buy)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::OrderRejected { .. }));

        // 예약은 한 번만 적용
        broker
            .place_order("005930", dec!(10), dec!(70000), OrderSide::Buy)
            .await
            .unwrap();
        assert_eq!(broker.orders().len(), 1);
    }

    #[tokio::test]
    async fn buy_moves_cash_to_holdings() {
        let broker = MockBroker::new(dec!(1000000));
        broker
            .place_order("005930", dec!(10), dec!(50000), OrderSide::Buy)
            .await
            .unwrap();
        let balance = broker.balance().await.unwrap();
        assert_eq!(balance.cash, dec!(500000));
        assert_eq!(balance.holdings_value, dec!(500000));
        assert_eq!(balance.total(), dec!(1000000));
    }

    #[tokio::test]
    async fn insufficient_cash_rejected() {
        let broker = MockBroker::new(dec!(100));
        let err = broker
            .place_order("005930", dec!(10), dec!(50000), OrderSide::Buy)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::OrderRejected { .. }));
    }
}
