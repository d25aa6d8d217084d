//! 데이터 제공자와 브로커 실행기 trait.
//!
//! 실패/누락은 정상적인 평평한 값과 명확히 구분됩니다. 조회 실패는
//! `Err`, 유효하지만 변동 없는 시세는 `Ok`.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use closebet_core::{DailyBar, MinuteBar, NewsItem, Snapshot};

use crate::ExchangeError;

/// 주문 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    /// 매수
    Buy,
    /// 매도
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// 계좌 잔고.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    /// 예수금 (현금)
    pub cash: Decimal,
    /// 보유 종목 평가액
    pub holdings_value: Decimal,
}

impl Balance {
    /// 총 자산.
    pub fn total(&self) -> Decimal {
        self.cash + self.holdings_value
    }
}

/// 시세 데이터 제공자.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// 종목 스냅샷 조회.
    ///
    /// 필수 필드가 하나라도 빠지면 `DataUnavailable`을 반환합니다.
    async fn snapshot(&self, symbol: &str) -> Result<Snapshot, ExchangeError>;

    /// 최근 분봉 조회 (최신 순).
    async fn minute_bars(&self, symbol: &str, count: usize) -> Result<Vec<MinuteBar>, ExchangeError>;

    /// 일봉 조회 (최신 순).
    async fn daily_bars(&self, symbol: &str, days: usize) -> Result<Vec<DailyBar>, ExchangeError>;

    /// 등락률 상위 종목 스냅샷 조회.
    async fn top_by_change(&self, n: usize) -> Result<Vec<Snapshot>, ExchangeError>;

    /// 시장 지수(코스피) 등락률 (%).
    async fn index_change_pct(&self) -> Result<Decimal, ExchangeError>;
}

/// 뉴스/토론방 제공자.
#[async_trait]
pub trait NewsProvider: Send + Sync {
    /// 종목 관련 최근 헤드라인 조회.
    async fn recent_headlines(&self, symbol: &str) -> Result<Vec<NewsItem>, ExchangeError>;
}

/// 브로커 주문 실행기.
///
/// 주문 실패는 `OrderRejected`로만 표현됩니다. 조용한 체결 가정은
/// 없습니다.
#[async_trait]
pub trait BrokerExecutor: Send + Sync {
    /// 잔고 조회.
    async fn balance(&self) -> Result<Balance, ExchangeError>;

    /// 주문 집행.
    async fn place_order(
        &self,
        symbol: &str,
        quantity: Decimal,
        price: Decimal,
        side: OrderSide,
    ) -> Result<(), ExchangeError>;
}
