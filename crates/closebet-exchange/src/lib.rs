//! closebet-exchange: 외부 협력자 계약.
//!
//! 시세/뉴스 데이터 제공자와 브로커 실행기의 trait을 정의합니다.
//! 판단 코어는 구체 구현이 아니라 이 trait들에만 의존하므로, 실거래
//! 커넥터와 테스트/백테스트용 Mock이 같은 인터페이스로 교체됩니다.
//!
//! 외부 API 호출은 전부 바운디드 재시도 + 백오프(`retry`)를 거치며,
//! 소진 시 해당 종목/사이클을 건너뜁니다. 오래된 데이터로 진행하는
//! 일은 없습니다.

mod error;
pub mod mock;
pub mod provider;
pub mod retry;

pub use error::ExchangeError;
pub use mock::{MockBroker, MockMarket};
pub use provider::{Balance, BrokerExecutor, MarketDataProvider, NewsProvider, OrderSide};
pub use retry::{with_retry, RetryConfig};
