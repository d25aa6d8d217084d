//! 시세 스냅샷과 봉 데이터.
//!
//! 데이터 제공자가 생성하는 읽기 전용 타입입니다. 숫자 필드에 기본값을
//! 채워 넣는 일은 없습니다. 필드가 누락된 시세는 제공자 단계에서
//! `DataUnavailable`로 거부되고, 여기까지 도달한 값은 전부 유효합니다.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 외국인/기관 순매수 수급.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestorFlow {
    /// 외국인 순매수 (주)
    pub foreign_net_buy: i64,
    /// 기관 순매수 (주)
    pub institution_net_buy: i64,
}

impl InvestorFlow {
    /// 외국인 순매수 여부.
    pub fn foreign_buying(&self) -> bool {
        self.foreign_net_buy > 0
    }

    /// 기관 순매수 여부.
    pub fn institution_buying(&self) -> bool {
        self.institution_net_buy > 0
    }

    /// 외국인+기관 동반 매수 여부.
    pub fn both_buying(&self) -> bool {
        self.foreign_buying() && self.institution_buying()
    }

    /// 둘 중 한쪽이라도 순매수인지 여부.
    pub fn any_buying(&self) -> bool {
        self.foreign_buying() || self.institution_buying()
    }
}

/// 종목별 현재 시세 스냅샷.
///
/// 생성 이후 불변이며 스코어링 프리미티브는 이 타입을 읽기 전용으로만
/// 소비합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// 종목코드 (예: "005930")
    pub symbol: String,
    /// 종목명
    pub name: String,
    /// 관측 시각 (UTC)
    pub timestamp: DateTime<Utc>,
    /// 현재가
    pub price: Decimal,
    /// 당일 시가
    pub open_price: Decimal,
    /// 누적 거래량 (주)
    pub volume: Decimal,
    /// 누적 거래대금 (원)
    pub trading_value: Decimal,
    /// 등락률 (%)
    pub change_rate: Decimal,
    /// 투자자 수급
    pub flow: InvestorFlow,
}

/// 분봉.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinuteBar {
    /// 봉 시작 시각 (UTC)
    pub timestamp: DateTime<Utc>,
    /// 시가
    pub open: Decimal,
    /// 고가
    pub high: Decimal,
    /// 저가
    pub low: Decimal,
    /// 종가
    pub close: Decimal,
    /// 거래량
    pub volume: Decimal,
}

impl MinuteBar {
    /// 양봉 여부 (종가 ≥ 시가).
    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }
}

/// 일봉.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    /// 거래일
    pub date: NaiveDate,
    /// 시가
    pub open: Decimal,
    /// 고가
    pub high: Decimal,
    /// 저가
    pub low: Decimal,
    /// 종가
    pub close: Decimal,
    /// 거래량
    pub volume: Decimal,
}

/// 뉴스/토론방 항목.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    /// 제목
    pub title: String,
    /// 본문 (요약)
    pub content: String,
    /// 게시 시각 (UTC)
    pub published_at: DateTime<Utc>,
}

impl NewsItem {
    /// 제목과 본문을 합친 스캔 대상 텍스트.
    pub fn combined_text(&self) -> String {
        format!("{} {}", self.title, self.content)
    }
}
