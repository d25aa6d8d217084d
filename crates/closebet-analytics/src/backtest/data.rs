//! 과거 데이터 저장소.
//!
//! 내부 저장은 과거순이지만, 엔진에 노출되는 조회는 전부 커서(시뮬레이션
//! 시각) 이전으로 잘린 최신순 슬라이스입니다. 파이프라인이 기대하는
//! "최신 순" 규약과 미래 참조 차단을 한 곳에서 강제합니다.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;

use closebet_core::clock::{kst_date, kst_time};
use closebet_core::{DailyBar, InvestorFlow, MinuteBar, NewsItem};

/// 한 종목의 전체 과거 데이터.
#[derive(Debug, Clone, Default)]
pub struct SymbolHistory {
    pub symbol: String,
    pub name: String,
    /// 일봉 (과거순)
    daily_bars: Vec<DailyBar>,
    /// 거래일별 분봉 (과거순)
    minute_bars: HashMap<NaiveDate, Vec<MinuteBar>>,
    /// 거래일별 투자자 수급
    flow: HashMap<NaiveDate, InvestorFlow>,
    /// 거래일별 뉴스
    headlines: HashMap<NaiveDate, Vec<NewsItem>>,
}

impl SymbolHistory {
    pub fn new(symbol: &str, name: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// 일봉 설정. 입력 순서와 무관하게 날짜 오름차순으로 정렬합니다.
    pub fn with_daily_bars(mut self, mut bars: Vec<DailyBar>) -> Self {
        bars.sort_by_key(|b| b.date);
        self.daily_bars = bars;
        self
    }

    /// 특정 거래일의 분봉 설정. 시각 오름차순으로 정렬합니다.
    pub fn with_minute_bars(mut self, date: NaiveDate, mut bars: Vec<MinuteBar>) -> Self {
        bars.sort_by_key(|b| b.timestamp);
        self.minute_bars.insert(date, bars);
        self
    }

    pub fn with_flow(mut self, date: NaiveDate, flow: InvestorFlow) -> Self {
        self.flow.insert(date, flow);
        self
    }

    pub fn with_headlines(mut self, date: NaiveDate, items: Vec<NewsItem>) -> Self {
        self.headlines.insert(date, items);
        self
    }

    /// 해당 일의 일봉.
    pub fn daily_bar(&self, date: NaiveDate) -> Option<&DailyBar> {
        self.daily_bars.iter().find(|b| b.date == date)
    }
}

/// 백테스트 데이터 저장소.
#[derive(Debug, Clone, Default)]
pub struct HistoricalData {
    symbols: HashMap<String, SymbolHistory>,
    index_change: HashMap<NaiveDate, Decimal>,
    trading_days: Vec<NaiveDate>,
}

impl HistoricalData {
    pub fn new() -> Self {
        Self::default()
    }

    /// 종목 데이터 추가. 일봉 날짜를 거래일 목록에 합칩니다.
    pub fn add_symbol(&mut self, history: SymbolHistory) {
        for bar in &history.daily_bars {
            if !self.trading_days.contains(&bar.date) {
                self.trading_days.push(bar.date);
            }
        }
        self.trading_days.sort();
        self.symbols.insert(history.symbol.clone(), history);
    }

    /// 거래일별 시장 지수 등락률 설정.
    pub fn set_index_change(&mut self, date: NaiveDate, pct: Decimal) {
        self.index_change.insert(date, pct);
    }

    /// 전체 거래일 (오름차순).
    pub fn trading_days(&self) -> &[NaiveDate] {
        &self.trading_days
    }

    pub fn symbols(&self) -> impl Iterator<Item = &SymbolHistory> {
        self.symbols.values()
    }

    pub fn symbol(&self, symbol: &str) -> Option<&SymbolHistory> {
        self.symbols.get(symbol)
    }

    /// 해당 일의 지수 등락률. 데이터가 없으면 0으로 봅니다.
    pub fn index_change(&self, date: NaiveDate) -> Decimal {
        self.index_change.get(&date).copied().unwrap_or(Decimal::ZERO)
    }

    /// 커서일 이전(포함)의 일봉, 최신순.
    pub fn daily_bars_until(&self, symbol: &str, cursor: NaiveDate) -> Vec<DailyBar> {
        let Some(history) = self.symbols.get(symbol) else {
            return Vec::new();
        };
        history
            .daily_bars
            .iter()
            .filter(|b| b.date <= cursor)
            .rev()
            .copied()
            .collect()
    }

    /// 커서일 당일, 커서 시각 이전(포함)의 분봉, 최신순.
    pub fn minute_bars_until(
        &self,
        symbol: &str,
        cursor: NaiveDate,
        cursor_kst: NaiveTime,
    ) -> Vec<MinuteBar> {
        let Some(bars) = self.symbols.get(symbol).and_then(|h| h.minute_bars.get(&cursor))
        else {
            return Vec::new();
        };
        bars.iter()
            .filter(|b| kst_date(b.timestamp) == cursor && kst_time(b.timestamp) <= cursor_kst)
            .rev()
            .copied()
            .collect()
    }

    /// 해당 거래일의 분봉 전체 (과거순). 오전 재생 루프 전용.
    pub fn day_minute_bars(&self, symbol: &str, date: NaiveDate) -> &[MinuteBar] {
        self.symbols
            .get(symbol)
            .and_then(|h| h.minute_bars.get(&date))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn flow(&self, symbol: &str, date: NaiveDate) -> InvestorFlow {
        self.symbols
            .get(symbol)
            .and_then(|h| h.flow.get(&date))
            .copied()
            .unwrap_or_default()
    }

    pub fn headlines(&self, symbol: &str, date: NaiveDate) -> Vec<NewsItem> {
        self.symbols
            .get(symbol)
            .and_then(|h| h.headlines.get(&date))
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use closebet_core::clock::kst_datetime;
    use rust_decimal_macros::dec;

    fn daily(date: NaiveDate, close: Decimal) -> DailyBar {
        DailyBar {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(100000),
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    #[test]
    fn daily_cursor_hides_future_bars() {
        let mut data = HistoricalData::new();
        data.add_symbol(SymbolHistory::new("005930", "삼성전자").with_daily_bars(vec![
            daily(day(10), dec!(10000)),
            daily(day(11), dec!(10100)),
            daily(day(12), dec!(10200)),
        ]));

        let visible = data.daily_bars_until("005930", day(11));
        assert_eq!(visible.len(), 2);
        // 최신순
        assert_eq!(visible[0].date, day(11));
        assert_eq!(visible[1].date, day(10));
    }

    #[test]
    fn minute_cursor_respects_wall_clock() {
        let date = day(11);
        let bar = |h: u32, m: u32| MinuteBar {
            timestamp: kst_datetime(date, NaiveTime::from_hms_opt(h, m, 0).unwrap()),
            open: dec!(10000),
            high: dec!(10010),
            low: dec!(9990),
            close: dec!(10000),
            volume: dec!(1000),
        };
        let mut data = HistoricalData::new();
        data.add_symbol(
            SymbolHistory::new("005930", "삼성전자")
                .with_daily_bars(vec![daily(date, dec!(10000))])
                .with_minute_bars(date, vec![bar(9, 0), bar(9, 1), bar(9, 2), bar(9, 5)]),
        );

        let visible =
            data.minute_bars_until("005930", date, NaiveTime::from_hms_opt(9, 2, 0).unwrap());
        assert_eq!(visible.len(), 3);
        // 최신순이며 09:05 봉은 보이지 않음
        assert_eq!(kst_time(visible[0].timestamp), NaiveTime::from_hms_opt(9, 2, 0).unwrap());
    }

    #[test]
    fn unknown_symbol_yields_empty_views() {
        let data = HistoricalData::new();
        assert!(data.daily_bars_until("000000", day(10)).is_empty());
        assert!(data
            .minute_bars_until("000000", day(10), NaiveTime::from_hms_opt(9, 0, 0).unwrap())
            .is_empty());
        assert_eq!(data.flow("000000", day(10)), InvestorFlow::default());
    }

    #[test]
    fn trading_days_merge_and_sort() {
        let mut data = HistoricalData::new();
        data.add_symbol(
            SymbolHistory::new("000660", "하이닉스")
                .with_daily_bars(vec![daily(day(12), dec!(5000))]),
        );
        data.add_symbol(
            SymbolHistory::new("005930", "삼성전자")
                .with_daily_bars(vec![daily(day(10), dec!(10000)), daily(day(12), dec!(10200))]),
        );

        assert_eq!(data.trading_days(), &[day(10), day(12)]);
    }

    #[test]
    fn bars_are_sorted_regardless_of_insert_order() {
        let history = SymbolHistory::new("005930", "삼성전자").with_daily_bars(vec![
            daily(day(12), dec!(10200)),
            daily(day(10), dec!(10000)),
        ]);
        let mut data = HistoricalData::new();
        data.add_symbol(history);

        let visible = data.daily_bars_until("005930", day(12));
        assert_eq!(visible[0].date, day(12));
        assert_eq!(visible[1].date, day(10));
    }
}
