//! 한국(KST) 시장 시계 유틸리티.
//!
//! 진입 윈도우(14:30~15:20), 3분 시초가 룰(09:03), 10시 강제 청산 등
//! 모든 시간 규칙은 KST 벽시계 기준입니다. 타임스탬프는 내부적으로 UTC로
//! 저장하고, 판단 시점에만 KST로 변환합니다.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Asia::Seoul;

/// UTC 타임스탬프를 KST 시각(HH:MM:SS)으로 변환합니다.
pub fn kst_time(ts: DateTime<Utc>) -> NaiveTime {
    ts.with_timezone(&Seoul).time()
}

/// UTC 타임스탬프를 KST 거래일(날짜)로 변환합니다.
pub fn kst_date(ts: DateTime<Utc>) -> NaiveDate {
    ts.with_timezone(&Seoul).date_naive()
}

/// KST 날짜 + 시각을 UTC 타임스탬프로 변환합니다.
///
/// 백테스트에서 과거 분봉의 벽시계 시각을 복원할 때 사용합니다.
/// KST는 DST가 없어 변환이 항상 유일합니다.
pub fn kst_datetime(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    Seoul
        .from_local_datetime(&date.and_time(time))
        .single()
        .expect("KST has no DST gaps")
        .with_timezone(&Utc)
}

/// 반개구간이 아닌 폐구간 [start, end] 윈도우 포함 여부.
pub fn in_window(time: NaiveTime, start: NaiveTime, end: NaiveTime) -> bool {
    time >= start && time <= end
}
