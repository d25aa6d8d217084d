//! 알림 이벤트와 전송기 계약.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use closebet_core::{EntryTier, ExitReason};

/// 알림 전송 오류.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// 전송 실패
    #[error("알림 전송 실패: {0}")]
    SendFailed(String),
    /// 전송기 설정 오류
    #[error("알림 설정 오류: {0}")]
    Config(String),
}

/// 거래 이벤트 알림.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    /// 진입 신호 발생 및 매수 체결
    Entry {
        symbol: String,
        name: String,
        score: Decimal,
        tier: EntryTier,
        weight: Decimal,
        price: Decimal,
        quantity: Decimal,
    },
    /// 포지션 청산 (전량/분할)
    Exit {
        symbol: String,
        name: String,
        reason: ExitReason,
        quantity: Decimal,
        exit_price: Decimal,
        pnl_pct: Decimal,
    },
    /// 진입 차단
    GuardBlock {
        symbol: String,
        reason: String,
    },
    /// 일일 마감 요약
    DailySummary {
        trading_day: NaiveDate,
        trades: usize,
        wins: usize,
        daily_pnl_pct: Decimal,
    },
    /// 백테스트/최적화 완료 요약
    AnalyticsSummary {
        label: String,
        trades: usize,
        total_return_pct: Decimal,
        win_rate: Decimal,
    },
}

/// 알림 전송기 계약.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// 이벤트 전송.
    async fn send(&self, event: &NotificationEvent) -> Result<(), NotificationError>;
}
