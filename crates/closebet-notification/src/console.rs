//! 콘솔(로그) 전송기.
//!
//! Webhook 미설정 환경과 백테스트에서 쓰는 기본 전송기입니다.

use async_trait::async_trait;
use tracing::info;

use crate::types::{NotificationError, NotificationEvent, NotificationSender};

/// tracing 로그로 출력하는 전송기.
#[derive(Debug, Clone, Default)]
pub struct ConsoleSender;

impl ConsoleSender {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationSender for ConsoleSender {
    async fn send(&self, event: &NotificationEvent) -> Result<(), NotificationError> {
        match event {
            NotificationEvent::Entry {
                symbol,
                name,
                score,
                tier,
                weight,
                price,
                quantity,
            } => info!(
                %symbol, name, score = %score, tier = %tier,
                weight = %weight, price = %price, quantity = %quantity,
                "진입"
            ),
            NotificationEvent::Exit {
                symbol,
                name,
                reason,
                quantity,
                exit_price,
                pnl_pct,
            } => info!(
                %symbol, name, reason = %reason,
                quantity = %quantity, exit_price = %exit_price, pnl_pct = %pnl_pct,
                "청산"
            ),
            NotificationEvent::GuardBlock { symbol, reason } => {
                info!(%symbol, reason, "진입 차단")
            }
            NotificationEvent::DailySummary {
                trading_day,
                trades,
                wins,
                daily_pnl_pct,
            } => info!(
                %trading_day, trades, wins, daily_pnl_pct = %daily_pnl_pct,
                "일일 요약"
            ),
            NotificationEvent::AnalyticsSummary {
                label,
                trades,
                total_return_pct,
                win_rate,
            } => info!(
                label, trades, total_return_pct = %total_return_pct, win_rate = %win_rate,
                "분석 요약"
            ),
        }
        Ok(())
    }
}
