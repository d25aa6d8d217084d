//! Discord Webhook 전송기.
//!
//! 이벤트를 Discord Embed로 포맷해 Webhook으로 전송합니다.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::debug;

use crate::types::{NotificationError, NotificationEvent, NotificationSender};

/// Discord 전송 설정.
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    /// Webhook URL
    pub webhook_url: String,
    /// 봇 표시 이름
    pub display_name: Option<String>,
    /// 전송 활성화 여부
    pub enabled: bool,
}

impl DiscordConfig {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            display_name: None,
            enabled: true,
        }
    }

    /// 환경 변수에서 설정을 읽습니다. URL이 없으면 None.
    pub fn from_env() -> Option<Self> {
        let webhook_url = std::env::var("DISCORD_WEBHOOK_URL").ok()?;
        let display_name = std::env::var("DISCORD_DISPLAY_NAME").ok();
        let enabled = std::env::var("DISCORD_ENABLED")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(true);

        Some(Self {
            webhook_url,
            display_name,
            enabled,
        })
    }
}

/// Discord Webhook 알림 전송기.
pub struct DiscordSender {
    config: DiscordConfig,
    client: reqwest::Client,
}

impl DiscordSender {
    pub fn new(config: DiscordConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// 환경 변수에서 전송기를 생성합니다.
    pub fn from_env() -> Option<Self> {
        DiscordConfig::from_env().map(Self::new)
    }

    /// 이벤트를 Embed로 포맷합니다.
    fn format_embed(&self, event: &NotificationEvent) -> serde_json::Value {
        match event {
            NotificationEvent::Entry {
                symbol,
                name,
                score,
                tier,
                weight,
                price,
                quantity,
            } => json!({
                "title": "🟢 종가 베팅 진입",
                "color": 0x28a745,
                "fields": [
                    { "name": "종목", "value": format!("{} (`{}`)", name, symbol), "inline": true },
                    { "name": "등급", "value": tier.to_string(), "inline": true },
                    { "name": "점수", "value": score.to_string(), "inline": true },
                    { "name": "비중", "value": format!("{}%", weight * Decimal::from(100u32)), "inline": true },
                    { "name": "매수가", "value": format!("{}원", price), "inline": true },
                    { "name": "수량", "value": format!("{}주", quantity), "inline": true }
                ]
            }),

            NotificationEvent::Exit {
                symbol,
                name,
                reason,
                quantity,
                exit_price,
                pnl_pct,
            } => {
                let win = *pnl_pct >= Decimal::ZERO;
                json!({
                    "title": format!("{} 청산 ({})", if win { "💰" } else { "📉" }, reason),
                    "color": if win { 0x28a745 } else { 0xdc3545 },
                    "fields": [
                        { "name": "종목", "value": format!("{} (`{}`)", name, symbol), "inline": true },
                        { "name": "수량", "value": format!("{}주", quantity), "inline": true },
                        { "name": "청산가", "value": format!("{}원", exit_price), "inline": true },
                        { "name": "수익률", "value": format!("{}{}%", if win { "+" } else { "" }, pnl_pct), "inline": true }
                    ]
                })
            }

            NotificationEvent::GuardBlock { symbol, reason } => json!({
                "title": "🚫 진입 차단",
                "color": 0xfd7e14,
                "fields": [
                    { "name": "종목", "value": format!("`{}`", symbol), "inline": true },
                    { "name": "사유", "value": reason, "inline": false }
                ]
            }),

            NotificationEvent::DailySummary {
                trading_day,
                trades,
                wins,
                daily_pnl_pct,
            } => json!({
                "title": "📊 일일 마감 요약",
                "color": 0x007bff,
                "fields": [
                    { "name": "거래일", "value": trading_day.to_string(), "inline": true },
                    { "name": "거래", "value": format!("{}건 ({}승)", trades, wins), "inline": true },
                    { "name": "일일 손익", "value": format!("{}%", daily_pnl_pct), "inline": true }
                ]
            }),

            NotificationEvent::AnalyticsSummary {
                label,
                trades,
                total_return_pct,
                win_rate,
            } => json!({
                "title": format!("🧪 {} 완료", label),
                "color": 0x6c757d,
                "fields": [
                    { "name": "거래", "value": format!("{}건", trades), "inline": true },
                    { "name": "총 수익률", "value": format!("{}%", total_return_pct), "inline": true },
                    { "name": "승률", "value": format!("{}%", win_rate * Decimal::from(100u32)), "inline": true }
                ]
            }),
        }
    }

    async fn send_webhook(&self, embed: serde_json::Value) -> Result<(), NotificationError> {
        let mut payload = json!({ "embeds": [embed] });
        if let Some(ref name) = self.config.display_name {
            payload["username"] = json!(name);
        }

        let response = self
            .client
            .post(&self.config.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotificationError::SendFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotificationError::SendFailed(format!(
                "Discord 응답 코드 {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationSender for DiscordSender {
    async fn send(&self, event: &NotificationEvent) -> Result<(), NotificationError> {
        if !self.config.enabled {
            debug!("Discord 알림 비활성화 상태");
            return Ok(());
        }
        let embed = self.format_embed(event);
        self.send_webhook(embed).await
    }
}
