//! closebet-notification: 거래 이벤트 알림.
//!
//! Discord Webhook / 콘솔 전송기를 제공합니다. 알림은 전부
//! fire-and-forget입니다. 전송 실패는 로그만 남기고 판단 코어의
//! 상태에는 절대 영향을 주지 않습니다.

pub mod console;
pub mod discord;
pub mod types;

pub use console::ConsoleSender;
pub use discord::{DiscordConfig, DiscordSender};
pub use types::{NotificationError, NotificationEvent, NotificationSender};
