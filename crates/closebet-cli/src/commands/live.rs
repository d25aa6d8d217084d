//! 라이브 모드 (scan / buy / sell / portfolio / scheduler).
//!
//! 실거래 커넥터는 이 저장소 밖의 협력자입니다. `MarketDataProvider` /
//! `BrokerExecutor` trait 뒤에서 교체됩니다. 기본 제공 구성은 페이퍼
//! 트레이딩(주문이 외부로 나가지 않는 시뮬레이션 브로커)입니다.

use std::sync::Arc;

use anyhow::bail;
use chrono::Utc;
use tracing::{info, warn};

use closebet_core::clock::{in_window, kst_date, kst_time};
use closebet_exchange::{MockBroker, MockMarket};
use closebet_execution::{LiveEngine, TradeHistory};

use crate::config::AppConfig;

/// 설정에 맞는 라이브 엔진을 구성합니다.
///
/// `CLOSEBET_PROVIDER`는 현재 `paper`만 지원합니다. 다른 값이면 기동
/// 오류입니다.
pub fn build_engine(config: &AppConfig) -> anyhow::Result<LiveEngine> {
    match std::env::var("CLOSEBET_PROVIDER").as_deref() {
        Ok("paper") | Err(_) => {}
        Ok(other) => bail!("지원하지 않는 CLOSEBET_PROVIDER: {other} (paper)"),
    }

    let params = config.strategy_params()?;
    let market = Arc::new(MockMarket::new());
    let broker = Arc::new(MockBroker::new(config.initial_capital));
    let history = TradeHistory::open(&config.history_path)?;

    Ok(LiveEngine::new(
        params,
        market.clone(),
        market,
        broker,
        config.build_sizer()?,
        config.build_notifier(),
        config.initial_capital,
        history,
        Utc::now(),
    ))
}

/// 주문 없이 현재 시장 순위를 출력합니다.
pub async fn run_scan(config: &AppConfig) -> anyhow::Result<()> {
    let engine = build_engine(config)?;
    let results = engine.scan(Utc::now()).await;

    if results.is_empty() {
        println!("후보 없음");
        return Ok(());
    }

    println!("{:<10} {:<16} {:>7} {:>10} {:>7}  비고", "종목", "종목명", "점수", "등급", "비중");
    for result in &results {
        println!(
            "{:<10} {:<16} {:>7.2} {:>10} {:>6.2}%  {}",
            result.symbol,
            result.name,
            result.score,
            result.entry_tier.to_string(),
            result.weight * rust_decimal::Decimal::from(100u32),
            if result.vetoed { "VETO" } else { "" },
        );
    }
    Ok(())
}

/// 매수 사이클 1회.
pub async fn run_buy(config: &AppConfig) -> anyhow::Result<()> {
    let mut engine = build_engine(config)?;
    engine.buy_cycle(Utc::now()).await?;
    Ok(())
}

/// 매도 사이클 1회.
pub async fn run_sell(config: &AppConfig) -> anyhow::Result<()> {
    let mut engine = build_engine(config)?;
    engine.sell_cycle(Utc::now()).await?;
    Ok(())
}

/// 현재 원장과 누적 성과를 출력합니다.
pub async fn run_portfolio(config: &AppConfig) -> anyhow::Result<()> {
    let engine = build_engine(config)?;

    println!("현금: {}", engine.ledger().cash());
    let positions = engine.ledger().positions();
    if positions.is_empty() {
        println!("보유 포지션 없음");
    } else {
        for position in positions {
            println!(
                "{} ({}) 진입 {} × {}주, 잔여 {}주, 손절 {}",
                position.name,
                position.symbol,
                position.entry_price,
                position.quantity,
                position.remaining_quantity,
                position.stop_loss_price,
            );
        }
    }

    let stats = engine.history().statistics(usize::MAX);
    println!(
        "누적 거래 {}건, 승 {} / 패 {}, 승률 {:.2}",
        stats.total_trades, stats.wins, stats.losses, stats.win_rate
    );
    Ok(())
}

/// 스케줄러. 사이클을 하나씩만 돌리며, KST 윈도우에 따라 매수/매도를
/// 나눠 보냅니다.
pub async fn run_scheduler(config: &AppConfig) -> anyhow::Result<()> {
    let params = config.strategy_params()?;
    let mut engine = build_engine(config)?;
    let mut interval =
        tokio::time::interval(std::time::Duration::from_secs(config.cycle_interval_secs));
    let mut summary_sent_for = None;

    info!(
        interval_secs = config.cycle_interval_secs,
        "스케줄러 기동"
    );

    loop {
        interval.tick().await;
        let now = Utc::now();
        let now_kst = kst_time(now);
        let today = kst_date(now);

        if in_window(now_kst, params.entry_window_start, params.entry_window_end) {
            if let Err(error) = engine.buy_cycle(now).await {
                warn!(%error, "매수 사이클 오류");
            }
        } else if in_window(now_kst, params.market_open, params.time_fallback) {
            if let Err(error) = engine.sell_cycle(now).await {
                warn!(%error, "매도 사이클 오류");
            }
        } else if now_kst > params.entry_window_end && summary_sent_for != Some(today) {
            engine.send_daily_summary().await;
            summary_sent_for = Some(today);
        }
    }
}
