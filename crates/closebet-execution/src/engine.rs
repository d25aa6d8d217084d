//! 라이브 트레이딩 엔진.
//!
//! 매수 사이클(종가 베팅 진입)과 매도 사이클(익일 오전 청산)을 돌리는
//! 오케스트레이션 계층입니다. 판단은 전부 strategy/risk의 순수 함수에
//! 위임하고, 여기서는 데이터 조회·주문 집행·원장/이력 갱신·알림만
//! 담당합니다.
//!
//! 실패 정책: 데이터 조회 실패는 해당 종목/틱을 건너뜁니다 (오래된
//! 데이터로 판단하지 않음). 주문 집행은 재시도 없음. 중복 주문이
//! 체결 누락보다 나쁩니다. 주문 거부 시 원장 개설을 롤백합니다.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use rust_decimal::Decimal;
use tracing::{info, warn};

use closebet_core::clock::{kst_date, kst_time};
use closebet_core::{EnsembleResult, ExitReason, GuardState, Position, Snapshot, StrategyParams};
use closebet_exchange::{
    with_retry, BrokerExecutor, MarketDataProvider, NewsProvider, OrderSide, RetryConfig,
};
use closebet_notification::{NotificationEvent, NotificationSender};
use closebet_risk::{ExitContext, ExitDecision, ExitStateMachine, RiskGuard};
use closebet_strategy::{CandidateData, EntryPipeline, PositionSizer, SizingContext};

use crate::error::{EngineError, LedgerError};
use crate::history::TradeHistory;
use crate::ledger::PositionLedger;

/// 등락률 상위 조회 종목 수. 플로어/게이트로 걸러지기 전의 풀입니다.
const TOP_CANDIDATE_POOL: usize = 20;
/// 기술적 분석용 일봉 조회 일수. 200일선 추세 판정까지 커버합니다.
const DAILY_BAR_DEPTH: usize = 260;
/// 장중 분석/청산용 분봉 조회 개수.
const MINUTE_BAR_DEPTH: usize = 120;

/// 라이브 트레이딩 엔진.
pub struct LiveEngine {
    params: StrategyParams,
    pipeline: EntryPipeline,
    guard: RiskGuard,
    exit_machine: ExitStateMachine,
    market: Arc<dyn MarketDataProvider>,
    news: Arc<dyn NewsProvider>,
    broker: Arc<dyn BrokerExecutor>,
    sizer: Arc<dyn PositionSizer>,
    notifier: Arc<dyn NotificationSender>,
    ledger: PositionLedger,
    history: TradeHistory,
    guard_state: GuardState,
    retry: RetryConfig,
}

impl LiveEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        params: StrategyParams,
        market: Arc<dyn MarketDataProvider>,
        news: Arc<dyn NewsProvider>,
        broker: Arc<dyn BrokerExecutor>,
        sizer: Arc<dyn PositionSizer>,
        notifier: Arc<dyn NotificationSender>,
        initial_cash: Decimal,
        history: TradeHistory,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            pipeline: EntryPipeline::new(&params),
            guard: RiskGuard::new(&params),
            exit_machine: ExitStateMachine::new(&params),
            market,
            news,
            broker,
            sizer,
            notifier,
            ledger: PositionLedger::new(initial_cash),
            history,
            guard_state: GuardState::new(kst_date(now)),
            retry: RetryConfig::fast(),
            params,
        }
    }

    /// 현재 원장.
    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    /// 현재 가드 상태.
    pub fn guard_state(&self) -> &GuardState {
        &self.guard_state
    }

    /// 거래 이력.
    pub fn history(&self) -> &TradeHistory {
        &self.history
    }

    /// 매수 사이클. 진입 윈도우(14:30~15:20 KST) 안에서 주기적으로
    /// 호출됩니다.
    ///
    /// 등락률 상위 풀 조회 → 종목별 데이터 수집 → 파이프라인 평가 →
    /// 승인 후보 순서대로 가드 확인·주문 집행. 데이터 조회가 실패한
    /// 종목은 이번 사이클에서 제외됩니다.
    pub async fn buy_cycle(&mut self, now: DateTime<Utc>) -> Result<(), EngineError> {
        let today = kst_date(now);
        let now_kst = kst_time(now);
        self.guard_state.roll_over(today);

        let Some((candidates, results)) = self.evaluate_market(now).await else {
            return Ok(());
        };

        for result in results.iter().filter(|r| r.approved()) {
            if let Err(block) = self.guard.can_enter(&self.guard_state, today, now_kst) {
                info!(symbol = %result.symbol, %block, "가드 차단");
                self.notify(NotificationEvent::GuardBlock {
                    symbol: result.symbol.clone(),
                    reason: block.to_string(),
                })
                .await;
                // 가드 조건은 종목과 무관하므로 이번 사이클 전체 중단
                break;
            }

            let Some(data) = candidates
                .iter()
                .find(|c| c.snapshot.symbol == result.symbol)
            else {
                continue;
            };
            self.try_enter(result, &data.snapshot, now).await;
        }

        Ok(())
    }

    /// 매도 사이클. 장 시작(09:00)부터 강제 청산(10:00)까지 분 단위로
    /// 호출됩니다.
    ///
    /// 열린 포지션마다 청산 상태머신을 평가합니다. 틱당 판정은 정확히
    /// 하나이며, 시세 조회 실패 종목은 다음 틱으로 미룹니다.
    pub async fn sell_cycle(&mut self, now: DateTime<Utc>) -> Result<(), EngineError> {
        let now_kst = kst_time(now);
        // 전일 진입분의 청산 손익은 청산일 기준으로 집계
        self.guard_state.roll_over(kst_date(now));

        let index_change_pct = match with_retry(&self.retry, "index_change_pct", || {
            self.market.index_change_pct()
        })
        .await
        {
            Ok(pct) => pct,
            Err(error) => {
                warn!(%error, "지수 조회 실패, 매도 사이클 건너뜀");
                return Ok(());
            }
        };

        for id in self.ledger.position_ids() {
            let Some(position) = self.ledger.position(id).cloned() else {
                continue;
            };
            let symbol = position.symbol.clone();

            let snapshot = match with_retry(&self.retry, "snapshot", || {
                self.market.snapshot(&symbol)
            })
            .await
            {
                Ok(snapshot) => snapshot,
                Err(error) => {
                    warn!(%symbol, %error, "시세 조회 실패, 다음 틱으로 연기");
                    continue;
                }
            };
            let minute_bars = match with_retry(&self.retry, "minute_bars", || {
                self.market.minute_bars(&symbol, MINUTE_BAR_DEPTH)
            })
            .await
            {
                Ok(bars) => bars,
                Err(error) => {
                    warn!(%symbol, %error, "분봉 조회 실패, 다음 틱으로 연기");
                    continue;
                }
            };

            let ctx = ExitContext {
                now_kst,
                current_price: snapshot.price,
                index_change_pct,
                open_price: snapshot.open_price,
                minute_bars: &minute_bars,
            };

            match self.exit_machine.evaluate(&position, &ctx) {
                ExitDecision::Hold => {}
                ExitDecision::FullClose { reason } => {
                    self.close_position(&position, snapshot.price, reason, now)
                        .await?;
                }
                ExitDecision::TierClose {
                    reason, last: true, ..
                } => {
                    // 마지막 티어는 잔량 전체를 쓸어 담음
                    self.close_position(&position, snapshot.price, reason, now)
                        .await?;
                }
                ExitDecision::TierClose {
                    tier_index,
                    ratio,
                    last: false,
                    reason,
                } => {
                    self.partial_exit(&position, tier_index, ratio, snapshot.price, reason, now)
                        .await?;
                }
            }
        }

        Ok(())
    }

    /// 일일 마감 요약 알림. 스케줄러가 장 마감 후 호출합니다.
    pub async fn send_daily_summary(&self) {
        let today = self.guard_state.trading_day;
        let closed_today: Vec<_> = self
            .history
            .records()
            .iter()
            .filter(|r| kst_date(r.exit_time) == today)
            .collect();
        self.notify(NotificationEvent::DailySummary {
            trading_day: today,
            trades: closed_today.len(),
            wins: closed_today.iter().filter(|r| r.is_win()).count(),
            daily_pnl_pct: self.guard_state.daily_pnl_pct,
        })
        .await;
    }

    /// 시장 조회 + 파이프라인 평가. 주문 없이 순위만 보는 scan과
    /// 실제 진입하는 buy_cycle이 공유합니다.
    async fn evaluate_market(
        &self,
        now: DateTime<Utc>,
    ) -> Option<(Vec<CandidateData>, Vec<EnsembleResult>)> {
        let top = match with_retry(&self.retry, "top_by_change", || {
            self.market.top_by_change(TOP_CANDIDATE_POOL)
        })
        .await
        {
            Ok(snapshots) => snapshots,
            Err(error) => {
                warn!(%error, "등락률 상위 조회 실패, 사이클 건너뜀");
                return None;
            }
        };

        let candidates = self.fetch_candidates(top).await;
        if candidates.is_empty() {
            return None;
        }

        let stats = self.history.statistics(self.params.kelly_recent_trades);
        let ctx = SizingContext {
            stats: &stats,
            score: Decimal::ZERO,
            consecutive_losses: self.guard_state.consecutive_losses,
            daily_pnl_pct: self.guard_state.daily_pnl_pct,
        };
        let results = self
            .pipeline
            .evaluate(&candidates, kst_time(now), self.sizer.as_ref(), &ctx);
        Some((candidates, results))
    }

    /// 주문 없이 현재 시장의 후보 순위만 평가합니다.
    pub async fn scan(&self, now: DateTime<Utc>) -> Vec<EnsembleResult> {
        self.evaluate_market(now)
            .await
            .map(|(_, results)| results)
            .unwrap_or_default()
    }

    /// 후보 풀 전체의 평가 입력 데이터를 동시 수집합니다.
    /// 하나라도 실패한 종목은 결과에서 빠집니다.
    async fn fetch_candidates(&self, pool: Vec<Snapshot>) -> Vec<CandidateData> {
        let fetches = pool.into_iter().map(|snapshot| {
            let market = Arc::clone(&self.market);
            let news = Arc::clone(&self.news);
            let retry = self.retry.clone();
            async move {
                let symbol = snapshot.symbol.clone();

                let daily_bars = with_retry(&retry, "daily_bars", || {
                    market.daily_bars(&symbol, DAILY_BAR_DEPTH)
                })
                .await;
                let minute_bars = with_retry(&retry, "minute_bars", || {
                    market.minute_bars(&symbol, MINUTE_BAR_DEPTH)
                })
                .await;
                let headlines =
                    with_retry(&retry, "recent_headlines", || news.recent_headlines(&symbol))
                        .await;

                match (daily_bars, minute_bars, headlines) {
                    (Ok(daily_bars), Ok(minute_bars), Ok(headlines)) => Some(CandidateData {
                        snapshot,
                        daily_bars,
                        minute_bars,
                        headlines,
                    }),
                    (daily, minute, news) => {
                        let error = [
                            daily.err().map(|e| e.to_string()),
                            minute.err().map(|e| e.to_string()),
                            news.err().map(|e| e.to_string()),
                        ]
                        .into_iter()
                        .flatten()
                        .collect::<Vec<_>>()
                        .join("; ");
                        warn!(%symbol, %error, "후보 데이터 수집 실패, 제외");
                        None
                    }
                }
            }
        });

        join_all(fetches).await.into_iter().flatten().collect()
    }

    /// 승인된 후보 1건의 진입 시도. 원장 개설 → 주문 집행 순서이며,
    /// 주문 거부 시 개설을 롤백합니다.
    async fn try_enter(&mut self, result: &EnsembleResult, snapshot: &Snapshot, now: DateTime<Utc>) {
        let position = match self.ledger.open(
            &result.symbol,
            &result.name,
            result.weight,
            snapshot.price,
            now,
            &self.params,
        ) {
            Ok(position) => position,
            Err(LedgerError::ZeroQuantity { .. }) => {
                info!(symbol = %result.symbol, "배정 예산으로 1주 미만, 진입 생략");
                return;
            }
            Err(error) => {
                warn!(symbol = %result.symbol, %error, "원장 개설 실패");
                return;
            }
        };

        let order = with_retry(&RetryConfig::no_retry(), "place_order", || {
            self.broker
                .place_order(&result.symbol, position.quantity, snapshot.price, OrderSide::Buy)
        })
        .await;

        if let Err(error) = order {
            warn!(symbol = %result.symbol, %error, "매수 주문 실패, 원장 롤백");
            if let Err(rollback) = self.ledger.rollback_open(position.id) {
                warn!(symbol = %result.symbol, %rollback, "롤백 실패");
            }
            return;
        }

        self.guard.record_entry(&mut self.guard_state);
        info!(
            symbol = %result.symbol,
            score = %result.score,
            tier = %result.entry_tier,
            quantity = %position.quantity,
            "진입 체결"
        );
        self.notify(NotificationEvent::Entry {
            symbol: result.symbol.clone(),
            name: result.name.clone(),
            score: result.score,
            tier: result.entry_tier,
            weight: result.weight,
            price: snapshot.price,
            quantity: position.quantity,
        })
        .await;
    }

    /// 전량 청산. 주문 집행 성공 후에만 원장/가드/이력을 갱신합니다.
    async fn close_position(
        &mut self,
        position: &Position,
        price: Decimal,
        reason: ExitReason,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let order = with_retry(&RetryConfig::no_retry(), "place_order", || {
            self.broker.place_order(
                &position.symbol,
                position.remaining_quantity,
                price,
                OrderSide::Sell,
            )
        })
        .await;
        if let Err(error) = order {
            warn!(symbol = %position.symbol, %error, "매도 주문 실패, 다음 틱 재평가");
            return Ok(());
        }

        let record = self.ledger.close(position.id, price, reason, now)?;
        self.guard
            .record_trade_result(&mut self.guard_state, &record);
        self.notify(NotificationEvent::Exit {
            symbol: record.symbol.clone(),
            name: record.name.clone(),
            reason,
            quantity: record.quantity,
            exit_price: record.exit_price,
            pnl_pct: record.pnl_pct,
        })
        .await;
        self.history.append(record)?;
        Ok(())
    }

    /// 분할 익절 1개 티어 집행.
    async fn partial_exit(
        &mut self,
        position: &Position,
        tier_index: usize,
        ratio: Decimal,
        price: Decimal,
        reason: ExitReason,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let quantity = (position.quantity * ratio)
            .floor()
            .min(position.remaining_quantity);
        if quantity <= Decimal::ZERO {
            // 비율이 잔량을 못 채우면 전량 청산으로 정리
            return self.close_position(position, price, reason, now).await;
        }

        let order = with_retry(&RetryConfig::no_retry(), "place_order", || {
            self.broker
                .place_order(&position.symbol, quantity, price, OrderSide::Sell)
        })
        .await;
        if let Err(error) = order {
            warn!(symbol = %position.symbol, %error, "분할 매도 주문 실패, 다음 틱 재평가");
            return Ok(());
        }

        let sold = self.ledger.partial_close(position.id, tier_index, price)?;
        self.notify(NotificationEvent::Exit {
            symbol: position.symbol.clone(),
            name: position.name.clone(),
            reason,
            quantity: sold,
            exit_price: price,
            pnl_pct: position.pnl_pct(price),
        })
        .await;
        Ok(())
    }

    async fn notify(&self, event: NotificationEvent) {
        if let Err(error) = self.notifier.send(&event).await {
            warn!(%error, "알림 전송 실패");
        }
    }
}
