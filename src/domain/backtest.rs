//! Backtest engine: causal bar replay with protection feedback.
//!
//! The session owns the replay buffer and is the only thing that hands
//! slices to the strategy, so a signal computed at bar `i` can only
//! ever see bars `[0..=i]`. Non-HOLD signals are realized at the next
//! bar's open. Exits are resolved against the realized bar's range in
//! a fixed priority: stop-loss, take-profit, strategy exit signal,
//! time limit. A bar spanning both stop and target resolves
//! stop-first. Every closed trade is priced by the cost model and fed
//! into the protection controller before the next bar is evaluated.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDate;

use crate::domain::config::EngineConfig;
use crate::domain::costs::{CostModel, TradeClass};
use crate::domain::error::SentraderError;
use crate::domain::ohlcv::Bar;
use crate::domain::position::{ExitReason, Position, Trade};
use crate::domain::protection::{EquityProtection, ProtectionSnapshot};
use crate::domain::risk::RiskManager;
use crate::domain::signal::{Action, Signal};
use crate::domain::strategy::Strategy;

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    /// Realized capital plus open-position value at the bar close.
    pub equity: f64,
}

/// Everything a run produces: the ledger, the capital trace, and the
/// final protection state. Summary statistics derive from this alone.
#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub code: String,
    pub initial_capital: f64,
    pub final_capital: f64,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub protection: ProtectionSnapshot,
    /// Buy signals refused because the controller had suspended trading.
    pub entries_blocked: usize,
    /// Entries sized with the fixed-stop fallback (ATR unavailable).
    pub entries_degraded: usize,
}

/// Incremental Wilder ATR so sizing never rescans the whole buffer.
#[derive(Debug, Clone)]
struct AtrState {
    period: usize,
    count: usize,
    tr_sum: f64,
    value: f64,
}

impl AtrState {
    fn new(period: usize) -> Self {
        AtrState {
            period,
            count: 0,
            tr_sum: 0.0,
            value: f64::NAN,
        }
    }

    fn update(&mut self, true_range: f64) {
        self.count += 1;
        if self.count <= self.period {
            self.tr_sum += true_range;
            if self.count == self.period {
                self.value = self.tr_sum / self.period as f64;
            }
        } else {
            self.value =
                (self.value * (self.period as f64 - 1.0) + true_range) / self.period as f64;
        }
    }
}

/// One symbol's simulation state. Backtests replay a bar slice through
/// it via [`run_backtest`]; a live caller feeds [`process_bar`] once
/// per newly-arrived bar instead. There is no suspension point inside
/// a bar: each call runs signal, sizing, fill, cost, and protection
/// update to completion.
///
/// [`process_bar`]: BacktestSession::process_bar
pub struct BacktestSession<'a> {
    code: String,
    config: &'a EngineConfig,
    strategy: &'a mut dyn Strategy,
    costs: CostModel,
    risk: RiskManager,
    protection: EquityProtection,
    atr: AtrState,
    history: Vec<Bar>,
    pending: Option<Signal>,
    position: Option<Position>,
    trades: Vec<Trade>,
    equity_curve: Vec<EquityPoint>,
    entries_blocked: usize,
    entries_degraded: usize,
}

impl<'a> BacktestSession<'a> {
    pub fn new(
        code: &str,
        strategy: &'a mut dyn Strategy,
        config: &'a EngineConfig,
    ) -> Result<Self, SentraderError> {
        config.validate()?;
        Ok(BacktestSession {
            code: code.to_string(),
            config,
            strategy,
            costs: CostModel::new(config.cost_params()),
            risk: RiskManager::new(config.risk_params()),
            protection: EquityProtection::new(config.initial_capital, config.protection_params()),
            atr: AtrState::new(config.atr_period),
            history: Vec::new(),
            pending: None,
            position: None,
            trades: Vec::new(),
            equity_curve: Vec::new(),
            entries_blocked: 0,
            entries_degraded: 0,
        })
    }

    /// Advance the simulation by one bar.
    ///
    /// Bars must belong to this session's symbol and arrive in strictly
    /// increasing date order; anything else is a `DataIntegrity` error
    /// that aborts the run, since skipping a bar would silently break
    /// the causal ordering guarantee.
    pub fn process_bar(&mut self, bar: Bar) -> Result<(), SentraderError> {
        bar.validate()?;
        if bar.code != self.code {
            return Err(SentraderError::DataIntegrity {
                code: bar.code.clone(),
                date: bar.date,
                reason: format!("bar for wrong symbol, session is {}", self.code),
            });
        }
        if let Some(last) = self.history.last() {
            if bar.date <= last.date {
                return Err(SentraderError::DataIntegrity {
                    code: bar.code.clone(),
                    date: bar.date,
                    reason: format!("bar out of order, previous date {}", last.date),
                });
            }
            // each bar is a new trading day at this granularity
            self.protection.roll_day();
        }

        let pending = self.pending.take();

        // resolve the open position against the realized bar
        if let Some(position) = self.position.take() {
            match self.resolve_exit(&position, &bar, pending) {
                Some((exit_price, reason)) => {
                    self.close_position(position, exit_price, bar.date, reason)?;
                }
                None => self.position = Some(position),
            }
        }

        // realize a pending buy at this bar's open
        if self.position.is_none() {
            if let Some(signal) = pending {
                if signal.action == Action::Buy {
                    self.try_enter(&bar)?;
                }
            }
        }

        // ratchet the trailing stop on the surviving position
        if self.config.trailing_stop_pct > 0.0 {
            if let Some(position) = self.position.as_mut() {
                let trail = self.config.trailing_stop_pct;
                let profit_pct = (bar.close - position.entry_price) / position.entry_price;
                if profit_pct > 2.0 * trail {
                    let raw = position.entry_price * (1.0 + trail);
                    let new_stop =
                        (raw / self.config.tick_size).round() * self.config.tick_size;
                    if new_stop > position.stop_loss {
                        position.stop_loss = new_stop;
                    }
                }
            }
        }

        if let Some(position) = self.position.as_mut() {
            position.bars_held += 1;
        }

        // the bar is complete: fold it into the ATR state and the
        // causal history, then let the strategy decide for the next bar
        if let Some(prev) = self.history.last() {
            self.atr.update(bar.true_range(prev.close));
        }
        self.history.push(bar);
        self.pending = Some(self.strategy.generate_signal(&self.history));

        let close = self.history.last().map(|b| b.close).unwrap_or(0.0);
        let date = self.history.last().map(|b| b.date).unwrap_or_default();
        let unrealized = self
            .position
            .as_ref()
            .map(|p| p.unrealized_pnl(close, self.config.lot_size))
            .unwrap_or(0.0);
        self.equity_curve.push(EquityPoint {
            date,
            equity: self.protection.current_capital() + unrealized,
        });

        Ok(())
    }

    /// Exit price and reason for a position carried into `bar`, or
    /// None to keep holding. Priority: stop, target, exit signal,
    /// time limit.
    fn resolve_exit(
        &self,
        position: &Position,
        bar: &Bar,
        pending: Option<Signal>,
    ) -> Option<(f64, ExitReason)> {
        if position.stop_hit(bar.low) {
            return Some((position.stop_loss, ExitReason::StopLoss));
        }
        if position.target_hit(bar.high) {
            return Some((position.take_profit.unwrap_or(bar.high), ExitReason::TakeProfit));
        }
        if let Some(signal) = pending {
            if signal.action == Action::Sell {
                return Some((bar.open, ExitReason::Signal));
            }
        }
        if self.config.max_hold_bars > 0 && position.bars_held >= self.config.max_hold_bars {
            return Some((bar.close, ExitReason::TimeLimit));
        }
        None
    }

    fn try_enter(&mut self, bar: &Bar) -> Result<(), SentraderError> {
        let (allowed, _reason) = self.protection.can_trade();
        if !allowed {
            self.entries_blocked += 1;
            return Ok(());
        }

        let sizing = self.risk.size_position(
            bar.open,
            self.atr.value,
            self.protection.current_capital(),
            self.protection.position_size_multiplier(),
            0,
        )?;

        // a zero-quantity result is "no trade", not an error
        if sizing.lots == 0 {
            return Ok(());
        }
        if sizing.degraded {
            self.entries_degraded += 1;
        }

        let position = Position {
            code: self.code.clone(),
            lots: sizing.lots,
            entry_price: bar.open,
            entry_date: bar.date,
            stop_loss: sizing.stop_loss,
            take_profit: sizing.take_profit,
            bars_held: 0,
            degraded_sizing: sizing.degraded,
        };

        // the entry bar's own range can already take the position out
        if position.stop_hit(bar.low) {
            let stop = position.stop_loss;
            self.close_position(position, stop, bar.date, ExitReason::StopLoss)?;
        } else if position.target_hit(bar.high) {
            let target = position.take_profit.unwrap_or(bar.high);
            self.close_position(position, target, bar.date, ExitReason::TakeProfit)?;
        } else {
            self.position = Some(position);
        }

        Ok(())
    }

    fn close_position(
        &mut self,
        position: Position,
        exit_price: f64,
        exit_date: NaiveDate,
        reason: ExitReason,
    ) -> Result<(), SentraderError> {
        let class = if position.entry_date == exit_date {
            TradeClass::Intraday
        } else {
            TradeClass::Standard
        };
        let costs =
            self.costs
                .price_trade(position.entry_price, exit_price, position.lots, class)?;
        let net_pnl = costs.net_pnl;

        self.trades.push(Trade {
            code: position.code,
            lots: position.lots,
            entry_price: position.entry_price,
            exit_price,
            entry_date: position.entry_date,
            exit_date,
            exit_reason: reason,
            costs,
            degraded_sizing: position.degraded_sizing,
        });

        // protection state must reflect every trade closed strictly
        // before the next simulation instant
        self.protection.update(net_pnl)?;
        Ok(())
    }

    /// Force-close any open position at the last seen close and
    /// produce the run result.
    pub fn finish(mut self) -> Result<BacktestResult, SentraderError> {
        if let Some(position) = self.position.take() {
            let (close, date) = match self.history.last() {
                Some(bar) => (bar.close, bar.date),
                None => (position.entry_price, position.entry_date),
            };
            self.close_position(position, close, date, ExitReason::EndOfData)?;
            // restate the final equity point on a realized basis
            if let Some(point) = self.equity_curve.last_mut() {
                point.equity = self.protection.current_capital();
            }
        }

        Ok(BacktestResult {
            code: self.code,
            initial_capital: self.config.initial_capital,
            final_capital: self.protection.current_capital(),
            trades: self.trades,
            equity_curve: self.equity_curve,
            protection: self.protection.snapshot(),
            entries_blocked: self.entries_blocked,
            entries_degraded: self.entries_degraded,
        })
    }
}

/// Replay `bars` through a fresh session and finalize.
pub fn run_backtest(
    code: &str,
    bars: &[Bar],
    strategy: &mut dyn Strategy,
    config: &EngineConfig,
) -> Result<BacktestResult, SentraderError> {
    let mut session = BacktestSession::new(code, strategy, config)?;
    for bar in bars {
        session.process_bar(bar.clone())?;
    }
    session.finish()
}

/// Like [`run_backtest`] but cooperatively cancellable: the flag is
/// checked between bars, never mid-bar, and a stopped run finalizes
/// normally (open position force-closed at the last seen bar).
pub fn run_backtest_until(
    code: &str,
    bars: &[Bar],
    strategy: &mut dyn Strategy,
    config: &EngineConfig,
    stop: &AtomicBool,
) -> Result<BacktestResult, SentraderError> {
    let mut session = BacktestSession::new(code, strategy, config)?;
    for bar in bars {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        session.process_bar(bar.clone())?;
    }
    session.finish()
}
