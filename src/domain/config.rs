//! Engine configuration.
//!
//! One immutable, fully-validated structure constructed at startup.
//! Every recognized option is enumerated here with its default and
//! valid range; out-of-range values fail at construction, not at
//! first use.

use crate::domain::costs::CostParams;
use crate::domain::error::SentraderError;
use crate::domain::protection::ProtectionParams;
use crate::domain::risk::RiskParams;
use crate::ports::config_port::ConfigPort;

/// All engine parameters. Rates are fractions unless stated otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Starting capital. Default 1,000,000; must be positive.
    pub initial_capital: f64,
    /// Shares per board lot. Default 1000; at least 1.
    pub lot_size: u32,
    /// Minimum price increment. Default 0.01; must be positive.
    pub tick_size: f64,
    /// ATR lookback in bars. Default 14; at least 1.
    pub atr_period: usize,
    /// Close positions held this many bars; 0 disables. Default 0.
    pub max_hold_bars: u32,
    /// Annual risk-free rate for risk-adjusted metrics. Default 0.01;
    /// range [0, 1).
    pub risk_free_rate: f64,

    /// Commission per leg as a fraction of notional. Default 0.001425
    /// (the exchange standard rate); range [0, 0.05].
    pub commission_rate: f64,
    /// Broker discount on commission. Default 0.6; range (0, 1].
    pub commission_discount: f64,
    /// Per-leg commission floor in currency units. Default 20; >= 0.
    pub min_commission: f64,
    /// Sell-side tax for positions held overnight. Default 0.003;
    /// range [0, 0.05].
    pub tax_rate_standard: f64,
    /// Sell-side tax for intraday round trips. Default 0.0015; range
    /// [0, 0.05] and never above the standard rate.
    pub tax_rate_intraday: f64,
    /// Slippage estimate in basis points per leg pair. Default 2.0;
    /// range [0, 100].
    pub slippage_bps: f64,

    /// Capital fraction risked per trade. Default 0.02; range (0, 0.5].
    pub risk_pct_per_trade: f64,
    /// Stop distance in ATR multiples. Default 2.0; must be positive.
    pub stop_atr_multiplier: f64,
    /// Tightest allowed stop as a fraction of price. Default 0.01;
    /// range (0, 1).
    pub min_stop_pct: f64,
    /// Loosest allowed stop as a fraction of price. Default 0.06;
    /// range (0, 1) and above `min_stop_pct`.
    pub max_stop_pct: f64,
    /// Stop fraction used when ATR is unavailable. Default 0.02;
    /// range (0, 1).
    pub fixed_stop_pct: f64,
    /// Take-profit distance as a fraction of price; 0 disables.
    /// Default 0.06; range [0, 1].
    pub take_profit_pct: f64,
    /// Trailing-stop ratchet fraction; 0 disables. Default 0; range
    /// [0, 1].
    pub trailing_stop_pct: f64,
    /// Largest capital fraction in one position. Default 0.10; range
    /// (0, 1].
    pub max_position_pct: f64,
    /// Hard cap on lots per trade. Default 10; at least 1.
    pub max_lots_per_trade: u32,
    /// Hard cap on concurrently open positions. Default 1; at least 1.
    pub max_open_positions: usize,

    /// Drawdown fraction that suspends trading. Default 0.10; range
    /// (0, 1).
    pub max_drawdown_pct: f64,
    /// Single-day loss fraction that suspends trading. Default 0.02;
    /// range (0, 1).
    pub max_daily_loss_pct: f64,
    /// Loss streak that triggers reduced sizing. Default 3; at least 1.
    pub consecutive_loss_limit: u32,
    /// Position-size multiplier while reduced. Default 0.5; range
    /// (0, 1).
    pub reduced_size_factor: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            initial_capital: 1_000_000.0,
            lot_size: 1000,
            tick_size: 0.01,
            atr_period: 14,
            max_hold_bars: 0,
            risk_free_rate: 0.01,
            commission_rate: 0.001425,
            commission_discount: 0.6,
            min_commission: 20.0,
            tax_rate_standard: 0.003,
            tax_rate_intraday: 0.0015,
            slippage_bps: 2.0,
            risk_pct_per_trade: 0.02,
            stop_atr_multiplier: 2.0,
            min_stop_pct: 0.01,
            max_stop_pct: 0.06,
            fixed_stop_pct: 0.02,
            take_profit_pct: 0.06,
            trailing_stop_pct: 0.0,
            max_position_pct: 0.10,
            max_lots_per_trade: 10,
            max_open_positions: 1,
            max_drawdown_pct: 0.10,
            max_daily_loss_pct: 0.02,
            consecutive_loss_limit: 3,
            reduced_size_factor: 0.5,
        }
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> SentraderError {
    SentraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

impl EngineConfig {
    /// Build from a config source, starting from defaults and
    /// validating the result.
    pub fn from_port(port: &dyn ConfigPort) -> Result<Self, SentraderError> {
        let defaults = EngineConfig::default();

        let config = EngineConfig {
            initial_capital: port.get_double(
                "backtest",
                "initial_capital",
                defaults.initial_capital,
            ),
            lot_size: get_count(port, "backtest", "lot_size", defaults.lot_size as i64)? as u32,
            tick_size: port.get_double("backtest", "tick_size", defaults.tick_size),
            atr_period: get_count(port, "backtest", "atr_period", defaults.atr_period as i64)?
                as usize,
            max_hold_bars: get_non_negative(
                port,
                "backtest",
                "max_hold_bars",
                defaults.max_hold_bars as i64,
            )? as u32,
            risk_free_rate: port.get_double("backtest", "risk_free_rate", defaults.risk_free_rate),

            commission_rate: port.get_double("costs", "commission_rate", defaults.commission_rate),
            commission_discount: port.get_double(
                "costs",
                "commission_discount",
                defaults.commission_discount,
            ),
            min_commission: port.get_double("costs", "min_commission", defaults.min_commission),
            tax_rate_standard: port.get_double(
                "costs",
                "tax_rate_standard",
                defaults.tax_rate_standard,
            ),
            tax_rate_intraday: port.get_double(
                "costs",
                "tax_rate_intraday",
                defaults.tax_rate_intraday,
            ),
            slippage_bps: port.get_double("costs", "slippage_bps", defaults.slippage_bps),

            risk_pct_per_trade: port.get_double(
                "risk",
                "risk_pct_per_trade",
                defaults.risk_pct_per_trade,
            ),
            stop_atr_multiplier: port.get_double(
                "risk",
                "stop_atr_multiplier",
                defaults.stop_atr_multiplier,
            ),
            min_stop_pct: port.get_double("risk", "min_stop_pct", defaults.min_stop_pct),
            max_stop_pct: port.get_double("risk", "max_stop_pct", defaults.max_stop_pct),
            fixed_stop_pct: port.get_double("risk", "fixed_stop_pct", defaults.fixed_stop_pct),
            take_profit_pct: port.get_double("risk", "take_profit_pct", defaults.take_profit_pct),
            trailing_stop_pct: port.get_double(
                "risk",
                "trailing_stop_pct",
                defaults.trailing_stop_pct,
            ),
            max_position_pct: port.get_double(
                "risk",
                "max_position_pct",
                defaults.max_position_pct,
            ),
            max_lots_per_trade: get_count(
                port,
                "risk",
                "max_lots_per_trade",
                defaults.max_lots_per_trade as i64,
            )? as u32,
            max_open_positions: get_count(
                port,
                "risk",
                "max_open_positions",
                defaults.max_open_positions as i64,
            )? as usize,

            max_drawdown_pct: port.get_double(
                "protection",
                "max_drawdown_pct",
                defaults.max_drawdown_pct,
            ),
            max_daily_loss_pct: port.get_double(
                "protection",
                "max_daily_loss_pct",
                defaults.max_daily_loss_pct,
            ),
            consecutive_loss_limit: get_count(
                port,
                "protection",
                "consecutive_loss_limit",
                defaults.consecutive_loss_limit as i64,
            )? as u32,
            reduced_size_factor: port.get_double(
                "protection",
                "reduced_size_factor",
                defaults.reduced_size_factor,
            ),
        };

        config.validate()?;
        Ok(config)
    }

    /// Range-check every field.
    pub fn validate(&self) -> Result<(), SentraderError> {
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(invalid(
                "backtest",
                "initial_capital",
                "must be positive",
            ));
        }
        if self.lot_size < 1 {
            return Err(invalid("backtest", "lot_size", "must be at least 1"));
        }
        if !self.tick_size.is_finite() || self.tick_size <= 0.0 {
            return Err(invalid("backtest", "tick_size", "must be positive"));
        }
        if self.atr_period < 1 {
            return Err(invalid("backtest", "atr_period", "must be at least 1"));
        }
        if !(0.0..1.0).contains(&self.risk_free_rate) {
            return Err(invalid(
                "backtest",
                "risk_free_rate",
                "must be between 0 and 1",
            ));
        }
        if !(0.0..=0.05).contains(&self.commission_rate) {
            return Err(invalid(
                "costs",
                "commission_rate",
                "must be between 0 and 0.05",
            ));
        }
        if self.commission_discount <= 0.0 || self.commission_discount > 1.0 {
            return Err(invalid(
                "costs",
                "commission_discount",
                "must be in (0, 1]",
            ));
        }
        if !self.min_commission.is_finite() || self.min_commission < 0.0 {
            return Err(invalid("costs", "min_commission", "must be non-negative"));
        }
        if !(0.0..=0.05).contains(&self.tax_rate_standard) {
            return Err(invalid(
                "costs",
                "tax_rate_standard",
                "must be between 0 and 0.05",
            ));
        }
        if !(0.0..=0.05).contains(&self.tax_rate_intraday) {
            return Err(invalid(
                "costs",
                "tax_rate_intraday",
                "must be between 0 and 0.05",
            ));
        }
        if self.tax_rate_intraday > self.tax_rate_standard {
            return Err(invalid(
                "costs",
                "tax_rate_intraday",
                "must not exceed tax_rate_standard",
            ));
        }
        if !(0.0..=100.0).contains(&self.slippage_bps) {
            return Err(invalid(
                "costs",
                "slippage_bps",
                "must be between 0 and 100",
            ));
        }
        if self.risk_pct_per_trade <= 0.0 || self.risk_pct_per_trade > 0.5 {
            return Err(invalid(
                "risk",
                "risk_pct_per_trade",
                "must be in (0, 0.5]",
            ));
        }
        if !self.stop_atr_multiplier.is_finite() || self.stop_atr_multiplier <= 0.0 {
            return Err(invalid("risk", "stop_atr_multiplier", "must be positive"));
        }
        if self.min_stop_pct <= 0.0 || self.min_stop_pct >= 1.0 {
            return Err(invalid("risk", "min_stop_pct", "must be in (0, 1)"));
        }
        if self.max_stop_pct <= 0.0 || self.max_stop_pct >= 1.0 {
            return Err(invalid("risk", "max_stop_pct", "must be in (0, 1)"));
        }
        if self.max_stop_pct <= self.min_stop_pct {
            return Err(invalid(
                "risk",
                "max_stop_pct",
                "must be greater than min_stop_pct",
            ));
        }
        if self.fixed_stop_pct <= 0.0 || self.fixed_stop_pct >= 1.0 {
            return Err(invalid("risk", "fixed_stop_pct", "must be in (0, 1)"));
        }
        if !(0.0..=1.0).contains(&self.take_profit_pct) {
            return Err(invalid("risk", "take_profit_pct", "must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.trailing_stop_pct) {
            return Err(invalid("risk", "trailing_stop_pct", "must be in [0, 1]"));
        }
        if self.max_position_pct <= 0.0 || self.max_position_pct > 1.0 {
            return Err(invalid("risk", "max_position_pct", "must be in (0, 1]"));
        }
        if self.max_lots_per_trade < 1 {
            return Err(invalid("risk", "max_lots_per_trade", "must be at least 1"));
        }
        if self.max_open_positions < 1 {
            return Err(invalid("risk", "max_open_positions", "must be at least 1"));
        }
        if self.max_drawdown_pct <= 0.0 || self.max_drawdown_pct >= 1.0 {
            return Err(invalid(
                "protection",
                "max_drawdown_pct",
                "must be in (0, 1)",
            ));
        }
        if self.max_daily_loss_pct <= 0.0 || self.max_daily_loss_pct >= 1.0 {
            return Err(invalid(
                "protection",
                "max_daily_loss_pct",
                "must be in (0, 1)",
            ));
        }
        if self.consecutive_loss_limit < 1 {
            return Err(invalid(
                "protection",
                "consecutive_loss_limit",
                "must be at least 1",
            ));
        }
        if self.reduced_size_factor <= 0.0 || self.reduced_size_factor >= 1.0 {
            return Err(invalid(
                "protection",
                "reduced_size_factor",
                "must be in (0, 1)",
            ));
        }
        Ok(())
    }

    pub fn cost_params(&self) -> CostParams {
        CostParams {
            commission_rate: self.commission_rate,
            commission_discount: self.commission_discount,
            min_commission: self.min_commission,
            tax_rate_standard: self.tax_rate_standard,
            tax_rate_intraday: self.tax_rate_intraday,
            slippage_bps: self.slippage_bps,
            lot_size: self.lot_size,
        }
    }

    pub fn risk_params(&self) -> RiskParams {
        RiskParams {
            risk_pct_per_trade: self.risk_pct_per_trade,
            stop_atr_multiplier: self.stop_atr_multiplier,
            min_stop_pct: self.min_stop_pct,
            max_stop_pct: self.max_stop_pct,
            fixed_stop_pct: self.fixed_stop_pct,
            take_profit_pct: self.take_profit_pct,
            max_position_pct: self.max_position_pct,
            max_lots_per_trade: self.max_lots_per_trade,
            max_open_positions: self.max_open_positions,
            lot_size: self.lot_size,
            tick_size: self.tick_size,
        }
    }

    pub fn protection_params(&self) -> ProtectionParams {
        ProtectionParams {
            max_drawdown_pct: self.max_drawdown_pct,
            max_daily_loss_pct: self.max_daily_loss_pct,
            consecutive_loss_limit: self.consecutive_loss_limit,
            reduced_size_factor: self.reduced_size_factor,
        }
    }
}

fn get_count(
    port: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, SentraderError> {
    let value = port.get_int(section, key, default);
    if value < 1 {
        return Err(invalid(section, key, "must be at least 1"));
    }
    Ok(value)
}

fn get_non_negative(
    port: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, SentraderError> {
    let value = port.get_int(section, key, default);
    if value < 0 {
        return Err(invalid(section, key, "must be non-negative"));
    }
    Ok(value)
}
