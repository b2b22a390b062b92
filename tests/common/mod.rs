#![allow(dead_code)]

use chrono::NaiveDate;
use sentrader::domain::config::EngineConfig;
use sentrader::domain::error::SentraderError;
pub use sentrader::domain::ohlcv::Bar;
use sentrader::domain::signal::{Action, Signal};
use sentrader::domain::strategy::Strategy;
use sentrader::ports::data_port::DataPort;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, code: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(code.to_string(), bars);
        self
    }

    pub fn with_error(mut self, code: &str, reason: &str) -> Self {
        self.errors.insert(code.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_ohlcv(
        &self,
        code: &str,
        _exchange: &str,
        _start_date: NaiveDate,
        _end_date: NaiveDate,
    ) -> Result<Vec<Bar>, SentraderError> {
        if let Some(reason) = self.errors.get(code) {
            return Err(SentraderError::DataSource {
                reason: reason.clone(),
            });
        }
        Ok(self.data.get(code).cloned().unwrap_or_default())
    }

    fn list_symbols(&self, _exchange: &str) -> Result<Vec<String>, SentraderError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        code: &str,
        _exchange: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, SentraderError> {
        let bars = match self.data.get(code) {
            Some(bars) if !bars.is_empty() => bars,
            _ => return Ok(None),
        };
        Ok(Some((
            bars.first().unwrap().date,
            bars.last().unwrap().date,
            bars.len(),
        )))
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn make_bar(code: &str, day: &str, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar {
        code: code.to_string(),
        exchange: "TWSE".to_string(),
        date: date(day),
        open,
        high,
        low,
        close,
        volume: 25_000,
    }
}

pub fn flat_bar(code: &str, day: &str, price: f64) -> Bar {
    make_bar(code, day, price, price, price, price)
}

/// Deterministic gently-waving daily series starting at `start`.
pub fn generate_bars(code: &str, start: &str, count: usize, base: f64) -> Vec<Bar> {
    let start = date(start);
    (0..count)
        .map(|i| {
            let close = base + (i as f64 * 0.3).sin() * base * 0.03;
            let open = base + ((i as f64 - 1.0) * 0.3).sin() * base * 0.03;
            let high = open.max(close) + base * 0.005;
            let low = open.min(close) - base * 0.005;
            Bar {
                code: code.to_string(),
                exchange: "TWSE".to_string(),
                date: start + chrono::Duration::days(i as i64),
                open,
                high,
                low,
                close,
                volume: 25_000,
            }
        })
        .collect()
}

/// Frictionless, protection-quiet config for exact-fill assertions.
pub fn quiet_config() -> EngineConfig {
    EngineConfig {
        commission_rate: 0.0,
        min_commission: 0.0,
        tax_rate_standard: 0.0,
        tax_rate_intraday: 0.0,
        slippage_bps: 0.0,
        max_position_pct: 0.5,
        max_drawdown_pct: 0.9,
        max_daily_loss_pct: 0.9,
        consecutive_loss_limit: 100,
        ..EngineConfig::default()
    }
}

/// Emits the scripted action when the history reaches the given
/// index; Hold otherwise.
#[derive(Debug)]
pub struct Scripted {
    actions: Vec<(usize, Action)>,
}

impl Scripted {
    pub fn new(actions: Vec<(usize, Action)>) -> Self {
        Scripted { actions }
    }
}

impl Strategy for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    fn generate_signal(&mut self, history: &[Bar]) -> Signal {
        let i = history.len() - 1;
        for (at, action) in &self.actions {
            if *at == i {
                return Signal {
                    action: *action,
                    strength: None,
                };
            }
        }
        Signal::hold()
    }
}
