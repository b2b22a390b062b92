//! OHLCV bar representation and integrity checks.

use chrono::NaiveDate;

use crate::domain::error::SentraderError;

/// One OHLCV observation for a fixed time interval. Immutable once
/// ingested; the replay buffer owns bars for the duration of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub code: String,
    pub exchange: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl Bar {
    /// Check the bar invariant: all prices positive and finite,
    /// volume non-negative, and `low <= min(open, close) <=
    /// max(open, close) <= high`.
    ///
    /// A failing bar must never reach the simulation loop; skipping it
    /// silently would corrupt the causal ordering guarantee, so the
    /// caller aborts the run instead.
    pub fn validate(&self) -> Result<(), SentraderError> {
        let prices = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ];
        for (name, value) in prices {
            if !value.is_finite() || value <= 0.0 {
                return Err(self.integrity_error(format!("{name} must be a positive number")));
            }
        }
        if self.volume < 0 {
            return Err(self.integrity_error("volume must be non-negative"));
        }
        let body_low = self.open.min(self.close);
        let body_high = self.open.max(self.close);
        if self.low > body_low {
            return Err(self.integrity_error("low above open/close"));
        }
        if self.high < body_high {
            return Err(self.integrity_error("high below open/close"));
        }
        Ok(())
    }

    fn integrity_error(&self, reason: impl Into<String>) -> SentraderError {
        SentraderError::DataIntegrity {
            code: self.code.clone(),
            date: self.date,
            reason: reason.into(),
        }
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}
