//! Strategy boundary.
//!
//! A strategy only ever receives the causal bar history: the slice
//! handed to `generate_signal` ends at the decision bar, so a
//! conforming implementation cannot read the future even by accident.
//! The returned signal is realized by the engine one bar later.

use crate::domain::indicator::sma;
use crate::domain::ohlcv::Bar;
use crate::domain::signal::Signal;

pub trait Strategy: std::fmt::Debug {
    fn name(&self) -> &str;

    /// Decide an action from past bars only. `history` is ordered and
    /// ends at the bar just completed.
    fn generate_signal(&mut self, history: &[Bar]) -> Signal;
}

/// Moving-average crossover: buy when the fast SMA crosses above the
/// slow SMA, sell when it crosses below.
#[derive(Debug, Clone)]
pub struct SmaCross {
    fast: usize,
    slow: usize,
}

impl SmaCross {
    pub fn new(fast: usize, slow: usize) -> Self {
        SmaCross { fast, slow }
    }
}

impl Strategy for SmaCross {
    fn name(&self) -> &str {
        "sma_cross"
    }

    fn generate_signal(&mut self, history: &[Bar]) -> Signal {
        // need the bar before the crossing too
        if history.len() < self.slow + 1 {
            return Signal::hold();
        }

        let fast = sma(history, self.fast);
        let slow = sma(history, self.slow);

        let i = history.len() - 1;
        let (f_prev, f_curr) = (fast[i - 1], fast[i]);
        let (s_prev, s_curr) = (slow[i - 1], slow[i]);
        if !f_prev.is_finite() || !s_prev.is_finite() {
            return Signal::hold();
        }

        if f_prev <= s_prev && f_curr > s_curr {
            Signal::buy()
        } else if f_prev >= s_prev && f_curr < s_curr {
            Signal::sell()
        } else {
            Signal::hold()
        }
    }
}
