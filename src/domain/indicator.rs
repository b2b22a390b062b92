//! The indicator math the engine itself consumes: Wilder ATR for
//! stop-distance scaling and SMA for the reference strategy.
//!
//! Warmup values are NaN, not zero: a NaN ATR routes the position
//! sizer into its fixed-percentage fallback instead of producing a
//! nonsense stop distance.

use crate::domain::ohlcv::Bar;

/// Wilder-smoothed Average True Range.
///
/// Seed with the SMA of the first `period` true ranges, then
/// `ATR[i] = (ATR[i-1]*(period-1) + TR[i]) / period`. The first
/// `period` entries are NaN (the very first bar has no previous close).
pub fn atr(bars: &[Bar], period: usize) -> Vec<f64> {
    let mut values = vec![f64::NAN; bars.len()];
    if period == 0 || bars.len() <= period {
        return values;
    }

    let mut tr_sum = 0.0;
    let mut prev_atr = f64::NAN;

    for i in 1..bars.len() {
        let tr = bars[i].true_range(bars[i - 1].close);
        if i <= period {
            tr_sum += tr;
            if i == period {
                prev_atr = tr_sum / period as f64;
                values[i] = prev_atr;
            }
        } else {
            prev_atr = (prev_atr * (period as f64 - 1.0) + tr) / period as f64;
            values[i] = prev_atr;
        }
    }

    values
}

/// Simple moving average over closes. First `period - 1` entries are NaN.
pub fn sma(bars: &[Bar], period: usize) -> Vec<f64> {
    let mut values = vec![f64::NAN; bars.len()];
    if period == 0 || bars.len() < period {
        return values;
    }

    let mut sum: f64 = bars[..period].iter().map(|b| b.close).sum();
    values[period - 1] = sum / period as f64;

    for i in period..bars.len() {
        sum += bars[i].close - bars[i - period].close;
        values[i] = sum / period as f64;
    }

    values
}
