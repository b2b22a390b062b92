//! Open positions and the closed-trade ledger record.

use chrono::NaiveDate;

use crate::domain::costs::CostBreakdown;

/// Why a position was closed, in resolution priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    /// Strategy-issued exit signal.
    Signal,
    /// Held past the configured maximum number of bars.
    TimeLimit,
    /// Forced close when the bar stream ended.
    EndOfData,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::Signal => "signal",
            ExitReason::TimeLimit => "time_limit",
            ExitReason::EndOfData => "end_of_data",
        }
    }
}

/// One open long position. Owned exclusively by the session that
/// created it until closed; at most one per symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub code: String,
    pub lots: u32,
    pub entry_price: f64,
    pub entry_date: NaiveDate,
    pub stop_loss: f64,
    pub take_profit: Option<f64>,
    /// Bars elapsed since entry, counted per realized bar.
    pub bars_held: u32,
    /// Sizing used the fixed-stop fallback (ATR unavailable).
    pub degraded_sizing: bool,
}

impl Position {
    pub fn shares(&self, lot_size: u32) -> f64 {
        self.lots as f64 * lot_size as f64
    }

    pub fn unrealized_pnl(&self, price: f64, lot_size: u32) -> f64 {
        self.shares(lot_size) * (price - self.entry_price)
    }

    /// Stop triggers when the bar's low touches or crosses the stop.
    pub fn stop_hit(&self, low: f64) -> bool {
        low <= self.stop_loss
    }

    /// Target triggers when the bar's high touches or crosses it.
    pub fn target_hit(&self, high: f64) -> bool {
        match self.take_profit {
            Some(target) => high >= target,
            None => false,
        }
    }
}

/// The immutable closed record of a position. Appended to the ledger,
/// never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub code: String,
    pub lots: u32,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub exit_reason: ExitReason,
    pub costs: CostBreakdown,
    pub degraded_sizing: bool,
}

impl Trade {
    pub fn gross_pnl(&self) -> f64 {
        self.costs.gross_pnl
    }

    pub fn net_pnl(&self) -> f64 {
        self.costs.net_pnl
    }

    pub fn is_intraday(&self) -> bool {
        self.entry_date == self.exit_date
    }

    /// Traded notional over both legs, the denominator for cost-rate
    /// statistics.
    pub fn notional(&self, lot_size: u32) -> f64 {
        let shares = self.lots as f64 * lot_size as f64;
        (self.entry_price + self.exit_price) * shares
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_position() -> Position {
        Position {
            code: "2330".into(),
            lots: 2,
            entry_price: 100.0,
            entry_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            stop_loss: 96.0,
            take_profit: Some(106.0),
            bars_held: 0,
            degraded_sizing: false,
        }
    }

    #[test]
    fn shares_from_lots() {
        let pos = sample_position();
        assert!((pos.shares(1000) - 2000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unrealized_pnl_tracks_price() {
        let pos = sample_position();
        assert!((pos.unrealized_pnl(103.0, 1000) - 6000.0).abs() < f64::EPSILON);
        assert!((pos.unrealized_pnl(98.0, 1000) - (-4000.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn stop_hit_at_or_below() {
        let pos = sample_position();
        assert!(pos.stop_hit(95.0));
        assert!(pos.stop_hit(96.0));
        assert!(!pos.stop_hit(96.5));
    }

    #[test]
    fn target_hit_at_or_above() {
        let pos = sample_position();
        assert!(pos.target_hit(107.0));
        assert!(pos.target_hit(106.0));
        assert!(!pos.target_hit(105.5));
    }

    #[test]
    fn no_target_never_hits() {
        let mut pos = sample_position();
        pos.take_profit = None;
        assert!(!pos.target_hit(1_000_000.0));
    }

    #[test]
    fn exit_reason_labels() {
        assert_eq!(ExitReason::StopLoss.as_str(), "stop_loss");
        assert_eq!(ExitReason::TakeProfit.as_str(), "take_profit");
        assert_eq!(ExitReason::Signal.as_str(), "signal");
        assert_eq!(ExitReason::TimeLimit.as_str(), "time_limit");
        assert_eq!(ExitReason::EndOfData.as_str(), "end_of_data");
    }
}
