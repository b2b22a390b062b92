//! Position sizing and stop placement.
//!
//! Stop distance scales with ATR, clamped between configured
//! percentage bounds of price; a missing or non-positive ATR falls
//! back to a fixed-percentage stop and marks the result degraded
//! rather than letting an invalid number propagate. Quantity derives
//! from the per-trade risk budget, is capped by the capital-fraction
//! and per-trade lot limits, and is scaled by the protection
//! controller's multiplier. Requests past the open-position cap are
//! rejected outright, never truncated to zero.

use crate::domain::error::SentraderError;

#[derive(Debug, Clone, PartialEq)]
pub struct RiskParams {
    pub risk_pct_per_trade: f64,
    pub stop_atr_multiplier: f64,
    pub min_stop_pct: f64,
    pub max_stop_pct: f64,
    /// Stop distance as a fraction of price when ATR is unusable.
    pub fixed_stop_pct: f64,
    /// Take-profit distance as a fraction of price; 0 disables.
    pub take_profit_pct: f64,
    /// Largest fraction of capital committed to one position.
    pub max_position_pct: f64,
    pub max_lots_per_trade: u32,
    pub max_open_positions: usize,
    pub lot_size: u32,
    /// Minimum price increment of the instrument.
    pub tick_size: f64,
}

impl Default for RiskParams {
    fn default() -> Self {
        RiskParams {
            risk_pct_per_trade: 0.02,
            stop_atr_multiplier: 2.0,
            min_stop_pct: 0.01,
            max_stop_pct: 0.06,
            fixed_stop_pct: 0.02,
            take_profit_pct: 0.06,
            max_position_pct: 0.10,
            max_lots_per_trade: 10,
            max_open_positions: 1,
            lot_size: 1000,
            tick_size: 0.01,
        }
    }
}

/// Outcome of a sizing request. `lots == 0` means "no trade", which
/// the engine treats as a skip, not an error.
#[derive(Debug, Clone, PartialEq)]
pub struct Sizing {
    pub lots: u32,
    pub stop_loss: f64,
    pub take_profit: Option<f64>,
    /// Set when the fixed-percentage stop fallback was used.
    pub degraded: bool,
}

#[derive(Debug, Clone)]
pub struct RiskManager {
    params: RiskParams,
}

impl RiskManager {
    pub fn new(params: RiskParams) -> Self {
        RiskManager { params }
    }

    pub fn params(&self) -> &RiskParams {
        &self.params
    }

    /// Size a candidate long entry at `price`.
    ///
    /// `atr` is the volatility estimate at decision time (NaN or <= 0
    /// engages the fallback), `capital` the current book value, and
    /// `protection_multiplier` the equity controller's scaling factor.
    pub fn size_position(
        &self,
        price: f64,
        atr: f64,
        capital: f64,
        protection_multiplier: f64,
        open_positions: usize,
    ) -> Result<Sizing, SentraderError> {
        if open_positions >= self.params.max_open_positions {
            return Err(SentraderError::PositionLimitExceeded {
                open: open_positions,
                max: self.params.max_open_positions,
            });
        }
        if !price.is_finite() || price <= 0.0 {
            return Err(SentraderError::invalid_input(format!(
                "entry price must be positive, got {price}"
            )));
        }

        let (stop_distance, degraded) = if atr.is_finite() && atr > 0.0 {
            let distance = (atr * self.params.stop_atr_multiplier).clamp(
                price * self.params.min_stop_pct,
                price * self.params.max_stop_pct,
            );
            (distance, false)
        } else {
            (price * self.params.fixed_stop_pct, true)
        };

        let lot_shares = self.params.lot_size as f64;

        let risk_amount = capital * self.params.risk_pct_per_trade;
        let risk_lots = (risk_amount / stop_distance / lot_shares).floor();

        let max_value = capital * self.params.max_position_pct;
        let value_lots = (max_value / (price * lot_shares)).floor();

        let mut lots = risk_lots.min(value_lots).max(0.0);
        lots = (lots * protection_multiplier).floor();
        let lots = (lots as u32).min(self.params.max_lots_per_trade);

        let stop_loss = self.round_to_tick(price - stop_distance);
        let take_profit = if self.params.take_profit_pct > 0.0 {
            Some(self.round_to_tick(price * (1.0 + self.params.take_profit_pct)))
        } else {
            None
        };

        Ok(Sizing {
            lots,
            stop_loss,
            take_profit,
            degraded,
        })
    }

    fn round_to_tick(&self, price: f64) -> f64 {
        (price / self.params.tick_size).round() * self.params.tick_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loose_params() -> RiskParams {
        // caps parked high so individual rules can be tested alone
        RiskParams {
            max_position_pct: 1.0,
            max_lots_per_trade: 1000,
            ..RiskParams::default()
        }
    }

    #[test]
    fn risk_based_quantity() {
        let manager = RiskManager::new(loose_params());
        // risk 2% of 10M = 200k; stop distance = 2*2 = 4.0;
        // 200k / 4 = 50k shares = 50 lots
        let sizing = manager
            .size_position(100.0, 2.0, 10_000_000.0, 1.0, 0)
            .unwrap();
        assert_eq!(sizing.lots, 50);
        assert!(!sizing.degraded);
        assert!((sizing.stop_loss - 96.0).abs() < 1e-9);
    }

    #[test]
    fn stop_clamped_to_minimum_pct() {
        let manager = RiskManager::new(loose_params());
        // atr 0.1 * 2 = 0.2, below 1% of 100 -> clamp to 1.0
        let sizing = manager
            .size_position(100.0, 0.1, 1_000_000.0, 1.0, 0)
            .unwrap();
        assert!((sizing.stop_loss - 99.0).abs() < 1e-9);
    }

    #[test]
    fn stop_clamped_to_maximum_pct() {
        let manager = RiskManager::new(loose_params());
        // atr 10 * 2 = 20, above 6% of 100 -> clamp to 6.0
        let sizing = manager
            .size_position(100.0, 10.0, 1_000_000.0, 1.0, 0)
            .unwrap();
        assert!((sizing.stop_loss - 94.0).abs() < 1e-9);
    }

    #[test]
    fn zero_atr_uses_fixed_stop_and_flags_degraded() {
        let manager = RiskManager::new(loose_params());
        let sizing = manager
            .size_position(100.0, 0.0, 1_000_000.0, 1.0, 0)
            .unwrap();
        assert!(sizing.degraded);
        assert!((sizing.stop_loss - 98.0).abs() < 1e-9);
    }

    #[test]
    fn nan_atr_uses_fixed_stop_and_flags_degraded() {
        let manager = RiskManager::new(loose_params());
        let sizing = manager
            .size_position(100.0, f64::NAN, 1_000_000.0, 1.0, 0)
            .unwrap();
        assert!(sizing.degraded);
        assert!((sizing.stop_loss - 98.0).abs() < 1e-9);
    }

    #[test]
    fn capital_fraction_caps_quantity() {
        let params = RiskParams {
            max_position_pct: 0.10,
            max_lots_per_trade: 1000,
            ..RiskParams::default()
        };
        let manager = RiskManager::new(params);
        // risk-based count would be 50 lots; 10% of 10M buys only
        // 1M / (100 * 1000) = 10 lots
        let sizing = manager
            .size_position(100.0, 2.0, 10_000_000.0, 1.0, 0)
            .unwrap();
        assert_eq!(sizing.lots, 10);
    }

    #[test]
    fn protection_multiplier_scales_and_floors() {
        let manager = RiskManager::new(loose_params());
        let full = manager
            .size_position(100.0, 2.0, 10_000_000.0, 1.0, 0)
            .unwrap();
        let reduced = manager
            .size_position(100.0, 2.0, 10_000_000.0, 0.5, 0)
            .unwrap();
        assert_eq!(full.lots, 50);
        assert_eq!(reduced.lots, 25);
    }

    #[test]
    fn zero_multiplier_zeroes_quantity() {
        let manager = RiskManager::new(loose_params());
        let sizing = manager
            .size_position(100.0, 2.0, 10_000_000.0, 0.0, 0)
            .unwrap();
        assert_eq!(sizing.lots, 0);
    }

    #[test]
    fn max_lots_per_trade_clamps() {
        let params = RiskParams {
            max_position_pct: 1.0,
            max_lots_per_trade: 7,
            ..RiskParams::default()
        };
        let manager = RiskManager::new(params);
        let sizing = manager
            .size_position(100.0, 2.0, 10_000_000.0, 1.0, 0)
            .unwrap();
        assert_eq!(sizing.lots, 7);
    }

    #[test]
    fn small_capital_sizes_to_zero_not_error() {
        let manager = RiskManager::new(loose_params());
        // 2% of 10k = 200; 200 / 4 = 50 shares, under one lot
        let sizing = manager.size_position(100.0, 2.0, 10_000.0, 1.0, 0).unwrap();
        assert_eq!(sizing.lots, 0);
    }

    #[test]
    fn open_position_cap_rejects_request() {
        let manager = RiskManager::new(RiskParams::default());
        let err = manager
            .size_position(100.0, 2.0, 1_000_000.0, 1.0, 1)
            .unwrap_err();
        assert!(matches!(
            err,
            SentraderError::PositionLimitExceeded { open: 1, max: 1 }
        ));
    }

    #[test]
    fn invalid_price_rejected() {
        let manager = RiskManager::new(RiskParams::default());
        assert!(manager.size_position(0.0, 2.0, 1_000_000.0, 1.0, 0).is_err());
        assert!(manager
            .size_position(f64::NAN, 2.0, 1_000_000.0, 1.0, 0)
            .is_err());
    }

    #[test]
    fn prices_rounded_to_tick() {
        let params = RiskParams {
            tick_size: 0.05,
            ..loose_params()
        };
        let manager = RiskManager::new(params);
        // atr 1.26 * 2 = 2.52 distance -> raw stop 97.48 -> tick 97.50
        let sizing = manager
            .size_position(100.0, 1.26, 1_000_000.0, 1.0, 0)
            .unwrap();
        assert!((sizing.stop_loss - 97.50).abs() < 1e-9);
        // take profit 106.0 already on tick
        assert!((sizing.take_profit.unwrap() - 106.0).abs() < 1e-9);
    }

    #[test]
    fn take_profit_disabled_when_zero() {
        let params = RiskParams {
            take_profit_pct: 0.0,
            ..loose_params()
        };
        let manager = RiskManager::new(params);
        let sizing = manager
            .size_position(100.0, 2.0, 1_000_000.0, 1.0, 0)
            .unwrap();
        assert!(sizing.take_profit.is_none());
    }

    #[test]
    fn negative_capital_sizes_to_zero() {
        let manager = RiskManager::new(loose_params());
        let sizing = manager
            .size_position(100.0, 2.0, -50_000.0, 1.0, 0)
            .unwrap();
        assert_eq!(sizing.lots, 0);
    }
}
