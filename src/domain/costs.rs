//! Round-trip transaction cost model.
//!
//! Commission is charged on both legs at `rate * discount` with a
//! per-leg minimum; transaction tax is charged on the sell leg only,
//! at a reduced rate for intraday round trips; slippage is a cost
//! estimate over both legs, not a fill simulation. All components are
//! rounded to whole currency units. The model is a pure function of
//! its inputs: no state, no side effects.

use crate::domain::error::SentraderError;

/// Tax classification for a round trip. Intraday (same-session open
/// and close) is taxed at the lower rate. The classification is an
/// input; the model never infers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeClass {
    Intraday,
    Standard,
}

/// Cost model parameters. Rates are fractions of notional except
/// `slippage_bps`, which is in basis points.
#[derive(Debug, Clone, PartialEq)]
pub struct CostParams {
    pub commission_rate: f64,
    pub commission_discount: f64,
    pub min_commission: f64,
    pub tax_rate_standard: f64,
    pub tax_rate_intraday: f64,
    pub slippage_bps: f64,
    /// Shares per board lot; quantities are lot-denominated.
    pub lot_size: u32,
}

impl Default for CostParams {
    fn default() -> Self {
        CostParams {
            commission_rate: 0.001425,
            commission_discount: 0.6,
            min_commission: 20.0,
            tax_rate_standard: 0.003,
            tax_rate_intraday: 0.0015,
            slippage_bps: 2.0,
            lot_size: 1000,
        }
    }
}

/// Full cost breakdown for one closed round trip. Derived value;
/// persisted only as part of a `Trade`.
#[derive(Debug, Clone, PartialEq)]
pub struct CostBreakdown {
    pub entry_commission: f64,
    pub exit_commission: f64,
    pub tax: f64,
    pub slippage: f64,
    pub total_cost: f64,
    pub gross_pnl: f64,
    pub net_pnl: f64,
    /// Exit price at which the round trip would net to zero.
    pub breakeven_price: f64,
}

#[derive(Debug, Clone)]
pub struct CostModel {
    params: CostParams,
}

impl CostModel {
    pub fn new(params: CostParams) -> Self {
        CostModel { params }
    }

    pub fn params(&self) -> &CostParams {
        &self.params
    }

    /// Price a closed round trip of `lots` board lots bought at
    /// `entry_price` and sold at `exit_price`.
    ///
    /// Rejects non-finite or non-positive prices and zero quantity
    /// with `InvalidInput`; a silently coerced zero here would flow
    /// straight into the protection controller as a fake break-even.
    pub fn price_trade(
        &self,
        entry_price: f64,
        exit_price: f64,
        lots: u32,
        class: TradeClass,
    ) -> Result<CostBreakdown, SentraderError> {
        if !entry_price.is_finite() || entry_price <= 0.0 {
            return Err(SentraderError::invalid_input(format!(
                "entry price must be positive, got {entry_price}"
            )));
        }
        if !exit_price.is_finite() || exit_price <= 0.0 {
            return Err(SentraderError::invalid_input(format!(
                "exit price must be positive, got {exit_price}"
            )));
        }
        if lots == 0 {
            return Err(SentraderError::invalid_input("quantity must be positive"));
        }

        let shares = lots as f64 * self.params.lot_size as f64;

        let entry_commission = self.leg_commission(entry_price, shares);
        let exit_commission = self.leg_commission(exit_price, shares);

        let tax_rate = match class {
            TradeClass::Intraday => self.params.tax_rate_intraday,
            TradeClass::Standard => self.params.tax_rate_standard,
        };
        let tax = (exit_price * shares * tax_rate).round();

        let slippage_frac = self.params.slippage_bps / 10_000.0;
        let slippage = ((entry_price + exit_price) * shares * slippage_frac).round();

        let total_cost = entry_commission + exit_commission + tax + slippage;
        let gross_pnl = (exit_price - entry_price) * shares;
        let net_pnl = gross_pnl - total_cost;
        let breakeven_price = entry_price + total_cost / shares;

        Ok(CostBreakdown {
            entry_commission,
            exit_commission,
            tax,
            slippage,
            total_cost,
            gross_pnl,
            net_pnl,
            breakeven_price,
        })
    }

    fn leg_commission(&self, price: f64, shares: f64) -> f64 {
        let raw = price * shares * self.params.commission_rate * self.params.commission_discount;
        raw.max(self.params.min_commission).round()
    }
}
