//! Equity protection controller.
//!
//! Tracks running capital against its high-water mark and the current
//! trading day's baseline, and maps the result onto a trading
//! permission and a position-size multiplier. Transitions are
//! level-triggered: the state is recomputed from the thresholds on
//! every update, so recovery is automatic and symmetric once capital
//! climbs back above a threshold. The controller has no wall-clock
//! awareness; the caller signals day boundaries via [`EquityProtection::roll_day`].

use crate::domain::error::SentraderError;

/// Protection state, ordered from most to least permissive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionStatus {
    Active,
    Reduced,
    Suspended,
}

impl ProtectionStatus {
    /// Rank for monotonicity checks: higher is more restrictive.
    pub fn severity(&self) -> u8 {
        match self {
            ProtectionStatus::Active => 0,
            ProtectionStatus::Reduced => 1,
            ProtectionStatus::Suspended => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProtectionParams {
    pub max_drawdown_pct: f64,
    pub max_daily_loss_pct: f64,
    pub consecutive_loss_limit: u32,
    /// Position-size multiplier applied while in `Reduced`.
    pub reduced_size_factor: f64,
}

impl Default for ProtectionParams {
    fn default() -> Self {
        ProtectionParams {
            max_drawdown_pct: 0.10,
            max_daily_loss_pct: 0.02,
            consecutive_loss_limit: 3,
            reduced_size_factor: 0.5,
        }
    }
}

/// Read-only view of the equity state for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtectionSnapshot {
    pub status: ProtectionStatus,
    pub current_capital: f64,
    pub peak_capital: f64,
    pub daily_start_capital: f64,
    pub drawdown: f64,
    pub daily_loss: f64,
    pub consecutive_losses: u32,
}

#[derive(Debug, Clone)]
pub struct EquityProtection {
    params: ProtectionParams,
    current_capital: f64,
    peak_capital: f64,
    daily_start_capital: f64,
    consecutive_losses: u32,
    status: ProtectionStatus,
    trigger_reason: Option<&'static str>,
}

impl EquityProtection {
    pub fn new(initial_capital: f64, params: ProtectionParams) -> Self {
        EquityProtection {
            params,
            current_capital: initial_capital,
            peak_capital: initial_capital,
            daily_start_capital: initial_capital,
            consecutive_losses: 0,
            status: ProtectionStatus::Active,
            trigger_reason: None,
        }
    }

    pub fn current_capital(&self) -> f64 {
        self.current_capital
    }

    pub fn status(&self) -> ProtectionStatus {
        self.status
    }

    /// Percentage decline from the high-water mark.
    pub fn drawdown(&self) -> f64 {
        if self.peak_capital > 0.0 {
            (self.peak_capital - self.current_capital) / self.peak_capital
        } else {
            0.0
        }
    }

    /// Percentage decline from the start of the current trading day.
    pub fn daily_loss(&self) -> f64 {
        if self.daily_start_capital > 0.0 {
            (self.daily_start_capital - self.current_capital) / self.daily_start_capital
        } else {
            0.0
        }
    }

    /// Apply one realized trade result and re-evaluate the state.
    ///
    /// A NaN or infinite pnl is rejected and not applied; once
    /// absorbed into the capital trace it could never be backed out
    /// again.
    pub fn update(&mut self, realized_pnl: f64) -> Result<ProtectionStatus, SentraderError> {
        if !realized_pnl.is_finite() {
            return Err(SentraderError::invalid_input(format!(
                "realized pnl must be finite, got {realized_pnl}"
            )));
        }

        self.current_capital += realized_pnl;
        if self.current_capital > self.peak_capital {
            self.peak_capital = self.current_capital;
        }

        if realized_pnl < 0.0 {
            self.consecutive_losses += 1;
        } else if realized_pnl > 0.0 {
            self.consecutive_losses = 0;
        }

        self.reevaluate();
        Ok(self.status)
    }

    /// Reset the daily baseline to current capital. Must be invoked
    /// exactly once per trading-day boundary by the caller.
    pub fn roll_day(&mut self) {
        self.daily_start_capital = self.current_capital;
        self.reevaluate();
    }

    fn reevaluate(&mut self) {
        let drawdown = self.drawdown();
        let daily_loss = self.daily_loss();

        if drawdown >= self.params.max_drawdown_pct {
            self.status = ProtectionStatus::Suspended;
            self.trigger_reason = Some("max_drawdown exceeded");
        } else if daily_loss >= self.params.max_daily_loss_pct {
            self.status = ProtectionStatus::Suspended;
            self.trigger_reason = Some("max_daily_loss exceeded");
        } else if drawdown >= self.params.max_drawdown_pct / 2.0 {
            self.status = ProtectionStatus::Reduced;
            self.trigger_reason = Some("drawdown above half limit");
        } else if self.consecutive_losses >= self.params.consecutive_loss_limit {
            self.status = ProtectionStatus::Reduced;
            self.trigger_reason = Some("consecutive loss limit reached");
        } else {
            self.status = ProtectionStatus::Active;
            self.trigger_reason = None;
        }
    }

    /// Multiplier applied to every computed position size.
    pub fn position_size_multiplier(&self) -> f64 {
        match self.status {
            ProtectionStatus::Active => 1.0,
            ProtectionStatus::Reduced => self.params.reduced_size_factor,
            ProtectionStatus::Suspended => 0.0,
        }
    }

    /// `false` exactly when suspended, with the triggering reason so
    /// callers can report why entries are being refused.
    pub fn can_trade(&self) -> (bool, String) {
        match self.status {
            ProtectionStatus::Suspended => (
                false,
                self.trigger_reason.unwrap_or("suspended").to_string(),
            ),
            _ => (true, "trading allowed".to_string()),
        }
    }

    pub fn snapshot(&self) -> ProtectionSnapshot {
        ProtectionSnapshot {
            status: self.status,
            current_capital: self.current_capital,
            peak_capital: self.peak_capital,
            daily_start_capital: self.daily_start_capital,
            drawdown: self.drawdown(),
            daily_loss: self.daily_loss(),
            consecutive_losses: self.consecutive_losses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_protection() -> EquityProtection {
        EquityProtection::new(1_000_000.0, ProtectionParams::default())
    }

    #[test]
    fn starts_active_with_full_size() {
        let protection = make_protection();
        assert_eq!(protection.status(), ProtectionStatus::Active);
        assert!((protection.position_size_multiplier() - 1.0).abs() < f64::EPSILON);
        let (ok, _) = protection.can_trade();
        assert!(ok);
    }

    #[test]
    fn max_drawdown_suspends_with_reason() {
        let mut protection = make_protection();
        let status = protection.update(-100_000.0).unwrap();
        assert_eq!(status, ProtectionStatus::Suspended);
        assert!((protection.position_size_multiplier() - 0.0).abs() < f64::EPSILON);

        let (ok, reason) = protection.can_trade();
        assert!(!ok);
        assert_eq!(reason, "max_drawdown exceeded");
    }

    #[test]
    fn daily_loss_suspends() {
        // 2.5% down on the day but well inside the 5% half-drawdown band
        let params = ProtectionParams {
            max_drawdown_pct: 0.50,
            max_daily_loss_pct: 0.02,
            ..ProtectionParams::default()
        };
        let mut protection = EquityProtection::new(1_000_000.0, params);
        let status = protection.update(-25_000.0).unwrap();
        assert_eq!(status, ProtectionStatus::Suspended);
        let (ok, reason) = protection.can_trade();
        assert!(!ok);
        assert_eq!(reason, "max_daily_loss exceeded");
    }

    #[test]
    fn half_drawdown_reduces() {
        // loss streak limit parked high so only the drawdown band acts
        let params = ProtectionParams {
            consecutive_loss_limit: 100,
            ..ProtectionParams::default()
        };
        let mut protection = EquityProtection::new(1_000_000.0, params);
        // four days of -1.5% reach a 6% drawdown: above 5% (half of
        // 10%), below 10%, with each day inside the daily-loss limit
        for _ in 0..4 {
            protection.update(-15_000.0).unwrap();
            protection.roll_day();
        }
        assert_eq!(protection.status(), ProtectionStatus::Reduced);
        assert!((protection.position_size_multiplier() - 0.5).abs() < f64::EPSILON);
        let (ok, _) = protection.can_trade();
        assert!(ok);
    }

    #[test]
    fn consecutive_losses_reduce() {
        let params = ProtectionParams {
            max_daily_loss_pct: 0.50,
            ..ProtectionParams::default()
        };
        let mut protection = EquityProtection::new(1_000_000.0, params);
        protection.update(-1_000.0).ok();
        protection.update(-1_000.0).ok();
        assert_eq!(protection.status(), ProtectionStatus::Active);
        let status = protection.update(-1_000.0).unwrap();
        assert_eq!(status, ProtectionStatus::Reduced);
    }

    #[test]
    fn win_resets_loss_streak() {
        let params = ProtectionParams {
            max_daily_loss_pct: 0.50,
            ..ProtectionParams::default()
        };
        let mut protection = EquityProtection::new(1_000_000.0, params);
        protection.update(-1_000.0).ok();
        protection.update(-1_000.0).ok();
        protection.update(500.0).ok();
        protection.update(-1_000.0).ok();
        protection.update(-1_000.0).ok();
        assert_eq!(protection.status(), ProtectionStatus::Active);
        assert_eq!(protection.snapshot().consecutive_losses, 2);
    }

    #[test]
    fn breakeven_trade_leaves_streak_unchanged() {
        let params = ProtectionParams {
            max_daily_loss_pct: 0.50,
            ..ProtectionParams::default()
        };
        let mut protection = EquityProtection::new(1_000_000.0, params);
        protection.update(-1_000.0).ok();
        protection.update(0.0).ok();
        assert_eq!(protection.snapshot().consecutive_losses, 1);
    }

    #[test]
    fn recovery_is_automatic_and_symmetric() {
        // generous daily limit so the recovery path is pure drawdown
        let params = ProtectionParams {
            max_daily_loss_pct: 0.50,
            ..ProtectionParams::default()
        };
        let mut protection = EquityProtection::new(1_000_000.0, params);
        protection.update(-100_000.0).ok();
        assert_eq!(protection.status(), ProtectionStatus::Suspended);

        // partial recovery: 7% drawdown -> Reduced
        protection.update(30_000.0).ok();
        assert_eq!(protection.status(), ProtectionStatus::Reduced);

        // full recovery: back under half the limit -> Active
        protection.update(60_000.0).ok();
        assert_eq!(protection.status(), ProtectionStatus::Active);
        let (ok, reason) = protection.can_trade();
        assert!(ok);
        assert_eq!(reason, "trading allowed");
    }

    #[test]
    fn suspended_stays_suspended_until_recovery() {
        let mut protection = make_protection();
        protection.update(-100_000.0).ok();
        protection.update(-1.0).ok();
        assert_eq!(protection.status(), ProtectionStatus::Suspended);
        protection.update(1.0).ok();
        assert_eq!(protection.status(), ProtectionStatus::Suspended);
    }

    #[test]
    fn roll_day_resets_daily_baseline() {
        let params = ProtectionParams {
            max_drawdown_pct: 0.50,
            max_daily_loss_pct: 0.02,
            ..ProtectionParams::default()
        };
        let mut protection = EquityProtection::new(1_000_000.0, params);
        protection.update(-25_000.0).ok();
        assert_eq!(protection.status(), ProtectionStatus::Suspended);

        // new day: baseline resets to current capital, daily loss clears
        protection.roll_day();
        assert!((protection.daily_loss() - 0.0).abs() < f64::EPSILON);
        assert_eq!(protection.status(), ProtectionStatus::Active);
    }

    #[test]
    fn peak_capital_ratchets_up() {
        let mut protection = make_protection();
        protection.update(50_000.0).ok();
        protection.update(-20_000.0).ok();
        let snapshot = protection.snapshot();
        assert!((snapshot.peak_capital - 1_050_000.0).abs() < f64::EPSILON);
        assert!((snapshot.drawdown - 20_000.0 / 1_050_000.0).abs() < 1e-12);
    }

    #[test]
    fn non_finite_pnl_rejected_and_not_applied() {
        let mut protection = make_protection();
        let err = protection.update(f64::NAN).unwrap_err();
        assert!(matches!(err, SentraderError::InvalidInput { .. }));
        assert!(protection.update(f64::NEG_INFINITY).is_err());
        assert!((protection.current_capital() - 1_000_000.0).abs() < f64::EPSILON);
        assert_eq!(protection.status(), ProtectionStatus::Active);
    }

    #[test]
    fn drawdown_reason_takes_precedence() {
        // single hit breaching both limits reports the drawdown reason
        let mut protection = make_protection();
        protection.update(-150_000.0).ok();
        let (_, reason) = protection.can_trade();
        assert_eq!(reason, "max_drawdown exceeded");
    }

    #[test]
    fn severity_ordering() {
        assert!(ProtectionStatus::Active.severity() < ProtectionStatus::Reduced.severity());
        assert!(ProtectionStatus::Reduced.severity() < ProtectionStatus::Suspended.severity());
    }
}
