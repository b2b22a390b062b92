//! Report output port trait.
//!
//! The core hands the ordered trade ledger and its summary to a
//! report writer; it never formats or persists anything itself.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::SentraderError;
use crate::domain::metrics::Metrics;

pub trait ReportPort {
    fn write(
        &self,
        result: &BacktestResult,
        metrics: &Metrics,
        output_path: &str,
    ) -> Result<(), SentraderError>;
}
