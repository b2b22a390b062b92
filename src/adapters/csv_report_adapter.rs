//! CSV trade-ledger report adapter.
//!
//! Writes one row per closed trade in ledger order. Summary metrics
//! are the CLI's concern; this adapter only persists the ledger.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::SentraderError;
use crate::domain::metrics::Metrics;
use crate::ports::report_port::ReportPort;

pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        CsvReportAdapter
    }
}

impl Default for CsvReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(
        &self,
        result: &BacktestResult,
        _metrics: &Metrics,
        output_path: &str,
    ) -> Result<(), SentraderError> {
        let mut writer =
            csv::Writer::from_path(output_path).map_err(|e| SentraderError::DataSource {
                reason: format!("failed to open {}: {}", output_path, e),
            })?;

        writer
            .write_record([
                "code",
                "entry_date",
                "exit_date",
                "lots",
                "entry_price",
                "exit_price",
                "gross_pnl",
                "commission",
                "tax",
                "slippage",
                "total_cost",
                "net_pnl",
                "exit_reason",
                "intraday",
                "degraded_sizing",
            ])
            .map_err(write_error)?;

        for trade in &result.trades {
            let commission = trade.costs.entry_commission + trade.costs.exit_commission;
            writer
                .write_record([
                    trade.code.clone(),
                    trade.entry_date.to_string(),
                    trade.exit_date.to_string(),
                    trade.lots.to_string(),
                    format!("{:.4}", trade.entry_price),
                    format!("{:.4}", trade.exit_price),
                    format!("{:.2}", trade.costs.gross_pnl),
                    format!("{:.2}", commission),
                    format!("{:.2}", trade.costs.tax),
                    format!("{:.2}", trade.costs.slippage),
                    format!("{:.2}", trade.costs.total_cost),
                    format!("{:.2}", trade.costs.net_pnl),
                    trade.exit_reason.as_str().to_string(),
                    trade.is_intraday().to_string(),
                    trade.degraded_sizing.to_string(),
                ])
                .map_err(write_error)?;
        }

        writer.flush().map_err(|e| SentraderError::DataSource {
            reason: format!("failed to flush {}: {}", output_path, e),
        })?;
        Ok(())
    }
}

fn write_error(e: csv::Error) -> SentraderError {
    SentraderError::DataSource {
        reason: format!("CSV write error: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backtest::EquityPoint;
    use crate::domain::costs::{CostModel, CostParams, TradeClass};
    use crate::domain::position::{ExitReason, Trade};
    use crate::domain::protection::{EquityProtection, ProtectionParams};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn make_result() -> BacktestResult {
        let model = CostModel::new(CostParams::default());
        let costs = model
            .price_trade(100.0, 102.0, 2, TradeClass::Intraday)
            .unwrap();
        let entry_date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let trade = Trade {
            code: "2330".into(),
            lots: 2,
            entry_price: 100.0,
            exit_price: 102.0,
            entry_date,
            exit_date: entry_date,
            exit_reason: ExitReason::TakeProfit,
            costs,
            degraded_sizing: false,
        };
        BacktestResult {
            code: "2330".into(),
            initial_capital: 1_000_000.0,
            final_capital: 1_003_268.0,
            trades: vec![trade],
            equity_curve: vec![EquityPoint {
                date: entry_date,
                equity: 1_003_268.0,
            }],
            protection: EquityProtection::new(1_000_000.0, ProtectionParams::default())
                .snapshot(),
            entries_blocked: 0,
            entries_degraded: 0,
        }
    }

    #[test]
    fn writes_header_and_one_row_per_trade() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trades.csv");
        let result = make_result();
        let metrics = Metrics::compute(&result, 1000, 0.01);

        CsvReportAdapter::new()
            .write(&result, &metrics, path.to_str().unwrap())
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("code,entry_date,exit_date,lots"));
        let row = lines.next().unwrap();
        assert!(row.starts_with("2330,2024-01-02,2024-01-02,2,100.0000,102.0000"));
        assert!(row.contains("take_profit"));
        assert!(row.contains("true")); // intraday
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn round_trips_through_csv_reader() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trades.csv");
        let result = make_result();
        let metrics = Metrics::compute(&result, 1000, 0.01);

        CsvReportAdapter::new()
            .write(&result, &metrics, path.to_str().unwrap())
            .unwrap();

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let records: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 1);
        let gross: f64 = records[0].get(6).unwrap().parse().unwrap();
        let net: f64 = records[0].get(11).unwrap().parse().unwrap();
        let total_cost: f64 = records[0].get(10).unwrap().parse().unwrap();
        assert!((gross - 4000.0).abs() < 0.01);
        assert!((net - (gross - total_cost)).abs() < 0.01);
    }

    #[test]
    fn unwritable_path_is_data_source_error() {
        let result = make_result();
        let metrics = Metrics::compute(&result, 1000, 0.01);
        let err = CsvReportAdapter::new()
            .write(&result, &metrics, "/nonexistent/dir/trades.csv")
            .unwrap_err();
        assert!(matches!(err, SentraderError::DataSource { .. }));
    }
}
