//! Bar data access port trait.
//!
//! Implementations deliver bars already sorted by date; the engine
//! still re-validates the bar invariant and ordering on ingest.

use crate::domain::error::SentraderError;
use crate::domain::ohlcv::Bar;
use chrono::NaiveDate;

pub trait DataPort {
    fn fetch_ohlcv(
        &self,
        code: &str,
        exchange: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Bar>, SentraderError>;

    fn list_symbols(&self, exchange: &str) -> Result<Vec<String>, SentraderError>;

    fn get_data_range(
        &self,
        code: &str,
        exchange: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, SentraderError>;
}
