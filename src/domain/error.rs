//! Domain error types.
//!
//! `InvalidInput` and `DataIntegrity` abort the operation that raised
//! them; substituting a zero-valued result would misstate P&L and
//! protection-state accounting downstream. Degraded-mode fallbacks are
//! not errors: they are flags on the affected result.

use chrono::NaiveDate;

/// Top-level error type for sentrader.
#[derive(Debug, thiserror::Error)]
pub enum SentraderError {
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("data integrity violation for {code} on {date}: {reason}")]
    DataIntegrity {
        code: String,
        date: NaiveDate,
        reason: String,
    },

    #[error("position limit exceeded: {open} open, maximum {max}")]
    PositionLimitExceeded { open: usize, max: usize },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error("no data for {code} on {exchange}")]
    NoData { code: String, exchange: String },

    #[error("insufficient data for {code} on {exchange}: have {bars} bars, need {minimum}")]
    InsufficientData {
        code: String,
        exchange: String,
        bars: usize,
        minimum: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SentraderError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        SentraderError::InvalidInput {
            reason: reason.into(),
        }
    }
}

impl From<&SentraderError> for std::process::ExitCode {
    fn from(err: &SentraderError) -> Self {
        let code: u8 = match err {
            SentraderError::Io(_) => 1,
            SentraderError::ConfigParse { .. }
            | SentraderError::ConfigMissing { .. }
            | SentraderError::ConfigInvalid { .. } => 2,
            SentraderError::DataSource { .. } => 3,
            SentraderError::InvalidInput { .. }
            | SentraderError::PositionLimitExceeded { .. } => 4,
            SentraderError::NoData { .. } | SentraderError::InsufficientData { .. } => 5,
            SentraderError::DataIntegrity { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_message() {
        let err = SentraderError::invalid_input("quantity must be positive");
        assert_eq!(err.to_string(), "invalid input: quantity must be positive");
    }

    #[test]
    fn data_integrity_message_includes_code_and_date() {
        let err = SentraderError::DataIntegrity {
            code: "2330".into(),
            date: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            reason: "high below low".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("2330"));
        assert!(msg.contains("2024-03-05"));
        assert!(msg.contains("high below low"));
    }

    #[test]
    fn position_limit_message() {
        let err = SentraderError::PositionLimitExceeded { open: 3, max: 3 };
        assert_eq!(
            err.to_string(),
            "position limit exceeded: 3 open, maximum 3"
        );
    }
}
