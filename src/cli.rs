//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::run_backtest;
use crate::domain::config::EngineConfig;
use crate::domain::error::SentraderError;
use crate::domain::metrics::Metrics;
use crate::domain::strategy::{SmaCross, Strategy};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "sentrader", about = "Causal trading backtester with capital protection")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        code: Option<String>,
        #[arg(long)]
        exchange: Option<String>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration without running
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List available symbols on an exchange
    ListSymbols {
        #[arg(long)]
        exchange: String,
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show data range for configured symbol(s)
    Info {
        #[arg(long)]
        code: Option<String>,
        #[arg(long)]
        exchange: Option<String>,
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            output,
            code,
            exchange,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config)
            } else {
                run_backtest_cmd(&config, output.as_ref(), code.as_deref(), exchange.as_deref())
            }
        }
        Command::Validate { config } => run_validate(&config),
        Command::ListSymbols { exchange, config } => run_list_symbols(&exchange, &config),
        Command::Info {
            code,
            exchange,
            config,
        } => run_info(code.as_deref(), exchange.as_deref(), &config),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = SentraderError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn run_backtest_cmd(
    config_path: &PathBuf,
    output_path: Option<&PathBuf>,
    code_override: Option<&str>,
    exchange_override: Option<&str>,
) -> ExitCode {
    // Stage 1: load and validate configuration
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let engine_config = match EngineConfig::from_port(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 2: resolve dates, universe, strategy
    let (start_date, end_date) = match build_date_range(&adapter) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let codes = resolve_codes(code_override, &adapter);
    if codes.is_empty() {
        eprintln!("error: no codes configured");
        return ExitCode::from(2);
    }

    let exchange = match resolve_exchange(exchange_override, &adapter) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 3: data port and replay
    let data_dir = adapter
        .get_string("data", "path")
        .unwrap_or_else(|| "data".to_string());
    let data_port = CsvAdapter::new(PathBuf::from(data_dir));

    run_backtest_pipeline(
        &data_port,
        &adapter,
        &engine_config,
        &codes,
        &exchange,
        start_date,
        end_date,
        output_path,
    )
}

/// Replay each code through its own independent book and report.
#[allow(clippy::too_many_arguments)]
pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    config_port: &dyn ConfigPort,
    engine_config: &EngineConfig,
    codes: &[String],
    exchange: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    output_path: Option<&PathBuf>,
) -> ExitCode {
    eprintln!(
        "Running backtest: {} codes on {}, {} to {}",
        codes.len(),
        exchange,
        start_date,
        end_date,
    );

    let report = CsvReportAdapter::new();
    let mut ran_any = false;

    for code in codes {
        let bars = match data_port.fetch_ohlcv(code, exchange, start_date, end_date) {
            Ok(bars) if bars.is_empty() => {
                eprintln!("warning: skipping {} (no data in range)", code);
                continue;
            }
            Ok(bars) => bars,
            Err(e) => {
                eprintln!("warning: skipping {} ({})", code, e);
                continue;
            }
        };

        let mut strategy = match build_strategy(config_port) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

        eprintln!(
            "  {}: {} bars, strategy {}",
            code,
            bars.len(),
            strategy.name()
        );

        let result = match run_backtest(code, &bars, strategy.as_mut(), engine_config) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

        let metrics = Metrics::compute(
            &result,
            engine_config.lot_size,
            engine_config.risk_free_rate,
        );
        print_summary(code, &result, &metrics);

        if let Some(output) = output_path {
            let path = resolve_output_path(output, code, codes.len());
            match report.write(&result, &metrics, &path) {
                Ok(()) => eprintln!("  ledger written to {}", path),
                Err(e) => {
                    eprintln!("error: {e}");
                    return (&e).into();
                }
            }
        }

        ran_any = true;
    }

    if !ran_any {
        eprintln!("error: no valid codes with data to backtest");
        return ExitCode::from(5);
    }
    ExitCode::SUCCESS
}

fn resolve_output_path(output: &PathBuf, code: &str, code_count: usize) -> String {
    if code_count == 1 {
        return output.display().to_string();
    }
    // one ledger per book when several codes run
    match (output.file_stem(), output.extension()) {
        (Some(stem), Some(ext)) => output
            .with_file_name(format!(
                "{}_{}.{}",
                stem.to_string_lossy(),
                code,
                ext.to_string_lossy()
            ))
            .display()
            .to_string(),
        _ => format!("{}_{}", output.display(), code),
    }
}

fn print_summary(code: &str, result: &crate::domain::backtest::BacktestResult, metrics: &Metrics) {
    eprintln!("\n=== {} ===", code);
    eprintln!("Total Return:     {:.2}%", metrics.total_return * 100.0);
    eprintln!("Annualized:       {:.2}%", metrics.annualized_return * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", metrics.sharpe_ratio);
    eprintln!("Max Drawdown:     -{:.1}%", metrics.max_drawdown * 100.0);
    eprintln!("Total Trades:     {}", metrics.total_trades);
    eprintln!("Win Rate:         {:.1}%", metrics.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", metrics.profit_factor);
    eprintln!(
        "Avg Cost:         {:.3}% of notional",
        metrics.avg_cost_fraction * 100.0
    );
    eprintln!("Final Capital:    {:.0}", result.final_capital);
    eprintln!("Protection:       {:?}", result.protection.status);
    if result.entries_blocked > 0 {
        eprintln!("Blocked Entries:  {}", result.entries_blocked);
    }
    if result.entries_degraded > 0 {
        eprintln!(
            "Degraded Sizing:  {} entries used the fixed-stop fallback",
            result.entries_degraded
        );
    }
}

/// Construct the configured strategy. Only built-in strategies are
/// recognized; external ones plug in through the library API.
pub fn build_strategy(
    config: &dyn ConfigPort,
) -> Result<Box<dyn Strategy>, SentraderError> {
    let name = config
        .get_string("strategy", "name")
        .unwrap_or_else(|| "sma_cross".to_string());

    match name.as_str() {
        "sma_cross" => {
            let fast = config.get_int("strategy", "fast_period", 20);
            let slow = config.get_int("strategy", "slow_period", 50);
            if fast < 1 || slow <= fast {
                return Err(SentraderError::ConfigInvalid {
                    section: "strategy".into(),
                    key: "fast_period".into(),
                    reason: "need 1 <= fast_period < slow_period".into(),
                });
            }
            Ok(Box::new(SmaCross::new(fast as usize, slow as usize)))
        }
        other => Err(SentraderError::ConfigInvalid {
            section: "strategy".into(),
            key: "name".into(),
            reason: format!("unknown strategy {other:?}"),
        }),
    }
}

pub fn build_date_range(
    adapter: &dyn ConfigPort,
) -> Result<(NaiveDate, NaiveDate), SentraderError> {
    let start = parse_date_key(adapter, "start_date")?;
    let end = parse_date_key(adapter, "end_date")?;
    if start >= end {
        return Err(SentraderError::ConfigInvalid {
            section: "backtest".into(),
            key: "start_date".into(),
            reason: "start_date must be before end_date".into(),
        });
    }
    Ok((start, end))
}

fn parse_date_key(adapter: &dyn ConfigPort, key: &str) -> Result<NaiveDate, SentraderError> {
    let value = adapter
        .get_string("backtest", key)
        .ok_or_else(|| SentraderError::ConfigMissing {
            section: "backtest".into(),
            key: key.into(),
        })?;
    NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|_| SentraderError::ConfigInvalid {
        section: "backtest".into(),
        key: key.into(),
        reason: "invalid date format (expected YYYY-MM-DD)".into(),
    })
}

pub fn resolve_codes(code_override: Option<&str>, config: &dyn ConfigPort) -> Vec<String> {
    if let Some(c) = code_override {
        return vec![c.to_uppercase()];
    }

    if let Some(codes_str) = config.get_string("backtest", "codes") {
        return codes_str
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
    }

    if let Some(code) = config.get_string("backtest", "code") {
        let code = code.trim().to_uppercase();
        if !code.is_empty() {
            return vec![code];
        }
    }

    vec![]
}

fn resolve_exchange(
    exchange_override: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<String, SentraderError> {
    match exchange_override {
        Some(e) => Ok(e.to_string()),
        None => config
            .get_string("backtest", "exchange")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| SentraderError::ConfigMissing {
                section: "backtest".into(),
                key: "exchange".into(),
            }),
    }
}

pub fn run_dry_run(config_path: &PathBuf) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let engine_config = match EngineConfig::from_port(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let strategy = match build_strategy(&adapter) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let dates = match build_date_range(&adapter) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let codes = resolve_codes(None, &adapter);
    if codes.is_empty() {
        eprintln!("error: no codes configured");
        return ExitCode::from(2);
    }

    eprintln!("Config validated successfully");
    eprintln!("\nEngine:");
    eprintln!("  initial_capital: {}", engine_config.initial_capital);
    eprintln!(
        "  costs: commission {} x {}, tax {}/{}, slippage {} bps",
        engine_config.commission_rate,
        engine_config.commission_discount,
        engine_config.tax_rate_standard,
        engine_config.tax_rate_intraday,
        engine_config.slippage_bps,
    );
    eprintln!(
        "  risk: {}% per trade, stop {}x ATR in [{}%, {}%]",
        engine_config.risk_pct_per_trade * 100.0,
        engine_config.stop_atr_multiplier,
        engine_config.min_stop_pct * 100.0,
        engine_config.max_stop_pct * 100.0,
    );
    eprintln!(
        "  protection: drawdown {}%, daily {}%, {} straight losses",
        engine_config.max_drawdown_pct * 100.0,
        engine_config.max_daily_loss_pct * 100.0,
        engine_config.consecutive_loss_limit,
    );
    eprintln!("\nStrategy: {}", strategy.name());
    eprintln!("\nUniverse:");
    eprintln!("  codes: {}", codes.join(", "));
    eprintln!("  window: {} to {}", dates.0, dates.1);
    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = EngineConfig::from_port(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }
    if let Err(e) = build_strategy(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    eprintln!("Configuration is valid.");
    ExitCode::SUCCESS
}

fn run_list_symbols(exchange: &str, config_path: &PathBuf) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let data_dir = config
        .get_string("data", "path")
        .unwrap_or_else(|| "data".to_string());
    let adapter = CsvAdapter::new(PathBuf::from(data_dir));

    let symbols = match adapter.list_symbols(exchange) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    if symbols.is_empty() {
        eprintln!("No symbols found for exchange {}", exchange);
    } else {
        for symbol in &symbols {
            println!("{}", symbol);
        }
        eprintln!("{} symbols found", symbols.len());
    }
    ExitCode::SUCCESS
}

fn run_info(code: Option<&str>, exchange: Option<&str>, config_path: &PathBuf) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let codes = resolve_codes(code, &config);
    if codes.is_empty() {
        eprintln!("error: no codes configured");
        return ExitCode::from(2);
    }

    let exchange = match resolve_exchange(exchange, &config) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let data_dir = config
        .get_string("data", "path")
        .unwrap_or_else(|| "data".to_string());
    let adapter = CsvAdapter::new(PathBuf::from(data_dir));

    for c in &codes {
        match adapter.get_data_range(c, &exchange) {
            Ok(Some((min_date, max_date, count))) => {
                println!(
                    "{}.{}: {} bars, {} to {}",
                    c, exchange, count, min_date, max_date
                );
            }
            Ok(None) => {
                eprintln!("{}.{}: no data found", c, exchange);
            }
            Err(e) => {
                eprintln!("error querying {}.{}: {}", c, exchange, e);
            }
        }
    }
    ExitCode::SUCCESS
}
