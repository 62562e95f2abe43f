//! CLI for converting one day of vendor buyback files.
//!
//! # Usage
//!
//! ```bash
//! # Convert 2019-03-08, merging into the existing output
//! cargo run --release --bin buyback-convert -- \
//!     --raw-dir data/raw \
//!     --output-dir data/converted \
//!     --date 20190308
//!
//! # Read previous output from elsewhere, map files from an env var
//! BUYBACK_MAP_FILES=data/map_files cargo run --release --bin buyback-convert -- \
//!     --raw-dir data/raw \
//!     --output-dir data/staging \
//!     --processed-dir data/converted \
//!     --date 2019-03-08 \
//!     --report data/staging/report-20190308.json
//! ```
//!
//! Exits with status 1 unless both intentions and transactions converted.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use chrono::NaiveDate;
use clap::Parser;

use buyback_converter::schema::parse_date;
use buyback_converter::{
    run_date, ConverterConfig, EventKind, KindReport, MapFileResolver, Result, RunReport,
};

#[derive(Parser, Debug)]
#[command(name = "buyback-convert")]
#[command(about = "Convert vendor buyback disclosures into per-ticker and universe files")]
struct Args {
    /// Root of the raw vendor files ({raw-dir}/{intentions,transactions}/{yyyyMMdd}.ttx)
    #[arg(long)]
    raw_dir: PathBuf,

    /// Root the converted files are written to
    #[arg(long)]
    output_dir: PathBuf,

    /// Root previously converted files are read from (defaults to --output-dir)
    #[arg(long)]
    processed_dir: Option<PathBuf>,

    /// Date to convert (yyyyMMdd or yyyy-MM-dd)
    #[arg(long, value_parser = parse_date_arg)]
    date: NaiveDate,

    /// Directory of ticker map files (defaults to {raw-dir}/map_files)
    #[arg(long, env = "BUYBACK_MAP_FILES")]
    map_files: Option<PathBuf>,

    /// Write output files on a single thread
    #[arg(long, default_value = "false")]
    sequential: bool,

    /// Save the run report as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

fn parse_date_arg(value: &str) -> std::result::Result<NaiveDate, String> {
    parse_date(value)
        .ok_or_else(|| format!("invalid date {value:?}, expected yyyyMMdd or yyyy-MM-dd"))
}

fn build_config(args: &Args) -> ConverterConfig {
    let mut config = ConverterConfig::new(&args.raw_dir, &args.output_dir)
        .with_parallel_writes(!args.sequential);
    if let Some(dir) = &args.processed_dir {
        config = config.with_processed_dir(dir);
    }
    if let Some(dir) = &args.map_files {
        config = config.with_map_files_dir(dir);
    }
    config
}

fn run(args: &Args) -> Result<RunReport> {
    let config = build_config(args);
    config.validate()?;
    let resolver = MapFileResolver::from_dir(&config.map_files_dir)?;
    run_date(&config, &resolver, args.date)
}

fn print_summary(report: &RunReport, elapsed_secs: f64) {
    println!();
    println!("Buyback conversion for {}", report.date);
    for kind in EventKind::ALL {
        match report.kind(kind) {
            KindReport::Completed { stats, written } => println!(
                "  {kind:<12} ok      {} accepted, {} skipped, {} ticker files, {} universe files",
                stats.accepted,
                stats.skipped(),
                written.ticker_files,
                written.universe_files
            ),
            KindReport::Failed(reason) => println!("  {kind:<12} FAILED  {reason}"),
        }
    }
    println!("  Finished in {elapsed_secs:.1}s");
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();
    let start = Instant::now();

    match run(&args) {
        Ok(report) => {
            print_summary(&report, start.elapsed().as_secs_f64());
            if let Some(path) = &args.report {
                if let Err(e) = report.save_json(path) {
                    log::error!("{e}");
                    return ExitCode::FAILURE;
                }
                log::info!("Run report saved to {}", path.display());
            }
            if report.success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "buyback-convert",
            "--raw-dir",
            "/raw",
            "--output-dir",
            "/out",
            "--date",
            "2019-03-08",
            "--map-files",
            "/maps",
            "--report",
            "/out/report.json",
        ])
        .unwrap();
        assert_eq!(args.date, NaiveDate::from_ymd_opt(2019, 3, 8).unwrap());
        assert_eq!(args.report, Some(PathBuf::from("/out/report.json")));

        let config = build_config(&args);
        assert_eq!(config.processed_dir, PathBuf::from("/out"));
        assert_eq!(config.map_files_dir, PathBuf::from("/maps"));
        assert!(config.parallel_writes);
    }

    #[test]
    fn test_args_reject_bad_date() {
        let result = Args::try_parse_from([
            "buyback-convert",
            "--raw-dir",
            "/raw",
            "--output-dir",
            "/out",
            "--date",
            "08/03/2019",
        ]);
        assert!(result.is_err());
    }
}
