//! Run configuration.
//!
//! # Example
//!
//! ```
//! use buyback_converter::config::ConverterConfig;
//!
//! let config = ConverterConfig::new("/data/raw", "/data/out")
//!     .with_processed_dir("/data/previous")
//!     .with_parallel_writes(false);
//! assert!(config.validate().is_ok());
//! ```

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::error::{BuybackError, Result};
use crate::identifier::market_code;
use crate::vendor::EventKind;

/// Extension of raw vendor files.
pub const RAW_FILE_EXTENSION: &str = "ttx";

/// Directory and market settings for a conversion run.
#[derive(Debug, Clone)]
pub struct ConverterConfig {
    /// Root of the raw vendor files (`{raw_dir}/{kind}/{yyyyMMdd}.ttx`)
    pub raw_dir: PathBuf,

    /// Root the converted files are written to
    pub output_dir: PathBuf,

    /// Root previously converted files are read from.
    ///
    /// Usually the same as `output_dir`.
    pub processed_dir: PathBuf,

    /// Directory of ticker map files
    pub map_files_dir: PathBuf,

    /// Market the identifiers are generated for
    pub market: String,

    /// Only records whose `TickerCountry` matches are converted
    pub ticker_country: String,

    /// Write output files on the rayon pool
    pub parallel_writes: bool,
}

impl ConverterConfig {
    /// Configuration with defaults for everything but the two roots.
    ///
    /// # Defaults
    ///
    /// - `processed_dir`: same as `output_dir`
    /// - `map_files_dir`: `{raw_dir}/map_files`
    /// - `market`: `usa`
    /// - `ticker_country`: `US`
    /// - `parallel_writes`: true
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(raw_dir: P, output_dir: Q) -> Self {
        let raw_dir = raw_dir.as_ref().to_path_buf();
        let output_dir = output_dir.as_ref().to_path_buf();
        Self {
            map_files_dir: raw_dir.join("map_files"),
            processed_dir: output_dir.clone(),
            raw_dir,
            output_dir,
            market: "usa".to_string(),
            ticker_country: "US".to_string(),
            parallel_writes: true,
        }
    }

    /// Read previous output from a different root.
    pub fn with_processed_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.processed_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Load map files from a different directory.
    pub fn with_map_files_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.map_files_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the identifier market.
    pub fn with_market(mut self, market: &str) -> Self {
        self.market = market.to_ascii_lowercase();
        self
    }

    /// Set the supported ticker country.
    pub fn with_ticker_country(mut self, country: &str) -> Self {
        self.ticker_country = country.to_string();
        self
    }

    /// Enable or disable parallel output writes.
    pub fn with_parallel_writes(mut self, parallel: bool) -> Self {
        self.parallel_writes = parallel;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.raw_dir.as_os_str().is_empty() {
            return Err(BuybackError::InvalidConfig("raw_dir cannot be empty".into()));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(BuybackError::InvalidConfig("output_dir cannot be empty".into()));
        }
        if self.processed_dir.as_os_str().is_empty() {
            return Err(BuybackError::InvalidConfig("processed_dir cannot be empty".into()));
        }
        if self.ticker_country.trim().is_empty() {
            return Err(BuybackError::InvalidConfig("ticker_country cannot be empty".into()));
        }
        if market_code(&self.market).is_none() {
            return Err(BuybackError::UnsupportedMarket(self.market.clone()));
        }
        Ok(())
    }

    /// Raw vendor file for a kind and date.
    pub fn input_path(&self, kind: EventKind, date: NaiveDate) -> PathBuf {
        self.raw_dir.join(kind.dir_name()).join(format!(
            "{}.{RAW_FILE_EXTENSION}",
            date.format("%Y%m%d")
        ))
    }
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self::new("./raw", "./output")
    }
}
