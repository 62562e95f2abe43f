//! # buyback-converter
//!
//! Converts daily vendor files of corporate share-buyback disclosures into
//! per-ticker event files and per-day universe files.
//!
//! The vendor publishes two datasets a day, each a tab-separated text file:
//!
//! - **intentions**: announced authorizations and plans to buy back stock
//! - **transactions**: executed buyback trades
//!
//! ## Features
//!
//! - **Two input layouts**: header-indexed files, where columns are looked up
//!   by name, and the older fixed-offset layout with its noise columns
//! - **Lenient vendor enums**: unknown tokens fall back to a sentinel instead
//!   of failing the record
//! - **Rename-aware tickers**: records are filed under the ticker in effect on
//!   their date, and universe rows use an identifier that survives renames
//! - **Idempotent output**: re-running a date merges with previous output,
//!   keeps files sorted, and never duplicates lines
//! - **Atomic writes**: files are replaced by rename, so a failed run never
//!   leaves a half-written file
//!
//! ## Quick Start
//!
//! ```no_run
//! use buyback_converter::{run_date, ConverterConfig, MapFileResolver};
//! use chrono::NaiveDate;
//!
//! let config = ConverterConfig::new("/data/raw", "/data/converted");
//! let resolver = MapFileResolver::from_dir(&config.map_files_dir)?;
//! let date = NaiveDate::from_ymd_opt(2019, 3, 8).unwrap();
//!
//! let report = run_date(&config, &resolver, date)?;
//! if !report.success() {
//!     eprintln!("conversion failed: {report:?}");
//! }
//! # Ok::<(), buyback_converter::BuybackError>(())
//! ```
//!
//! ### Converting a single file
//!
//! ```ignore
//! use buyback_converter::{Converter, Intention, OutputWriter};
//!
//! let mut converter = Converter::new(&resolver, &config)?;
//! let output = converter.process::<Intention, _>("raw/intentions/20190308.ttx")?;
//!
//! println!("Accepted: {}", output.stats.accepted);
//! println!("Unsupported market: {}", output.stats.unsupported_market);
//!
//! OutputWriter::new(&config).write(output)?;
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`record`] | `Intention`, `Transaction`, `EventHeader` and the `BuybackRecord` trait |
//! | [`vendor`] | Vendor enum tokens (`EventType`, `Execution`, `ExecutionHolding`, ...) |
//! | [`schema`] | Line layouts and typed field access |
//! | [`converter`] | Streaming conversion of one raw file |
//! | [`universe`] | Daily per-identifier aggregation |
//! | [`writer`] | Merge with previous output and atomic file replacement |
//! | [`symbology`] | `SymbolResolver` and the map-file implementation |
//! | [`identifier`] | Stable security identifiers |
//! | [`config`] | `ConverterConfig` |
//! | [`runner`] | Both kinds for one date |

pub mod config;
pub mod converter;
pub mod error;
pub mod identifier;
pub mod record;
pub mod runner;
pub mod schema;
pub mod symbology;
pub mod universe;
pub mod vendor;
pub mod writer;

// Re-exports - Errors
pub use error::{BuybackError, ParseError, Result};

// Re-exports - Records
pub use record::{BuybackRecord, EventHeader, Intention, Transaction};
pub use vendor::{
    EventKind, EventType, Execution, ExecutionEntity, ExecutionHolding, Parsed, VendorEnum,
};

// Re-exports - Pipeline
pub use config::ConverterConfig;
pub use converter::{ConversionOutput, ConversionStats, Converter, IO_BUFFER_SIZE};
pub use runner::{run_date, KindReport, RunReport};
pub use universe::{Reducer, UniverseAccumulator};
pub use writer::{OutputWriter, WriteSummary};

// Re-exports - Symbology
pub use identifier::SecurityIdentifier;
pub use symbology::{MapFileResolver, MapRow, MappingHistory, SymbolResolver};
