//! Conversion engine: one raw vendor file in, per-ticker records and a
//! universe out.
//!
//! The engine streams the file line by line and never holds the raw text in
//! memory. For each line it:
//!
//! 1. strips quotes, skips blank lines, and switches to header-indexed
//!    parsing whenever a header line shows up
//! 2. parses the record; a bad line is logged and skipped
//! 3. drops records outside the supported ticker country
//! 4. resolves the raw ticker through the [`SymbolResolver`] at the record's
//!    `LastUpdate` date and derives the security identifier
//! 5. appends the record under its resolved ticker and folds it into the
//!    universe
//!
//! Nothing in steps 2-4 aborts the file. Only I/O failures do.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use ahash::AHashMap;
use serde::Serialize;

use crate::config::ConverterConfig;
use crate::error::{BuybackError, Result};
use crate::identifier::market_code;
use crate::record::BuybackRecord;
use crate::schema::{clean_line, is_blank_line, is_header_line, HeaderIndex, Schema};
use crate::symbology::{MappingHistory, SymbolResolver};
use crate::universe::UniverseAccumulator;

/// I/O buffer size for reading raw files.
///
/// Daily vendor files are small, but the default 8KB `BufReader` makes a
/// syscall every few dozen lines.
pub const IO_BUFFER_SIZE: usize = 1024 * 1024; // 1 MB

/// Counters for one converted file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversionStats {
    /// Physical lines read, headers and blanks included
    pub lines_read: u64,

    /// Empty or tab-only lines
    pub blank_lines: u64,

    /// Header lines (each one rebuilds the column index)
    pub header_lines: u64,

    /// Parsed records missing a ticker symbol or a usable identifier, or
    /// whose universe totals overflow
    pub invalid_records: u64,

    /// Lines that failed to parse
    pub parse_failures: u64,

    /// Records outside the supported ticker country
    pub unsupported_market: u64,

    /// Records whose ticker has no mapping history
    pub unmapped_tickers: u64,

    /// Records dated outside their mapping window
    pub unresolved_dates: u64,

    /// Accepted records whose ticker was renamed by the resolver
    pub renamed: u64,

    /// Records handed to the writer
    pub accepted: u64,
}

impl ConversionStats {
    /// Data lines that did not make it into the output.
    pub fn skipped(&self) -> u64 {
        self.invalid_records
            + self.parse_failures
            + self.unsupported_market
            + self.unmapped_tickers
            + self.unresolved_dates
    }
}

/// Result of converting one file.
#[derive(Debug, Clone)]
pub struct ConversionOutput<R> {
    /// Records keyed by lowercase resolved ticker, in file order
    pub records: BTreeMap<String, Vec<R>>,

    /// Universe rows built from the accepted records
    pub universe: UniverseAccumulator,

    /// Counters
    pub stats: ConversionStats,
}

impl<R: BuybackRecord> ConversionOutput<R> {
    fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            universe: UniverseAccumulator::for_kind::<R>(),
            stats: ConversionStats::default(),
        }
    }

    /// Number of accepted records across all tickers.
    pub fn record_count(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }
}

/// Converts raw vendor files of either kind.
///
/// Mapping histories are cached per raw ticker for the converter's lifetime,
/// so one converter should be reused for both kinds of a run.
pub struct Converter<'a> {
    resolver: &'a dyn SymbolResolver,
    market_code: u64,
    ticker_country: String,
    mappings: AHashMap<String, Option<MappingHistory>>,
}

impl<'a> Converter<'a> {
    /// Create a converter for the configured market.
    pub fn new(resolver: &'a dyn SymbolResolver, config: &ConverterConfig) -> Result<Self> {
        let market_code = market_code(&config.market)
            .ok_or_else(|| BuybackError::UnsupportedMarket(config.market.clone()))?;

        Ok(Self {
            resolver,
            market_code,
            ticker_country: config.ticker_country.trim().to_string(),
            mappings: AHashMap::new(),
        })
    }

    /// Convert a raw file.
    ///
    /// # Errors
    ///
    /// [`BuybackError::MissingInput`] if the file does not exist, or an I/O
    /// error if it cannot be read. Bad lines are never errors.
    pub fn process<R: BuybackRecord, P: AsRef<Path>>(
        &mut self,
        path: P,
    ) -> Result<ConversionOutput<R>> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => BuybackError::MissingInput(path.to_path_buf()),
            _ => BuybackError::io(path, e),
        })?;

        log::info!("Converting {} {}", R::KIND, path.display());
        let reader = BufReader::with_capacity(IO_BUFFER_SIZE, file);
        let output = self.process_reader::<R, _>(reader, path)?;

        let stats = &output.stats;
        log::info!(
            "Converted {}: {} accepted across {} tickers, {} skipped ({} parse failures, \
             {} unsupported market, {} unmapped, {} out of window), {} renamed",
            path.display(),
            stats.accepted,
            output.records.len(),
            stats.skipped(),
            stats.parse_failures,
            stats.unsupported_market,
            stats.unmapped_tickers,
            stats.unresolved_dates,
            stats.renamed,
        );
        Ok(output)
    }

    /// Convert from any buffered reader. `source` only labels errors and logs.
    pub fn process_reader<R: BuybackRecord, B: BufRead>(
        &mut self,
        mut reader: B,
        source: &Path,
    ) -> Result<ConversionOutput<R>> {
        let mut output = ConversionOutput::<R>::new();
        let mut schema = Schema::FixedOffset;
        let mut previous_market: Option<(String, String)> = None;
        let mut buf = Vec::with_capacity(4096);

        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|e| BuybackError::io(source, e))?;
            if read == 0 {
                break;
            }
            output.stats.lines_read += 1;
            let line_no = output.stats.lines_read;

            let line = clean_line(&String::from_utf8_lossy(&buf));
            if is_blank_line(&line) {
                output.stats.blank_lines += 1;
                continue;
            }
            if is_header_line(&line) {
                output.stats.header_lines += 1;
                let index = HeaderIndex::from_header(&line);
                log::debug!(
                    "{}:{line_no}: header with {} columns",
                    source.display(),
                    index.width()
                );
                schema = Schema::HeaderIndexed(index);
                continue;
            }

            let record = match R::parse(&line, &schema) {
                Ok(record) => record,
                Err(e) => {
                    output.stats.parse_failures += 1;
                    log::error!("{}:{line_no}: {e}: {line:?}", source.display());
                    continue;
                }
            };

            self.accept(record, line_no, source, &mut previous_market, &mut output);
        }

        Ok(output)
    }

    fn accept<R: BuybackRecord>(
        &mut self,
        record: R,
        line_no: u64,
        source: &Path,
        previous_market: &mut Option<(String, String)>,
        output: &mut ConversionOutput<R>,
    ) {
        let stats = &mut output.stats;
        let header = record.header();

        let Some(raw_ticker) = header.ticker_symbol.as_deref() else {
            stats.invalid_records += 1;
            log::error!(
                "{}:{line_no}: record {} has no ticker symbol",
                source.display(),
                header.transaction_id.as_deref().unwrap_or("<no id>")
            );
            return;
        };

        let country = header.ticker_country.as_deref().unwrap_or("");
        let market_key = (country.to_string(), raw_ticker.to_string());
        let repeated = previous_market.as_ref() == Some(&market_key);
        *previous_market = Some(market_key);

        if !country.eq_ignore_ascii_case(&self.ticker_country) {
            stats.unsupported_market += 1;
            if !repeated {
                log::warn!(
                    "{}:{line_no}: skipping {raw_ticker}, market {country:?} is not supported",
                    source.display()
                );
            }
            return;
        }

        let resolver = self.resolver;
        let history = self
            .mappings
            .entry(raw_ticker.to_ascii_uppercase())
            .or_insert_with(|| resolver.resolve_mapping(raw_ticker));
        let Some(history) = history.as_ref() else {
            stats.unmapped_tickers += 1;
            log::warn!("{}:{line_no}: no mapping for ticker {raw_ticker}", source.display());
            return;
        };

        let date = header.last_update;
        let Some(resolved) = history.ticker_at(date) else {
            stats.unresolved_dates += 1;
            log::warn!(
                "{}:{line_no}: ticker {raw_ticker} does not resolve on {date}",
                source.display()
            );
            return;
        };

        let identifier = match history.identifier(self.market_code) {
            Ok(identifier) => identifier.to_string(),
            Err(e) => {
                stats.invalid_records += 1;
                log::error!("{}:{line_no}: {e}", source.display());
                return;
            }
        };

        let processed_date = record.processed_at().date();
        if let Err(e) = output
            .universe
            .accumulate_record(&identifier, processed_date, &record)
        {
            stats.invalid_records += 1;
            log::error!("{}:{line_no}: {e}", source.display());
            return;
        }

        if !resolved.eq_ignore_ascii_case(raw_ticker) {
            stats.renamed += 1;
            log::info!("Ticker {raw_ticker} resolves to {resolved} on {date}");
        }

        let key = resolved.to_ascii_lowercase();
        output.records.entry(key).or_default().push(record);
        stats.accepted += 1;
    }
}
