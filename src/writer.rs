//! Output writer: merges a run's results into the existing files.
//!
//! # Layout
//!
//! ```text
//! {root}/intentions/aapl.tsv              one record per line, by processing time
//! {root}/intentions/universe/20190308.csv one row per identifier, by identifier
//! {root}/transactions/...
//! ```
//!
//! Existing files are read from the processed root and the merged result is
//! written under the output root. The two may be the same directory.
//!
//! # Atomicity
//!
//! Every file is written to a temporary file in its target directory and then
//! renamed over the final path. A failure at any point leaves the previous
//! file untouched and removes the temporary file.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use ahash::AHashSet;
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::config::ConverterConfig;
use crate::converter::{ConversionOutput, IO_BUFFER_SIZE};
use crate::error::{BuybackError, Result};
use crate::record::BuybackRecord;
use crate::vendor::EventKind;

/// Directory of universe files inside a kind directory.
pub const UNIVERSE_DIR: &str = "universe";

/// What a write pass produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    /// Per-ticker files written
    pub ticker_files: usize,
    /// Universe files written
    pub universe_files: usize,
    /// Lines across all written files, existing ones included
    pub lines_written: usize,
}

/// Writes converted records and universe rows for one kind at a time.
#[derive(Debug, Clone)]
pub struct OutputWriter {
    output_dir: PathBuf,
    processed_dir: PathBuf,
    parallel: bool,
}

impl OutputWriter {
    /// Create a writer from the run configuration.
    pub fn new(config: &ConverterConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            processed_dir: config.processed_dir.clone(),
            parallel: config.parallel_writes,
        }
    }

    /// Per-ticker file under a root.
    pub fn ticker_path(root: &Path, kind: EventKind, ticker: &str) -> PathBuf {
        root.join(kind.dir_name())
            .join(format!("{}.tsv", ticker.to_ascii_lowercase()))
    }

    /// Universe file under a root.
    pub fn universe_path(root: &Path, kind: EventKind, date: NaiveDate) -> PathBuf {
        root.join(kind.dir_name())
            .join(UNIVERSE_DIR)
            .join(format!("{}.csv", date.format("%Y%m%d")))
    }

    /// Merge and write everything a conversion produced.
    ///
    /// Stops at the first file that fails; files already written stay
    /// written, and the failing file keeps its previous content.
    pub fn write<R: BuybackRecord>(&self, output: ConversionOutput<R>) -> Result<WriteSummary> {
        let ConversionOutput {
            records, universe, ..
        } = output;
        let universe = universe.into_lines();

        let ticker_lines: Vec<usize> = if self.parallel {
            records
                .par_iter()
                .map(|(ticker, records)| self.write_ticker(ticker, records))
                .collect::<Result<_>>()?
        } else {
            records
                .iter()
                .map(|(ticker, records)| self.write_ticker(ticker, records))
                .collect::<Result<_>>()?
        };

        let universe_lines: Vec<usize> = if self.parallel {
            universe
                .into_par_iter()
                .map(|(date, lines)| self.write_universe(R::KIND, date, lines))
                .collect::<Result<_>>()?
        } else {
            universe
                .into_iter()
                .map(|(date, lines)| self.write_universe(R::KIND, date, lines))
                .collect::<Result<_>>()?
        };

        let summary = WriteSummary {
            ticker_files: ticker_lines.len(),
            universe_files: universe_lines.len(),
            lines_written: ticker_lines.iter().chain(&universe_lines).sum(),
        };
        log::info!(
            "Wrote {} {} ticker files and {} universe files to {}",
            summary.ticker_files,
            R::KIND,
            summary.universe_files,
            self.output_dir.display()
        );
        Ok(summary)
    }

    /// Merge one ticker's records into its file. Returns the line count.
    pub fn write_ticker<R: BuybackRecord>(&self, ticker: &str, records: &[R]) -> Result<usize> {
        let existing_path = Self::ticker_path(&self.processed_dir, R::KIND, ticker);
        let existing = read_existing_records::<R>(&existing_path)?;
        let lines = merge_event_lines(&existing, records);

        let path = Self::ticker_path(&self.output_dir, R::KIND, ticker);
        write_atomic(&path, &lines)?;
        log::debug!(
            "{}: {} lines ({} existing, {} new)",
            path.display(),
            lines.len(),
            existing.len(),
            records.len()
        );
        Ok(lines.len())
    }

    /// Merge one date's universe rows into its file. Returns the line count.
    pub fn write_universe(
        &self,
        kind: EventKind,
        date: NaiveDate,
        rows: Vec<String>,
    ) -> Result<usize> {
        let existing_path = Self::universe_path(&self.processed_dir, kind, date);
        let existing = read_lines(&existing_path)?;
        let lines = merge_universe_lines(existing, rows);

        let path = Self::universe_path(&self.output_dir, kind, date);
        write_atomic(&path, &lines)?;
        Ok(lines.len())
    }
}

// ============================================================================
// Merging
// ============================================================================

/// Serialize existing and new records into one sorted, duplicate-free list.
///
/// Lines are ordered by processing timestamp; the sort is stable and
/// existing records come first, so ties keep existing lines ahead of new
/// ones. Duplicates are exact line matches and the first occurrence is kept.
pub fn merge_event_lines<R: BuybackRecord>(existing: &[R], new: &[R]) -> Vec<String> {
    let mut keyed: Vec<_> = existing
        .iter()
        .chain(new)
        .map(|record| (record.processed_at(), record.to_line()))
        .collect();
    keyed.sort_by_key(|(timestamp, _)| *timestamp);

    let mut seen = AHashSet::with_capacity(keyed.len());
    keyed
        .into_iter()
        .filter_map(|(_, line)| seen.insert(line.clone()).then_some(line))
        .collect()
}

/// Combine existing and new universe rows, sorted by identifier.
///
/// Rows are compared as whole lines: a changed row for the same identifier is
/// kept next to the old one rather than replacing it.
pub fn merge_universe_lines(existing: Vec<String>, new: Vec<String>) -> Vec<String> {
    let mut lines: Vec<String> = existing.into_iter().chain(new).collect();
    lines.sort_by(|a, b| row_identifier(a).cmp(row_identifier(b)));

    let mut seen = AHashSet::with_capacity(lines.len());
    lines.retain(|line| seen.insert(line.clone()));
    lines
}

fn row_identifier(row: &str) -> &str {
    row.split_once(',').map_or(row, |(identifier, _)| identifier)
}

// ============================================================================
// File I/O
// ============================================================================

/// Parse a previously written per-ticker file. A missing file is empty.
fn read_existing_records<R: BuybackRecord>(path: &Path) -> Result<Vec<R>> {
    read_lines(path)?
        .iter()
        .enumerate()
        .map(|(idx, line)| {
            R::from_line(line).map_err(|e| {
                BuybackError::generic(format!(
                    "Cannot read existing output {}:{}: {e}",
                    path.display(),
                    idx + 1
                ))
            })
        })
        .collect()
}

/// Non-blank lines of a file. A missing file has none.
fn read_lines(path: &Path) -> Result<Vec<String>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(BuybackError::io(path, e)),
    };

    let mut lines = Vec::new();
    for line in BufReader::with_capacity(IO_BUFFER_SIZE, file).lines() {
        let line = line.map_err(|e| BuybackError::io(path, e))?;
        let line = line.trim_end_matches('\r');
        if !line.trim().is_empty() {
            lines.push(line.to_string());
        }
    }
    Ok(lines)
}

/// Write lines to `path` through a temporary file in the same directory.
pub fn write_atomic(path: &Path, lines: &[String]) -> Result<()> {
    let dir = path.parent().ok_or_else(|| {
        BuybackError::generic(format!("No parent directory for {}", path.display()))
    })?;
    fs::create_dir_all(dir).map_err(|e| BuybackError::io(dir, e))?;

    // Dropped (and deleted) on any early return
    let temp = NamedTempFile::new_in(dir).map_err(|e| BuybackError::io(dir, e))?;
    {
        let mut writer = BufWriter::with_capacity(IO_BUFFER_SIZE, temp.as_file());
        for line in lines {
            writeln!(writer, "{line}").map_err(|e| BuybackError::io(temp.path(), e))?;
        }
        writer.flush().map_err(|e| BuybackError::io(temp.path(), e))?;
    }

    temp.persist(path)
        .map_err(|e| BuybackError::io(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{EventHeader, Intention};
    use tempfile::tempdir;

    fn intention(id: &str, processed: &str) -> Intention {
        let date = NaiveDate::from_ymd_opt(2019, 3, 8).unwrap();
        let mut event = EventHeader::new(date);
        event.transaction_id = Some(id.to_string());
        event.ticker_symbol = Some("AAPL".to_string());
        event.time_processed_utc = crate::schema::parse_datetime(processed);
        Intention::new(event)
    }

    fn writer(root: &Path) -> OutputWriter {
        OutputWriter::new(&ConverterConfig::new(root.join("raw"), root.join("out")))
    }

    #[test]
    fn test_paths() {
        let root = Path::new("/data");
        let date = NaiveDate::from_ymd_opt(2019, 3, 8).unwrap();
        assert_eq!(
            OutputWriter::ticker_path(root, EventKind::Intention, "AAPL"),
            PathBuf::from("/data/intentions/aapl.tsv")
        );
        assert_eq!(
            OutputWriter::universe_path(root, EventKind::Transaction, date),
            PathBuf::from("/data/transactions/universe/20190308.csv")
        );
    }

    #[test]
    fn test_merge_sorts_and_dedups() {
        let a = intention("A", "20190308 12:00:00");
        let b = intention("B", "20190308 09:00:00");
        let c = intention("C", "20190308 10:00:00");

        let lines = merge_event_lines(&[a.clone(), b.clone()], &[c.clone(), a.clone()]);
        let ids: Vec<&str> = lines.iter().map(|l| l.split('\t').nth(1).unwrap()).collect();
        assert_eq!(ids, vec!["B", "C", "A"]);
    }

    #[test]
    fn test_merge_ties_keep_existing_first() {
        let old = intention("OLD", "20190308 10:00:00");
        let new = intention("NEW", "20190308 10:00:00");
        let lines = merge_event_lines(&[old], &[new]);
        assert!(lines[0].contains("\tOLD\t"));
        assert!(lines[1].contains("\tNEW\t"));
    }

    #[test]
    fn test_merge_universe_lines() {
        let lines = merge_universe_lines(
            vec!["MSFT X,1,2".to_string(), "AAPL X,1,2".to_string()],
            vec!["AAPL X,1,2".to_string(), "AAPL X,5,2".to_string(), "GOOG X,,".to_string()],
        );
        assert_eq!(lines, vec!["AAPL X,1,2", "AAPL X,5,2", "GOOG X,,", "MSFT X,1,2"]);
    }

    #[test]
    fn test_write_ticker_is_idempotent() {
        let dir = tempdir().unwrap();
        let writer = writer(dir.path());
        let records = vec![
            intention("A", "20190308 10:00:00"),
            intention("B", "20190308 09:00:00"),
        ];

        assert_eq!(writer.write_ticker("AAPL", &records).unwrap(), 2);
        assert_eq!(writer.write_ticker("AAPL", &records).unwrap(), 2);

        let path = OutputWriter::ticker_path(&dir.path().join("out"), EventKind::Intention, "aapl");
        let content = fs::read_to_string(path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.lines().next().unwrap().starts_with("20190308 09:00:00\tB\t"));
    }

    #[test]
    fn test_corrupt_existing_file_is_left_untouched() {
        let dir = tempdir().unwrap();
        let writer = writer(dir.path());
        let path = OutputWriter::ticker_path(&dir.path().join("out"), EventKind::Intention, "aapl");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "garbage\n").unwrap();

        let result = writer.write_ticker("aapl", &[intention("A", "20190308 10:00:00")]);
        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "garbage\n");

        // No temporary files left behind
        let entries = fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_reads_from_processed_dir() {
        let dir = tempdir().unwrap();
        let config = ConverterConfig::new(dir.path().join("raw"), dir.path().join("out"))
            .with_processed_dir(dir.path().join("prev"));
        let writer = OutputWriter::new(&config);

        let prev = OutputWriter::ticker_path(&config.processed_dir, EventKind::Intention, "aapl");
        write_atomic(&prev, &[intention("OLD", "20190307 10:00:00").to_line()]).unwrap();

        writer.write_ticker("aapl", &[intention("NEW", "20190308 10:00:00")]).unwrap();
        let out = OutputWriter::ticker_path(&config.output_dir, EventKind::Intention, "aapl");
        let content = fs::read_to_string(out).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.starts_with("20190307 10:00:00\tOLD"));
    }

    #[test]
    fn test_write_universe() {
        let dir = tempdir().unwrap();
        let writer = writer(dir.path());
        let date = NaiveDate::from_ymd_opt(2019, 3, 8).unwrap();

        writer
            .write_universe(EventKind::Intention, date, vec!["B X,1".into(), "A X,2".into()])
            .unwrap();
        let written = writer
            .write_universe(EventKind::Intention, date, vec!["A X,2".into()])
            .unwrap();
        assert_eq!(written, 2);

        let path = OutputWriter::universe_path(&dir.path().join("out"), EventKind::Intention, date);
        assert_eq!(fs::read_to_string(path).unwrap(), "A X,2\nB X,1\n");
    }
}
