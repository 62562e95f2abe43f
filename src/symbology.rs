//! Ticker → security resolution across renames.
//!
//! The converter only consumes the [`SymbolResolver`] trait. A
//! [`MappingHistory`] is the rename history of one security: each row says
//! "traded as `ticker` up to and including `date`".
//!
//! [`MapFileResolver`] is the bundled implementation. It reads a directory of
//! map files, one security per file, each line `yyyyMMdd,ticker[,exchange]`:
//!
//! ```text
//! 19980102,fb,Q
//! 20121231,fb,Q
//! 20220608,fb,Q
//! 20501231,meta,Q
//! ```

use std::fs;
use std::path::Path;

use ahash::AHashMap;
use chrono::NaiveDate;

use crate::error::{BuybackError, Result};
use crate::identifier::SecurityIdentifier;
use crate::schema::parse_date;

/// Resolves a raw vendor ticker to its rename history.
pub trait SymbolResolver: Send + Sync {
    /// History for a ticker, or `None` when the ticker is unknown.
    fn resolve_mapping(&self, raw_ticker: &str) -> Option<MappingHistory>;
}

/// One row of a rename history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapRow {
    /// Last date (inclusive) the security traded as `ticker`
    pub date: NaiveDate,
    /// Uppercase ticker
    pub ticker: String,
    /// Primary exchange code, when known
    pub exchange: Option<String>,
}

impl MapRow {
    pub fn new(date: NaiveDate, ticker: &str) -> Self {
        Self {
            date,
            ticker: ticker.trim().to_ascii_uppercase(),
            exchange: None,
        }
    }

    /// Parse `yyyyMMdd,ticker[,exchange]`.
    pub fn parse(line: &str) -> Option<Self> {
        let mut cells = line.split(',').map(str::trim);
        let date = parse_date(cells.next()?)?;
        let ticker = cells.next().filter(|t| !t.is_empty())?;
        let exchange = cells.next().filter(|e| !e.is_empty()).map(str::to_string);
        Some(Self {
            exchange,
            ..Self::new(date, ticker)
        })
    }
}

/// Rename history of one security, rows sorted by date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingHistory {
    rows: Vec<MapRow>,
}

impl MappingHistory {
    /// Build a history; `None` when there are no rows.
    pub fn new(mut rows: Vec<MapRow>) -> Option<Self> {
        if rows.is_empty() {
            return None;
        }
        rows.sort_by_key(|row| row.date);
        Some(Self { rows })
    }

    /// Ticker in effect on `date`, or `None` outside the mapped window.
    pub fn ticker_at(&self, date: NaiveDate) -> Option<&str> {
        if date < self.first_known_date() {
            return None;
        }
        self.rows
            .iter()
            .find(|row| row.date >= date)
            .map(|row| row.ticker.as_str())
    }

    /// First date the security is known.
    pub fn first_known_date(&self) -> NaiveDate {
        self.rows[0].date
    }

    /// Ticker the security was first listed under.
    pub fn first_ticker(&self) -> &str {
        &self.rows[0].ticker
    }

    /// Last date of the mapped window.
    pub fn last_date(&self) -> NaiveDate {
        self.rows[self.rows.len() - 1].date
    }

    /// Ticker of the newest row.
    pub fn current_ticker(&self) -> &str {
        &self.rows[self.rows.len() - 1].ticker
    }

    /// Rows, oldest first.
    pub fn rows(&self) -> &[MapRow] {
        &self.rows
    }

    /// Stable identifier of this security in `market`.
    pub fn identifier(&self, market_code: u64) -> Result<SecurityIdentifier> {
        SecurityIdentifier::from_market_code(
            self.first_known_date(),
            self.first_ticker(),
            market_code,
        )
    }
}

// ============================================================================
// Map-file resolver
// ============================================================================

/// Resolver over a set of rename histories, typically loaded from map files.
///
/// When several histories mention a ticker, the one currently trading under
/// it wins; otherwise the one whose window ends last.
#[derive(Debug, Clone, Default)]
pub struct MapFileResolver {
    histories: Vec<MappingHistory>,
    by_ticker: AHashMap<String, Vec<usize>>,
}

impl MapFileResolver {
    /// Empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver over in-memory histories.
    pub fn from_histories(histories: impl IntoIterator<Item = MappingHistory>) -> Self {
        let mut resolver = Self::new();
        for history in histories {
            resolver.insert(history);
        }
        resolver
    }

    /// Load every `*.csv` map file in a directory.
    ///
    /// Unreadable lines are skipped with a warning; files with no valid
    /// rows are ignored.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir).map_err(|e| BuybackError::io(dir, e))?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| BuybackError::io(dir, e))?.path();
            if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut resolver = Self::new();
        for path in paths {
            let content = fs::read_to_string(&path).map_err(|e| BuybackError::io(&path, e))?;
            let mut rows = Vec::new();
            for (line_no, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match MapRow::parse(line) {
                    Some(row) => rows.push(row),
                    None => log::warn!(
                        "Skipping malformed map file line {}:{}: {line:?}",
                        path.display(),
                        line_no + 1
                    ),
                }
            }
            match MappingHistory::new(rows) {
                Some(history) => resolver.insert(history),
                None => log::warn!("Map file {} has no usable rows", path.display()),
            }
        }

        log::info!(
            "Loaded {} map files from {}",
            resolver.len(),
            dir.display()
        );
        Ok(resolver)
    }

    /// Add a history and index every ticker it mentions.
    pub fn insert(&mut self, history: MappingHistory) {
        let idx = self.histories.len();
        for row in history.rows() {
            let entry = self.by_ticker.entry(row.ticker.clone()).or_default();
            if !entry.contains(&idx) {
                entry.push(idx);
            }
        }
        self.histories.push(history);
    }

    /// Number of histories.
    pub fn len(&self) -> usize {
        self.histories.len()
    }

    /// Whether no history is loaded.
    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }
}

impl SymbolResolver for MapFileResolver {
    fn resolve_mapping(&self, raw_ticker: &str) -> Option<MappingHistory> {
        let key = raw_ticker.trim().to_ascii_uppercase();
        let candidates = self.by_ticker.get(&key)?;

        candidates
            .iter()
            .map(|&idx| &self.histories[idx])
            .max_by_key(|history| (history.current_ticker() == key, history.last_date()))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn fb_history() -> MappingHistory {
        MappingHistory::new(vec![
            MapRow::new(date(2012, 5, 18), "fb"),
            MapRow::new(date(2022, 6, 8), "fb"),
            MapRow::new(date(2050, 12, 31), "meta"),
        ])
        .unwrap()
    }

    #[test]
    fn test_ticker_at_window() {
        let history = fb_history();
        assert_eq!(history.ticker_at(date(2012, 5, 17)), None);
        assert_eq!(history.ticker_at(date(2012, 5, 18)), Some("FB"));
        assert_eq!(history.ticker_at(date(2022, 6, 8)), Some("FB"));
        assert_eq!(history.ticker_at(date(2022, 6, 9)), Some("META"));
        assert_eq!(history.ticker_at(date(2051, 1, 1)), None);
        assert_eq!(history.first_known_date(), date(2012, 5, 18));
        assert_eq!(history.first_ticker(), "FB");
        assert_eq!(history.current_ticker(), "META");
    }

    #[test]
    fn test_empty_history_rejected() {
        assert!(MappingHistory::new(Vec::new()).is_none());
    }

    #[test]
    fn test_map_row_parse() {
        let row = MapRow::parse("20220609,meta,Q").unwrap();
        assert_eq!(row.date, date(2022, 6, 9));
        assert_eq!(row.ticker, "META");
        assert_eq!(row.exchange.as_deref(), Some("Q"));
        assert!(MapRow::parse("not a date,meta").is_none());
        assert!(MapRow::parse("20220609,").is_none());
    }

    #[test]
    fn test_resolver_prefers_current_ticker() {
        // An old company that used "META" and was delisted
        let old = MappingHistory::new(vec![
            MapRow::new(date(1999, 1, 4), "meta"),
            MapRow::new(date(2005, 3, 1), "meta"),
        ])
        .unwrap();
        let resolver = MapFileResolver::from_histories([old, fb_history()]);

        let history = resolver.resolve_mapping("meta").unwrap();
        assert_eq!(history.first_ticker(), "FB");

        let history = resolver.resolve_mapping("FB").unwrap();
        assert_eq!(history.current_ticker(), "META");

        assert!(resolver.resolve_mapping("ZZZZ").is_none());
    }

    #[test]
    fn test_identifier_uses_first_listing() {
        let history = fb_history();
        let sid = history.identifier(1).unwrap();
        assert_eq!(sid.symbol(), "FB");
        assert_eq!(
            sid,
            SecurityIdentifier::generate_equity(date(2012, 5, 18), "FB", "usa").unwrap()
        );
    }

    #[test]
    fn test_from_dir() {
        let temp = tempdir().unwrap();
        let dir = temp.path();

        let fb = "20120518,fb,Q\n20220608,fb,Q\ngarbage\n20501231,meta,Q\n";
        fs::write(dir.join("fb.csv"), fb).unwrap();
        fs::write(dir.join("aapl.csv"), "19801212,aapl,Q\n20501231,aapl,Q\n").unwrap();
        fs::write(dir.join("empty.csv"), "\n").unwrap();
        fs::write(dir.join("readme.txt"), "not a map file").unwrap();

        let resolver = MapFileResolver::from_dir(dir).unwrap();
        assert_eq!(resolver.len(), 2);
        assert_eq!(
            resolver.resolve_mapping("META").unwrap().first_known_date(),
            date(2012, 5, 18)
        );
        assert!(resolver.resolve_mapping("aapl").is_some());
    }

    #[test]
    fn test_from_dir_missing() {
        assert!(MapFileResolver::from_dir("/nonexistent/map_files").is_err());
    }
}
