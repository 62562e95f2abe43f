//! Vendor line layouts and typed field access.
//!
//! A raw vendor file comes in one of two layouts:
//!
//! - **Header-indexed**: the first line names every column (it starts with
//!   [`HEADER_SENTINEL`]). Fields are looked up by name, so the vendor can add
//!   or drop optional columns between revisions.
//! - **Fixed-offset legacy**: no header. Four noise columns are stripped at
//!   known indices ([`LEGACY_NOISE_COLUMNS`]) and the remaining cells follow
//!   canonical column order.
//!
//! The converter's own output uses a third, positional layout
//! ([`Schema::Persisted`]): the processing timestamp followed by every
//! canonical column.
//!
//! Whatever the layout, records read their columns through [`FieldSource`],
//! which turns blank cells into `None` and parses dates, numbers and vendor
//! enums.

use std::str::FromStr;

use ahash::AHashMap;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::ParseError;
use crate::vendor::{Parsed, VendorEnum};

/// First token of a header line.
pub const HEADER_SENTINEL: &str = "TransactionID";

/// Legacy noise columns, in the order they are removed.
///
/// Descending so each removal leaves the lower indices untouched:
/// show-original flag (29), URL (28), previous close price (21), short name (13).
pub const LEGACY_NOISE_COLUMNS: [usize; 4] = [29, 28, 21, 13];

/// Columns shared by both event kinds, in canonical order.
pub const COMMON_COLUMNS: &[&str] = &[
    "TransactionID",
    "EventType",
    "LastUpdate",
    "LastIDsUpdate",
    "ISIN",
    "USDMarketCap",
    "CompanyID",
    "ICBIndustry",
    "ICBSuperSector",
    "ICBSector",
    "ICBSubSector",
    "ICBCode",
    "CompanyName",
    "PreviousResultsAnnouncementDate",
    "NextResultsAnnouncementsDate",
    "NextCloseBegin",
    "LastCloseEnded",
    "SecurityDescription",
    "TickerCountry",
    "TickerSymbol",
    "AnnouncementDate",
    "TimeReleased",
    "TimeProcessed",
    "TimeReleasedUtc",
    "TimeProcessedUtc",
    "AnnouncedIn",
];

const DATE_FORMAT: &str = "%Y%m%d";
const DATETIME_FORMAT: &str = "%Y%m%d %H:%M:%S";

/// Strip a byte-order mark, double quotes and line terminators from a raw line.
pub fn clean_line(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}')
        .trim_end_matches(['\r', '\n'])
        .replace('"', "")
}

/// A line made only of tabs (or nothing at all) carries no record.
pub fn is_blank_line(line: &str) -> bool {
    line.chars().all(|c| c == '\t' || c.is_whitespace())
}

/// Whether a line is a header, wherever it appears in the file.
pub fn is_header_line(line: &str) -> bool {
    line.split('\t')
        .next()
        .is_some_and(|first| first.trim().eq_ignore_ascii_case(HEADER_SENTINEL))
}

// ============================================================================
// Header index
// ============================================================================

/// Case-insensitive column name → index mapping built from a header line.
#[derive(Debug, Clone, Default)]
pub struct HeaderIndex {
    columns: AHashMap<String, usize>,
    width: usize,
}

impl HeaderIndex {
    /// Build the mapping from a (quote-stripped) header line.
    ///
    /// If the vendor repeats a column name, the first occurrence wins.
    pub fn from_header(line: &str) -> Self {
        let mut columns = AHashMap::new();
        let mut width = 0;

        for (idx, name) in line.split('\t').enumerate() {
            width = idx + 1;
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            columns.entry(name.to_ascii_lowercase()).or_insert(idx);
        }

        Self { columns, width }
    }

    /// Column index for a name, if the header has it.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.get(&name.to_ascii_lowercase()).copied()
    }

    /// Number of columns in the header line.
    pub fn width(&self) -> usize {
        self.width
    }
}

// ============================================================================
// Schema
// ============================================================================

/// Layout of the lines being parsed.
#[derive(Debug, Clone)]
pub enum Schema {
    /// Columns located through a header line
    HeaderIndexed(HeaderIndex),
    /// Legacy positional layout with noise columns
    FixedOffset,
    /// The converter's own output layout
    Persisted,
}

impl Schema {
    /// Split a cleaned line into a field source for this layout.
    ///
    /// `tail` is the kind-specific column list that follows
    /// [`COMMON_COLUMNS`] in positional layouts.
    pub fn source<'a>(
        &'a self,
        line: &'a str,
        tail: &'static [&'static str],
    ) -> Result<FieldSource<'a>, ParseError> {
        let mut cells: Vec<&'a str> = line.split('\t').collect();

        let columns = match self {
            Schema::HeaderIndexed(index) => Columns::Named(index),
            Schema::FixedOffset => {
                let needed = LEGACY_NOISE_COLUMNS[0] + 1;
                if cells.len() < needed {
                    return Err(ParseError::ShortLine {
                        expected: needed,
                        found: cells.len(),
                    });
                }
                for idx in LEGACY_NOISE_COLUMNS {
                    cells.remove(idx);
                }
                Columns::Positional { tail, offset: 0 }
            }
            Schema::Persisted => Columns::Positional { tail, offset: 1 },
        };

        Ok(FieldSource { cells, columns })
    }
}

#[derive(Debug, Clone, Copy)]
enum Columns<'a> {
    Named(&'a HeaderIndex),
    Positional {
        tail: &'static [&'static str],
        offset: usize,
    },
}

// ============================================================================
// Field source
// ============================================================================

/// Typed, name-based access to the cells of one line.
#[derive(Debug, Clone)]
pub struct FieldSource<'a> {
    cells: Vec<&'a str>,
    columns: Columns<'a>,
}

impl<'a> FieldSource<'a> {
    /// Raw cell for a column, `None` when blank or missing.
    pub fn cell(&self, name: &'static str) -> Result<Option<&'a str>, ParseError> {
        let idx = match self.columns {
            Columns::Named(index) => match index.position(name) {
                Some(idx) => idx,
                None => return Ok(None),
            },
            Columns::Positional { tail, offset } => {
                let position = COMMON_COLUMNS
                    .iter()
                    .position(|c| *c == name)
                    .or_else(|| {
                        tail.iter()
                            .position(|c| *c == name)
                            .map(|p| p + COMMON_COLUMNS.len())
                    })
                    .ok_or(ParseError::UnknownColumn(name))?;
                position + offset
            }
        };

        Ok(self
            .cells
            .get(idx)
            .copied()
            .map(str::trim)
            .filter(|cell| !cell.is_empty()))
    }

    /// Text column.
    pub fn text(&self, name: &'static str) -> Result<Option<String>, ParseError> {
        Ok(self.cell(name)?.map(str::to_string))
    }

    /// Date column that must be present.
    pub fn required_date(&self, name: &'static str) -> Result<NaiveDate, ParseError> {
        self.date(name)?.ok_or(ParseError::MissingRequired(name))
    }

    /// Date column (`yyyyMMdd` or `yyyy-MM-dd`).
    pub fn date(&self, name: &'static str) -> Result<Option<NaiveDate>, ParseError> {
        self.cell(name)?
            .map(|value| {
                parse_date(value).ok_or_else(|| ParseError::InvalidDate {
                    field: name,
                    value: value.to_string(),
                })
            })
            .transpose()
    }

    /// Date-time column; a bare date reads as midnight.
    pub fn datetime(&self, name: &'static str) -> Result<Option<NaiveDateTime>, ParseError> {
        self.cell(name)?
            .map(|value| {
                parse_datetime(value).ok_or_else(|| ParseError::InvalidDate {
                    field: name,
                    value: value.to_string(),
                })
            })
            .transpose()
    }

    /// Decimal column, scale preserved.
    pub fn decimal(&self, name: &'static str) -> Result<Option<Decimal>, ParseError> {
        self.cell(name)?
            .map(|value| {
                parse_decimal(value).ok_or_else(|| ParseError::InvalidNumber {
                    field: name,
                    value: value.to_string(),
                })
            })
            .transpose()
    }

    /// Integer column. Accepts a decimal with no fractional part (`100.0`).
    pub fn integer(&self, name: &'static str) -> Result<Option<i64>, ParseError> {
        self.cell(name)?
            .map(|value| {
                value
                    .parse::<i64>()
                    .ok()
                    .or_else(|| {
                        parse_decimal(value)
                            .filter(|d| d.fract().is_zero())
                            .and_then(|d| d.to_i64())
                    })
                    .ok_or_else(|| ParseError::InvalidNumber {
                        field: name,
                        value: value.to_string(),
                    })
            })
            .transpose()
    }

    /// Vendor enum column. Unknown tokens become the sentinel and are traced.
    pub fn vendor<E: VendorEnum + std::fmt::Debug>(
        &self,
        name: &'static str,
    ) -> Result<Option<E>, ParseError> {
        Ok(self.cell(name)?.map(|raw| match E::parse_vendor(raw) {
            Parsed::Known(value) => value,
            Parsed::Sentinel { raw, value } => {
                log::trace!("Unrecognized {name} token {raw:?}, using {value:?}");
                value
            }
        }))
    }
}

// ============================================================================
// Value parsing and formatting
// ============================================================================

/// Parse `yyyyMMdd` or `yyyy-MM-dd`.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit()) {
        let year = value[0..4].parse().ok()?;
        let month = value[4..6].parse().ok()?;
        let day = value[6..8].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// Parse `yyyyMMdd HH:mm:ss`, `yyyy-MM-dd HH:mm:ss`, or a bare date.
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    match value.split_once(' ') {
        Some((date, time)) => {
            let date = parse_date(date)?;
            let time = NaiveTime::parse_from_str(time.trim(), "%H:%M:%S").ok()?;
            Some(date.and_time(time))
        }
        None => parse_date(value).map(|date| date.and_time(NaiveTime::MIN)),
    }
}

/// Parse a decimal, falling back to scientific notation.
pub fn parse_decimal(value: &str) -> Option<Decimal> {
    let value = value.trim();
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .ok()
}

/// Serialize an optional date as `yyyyMMdd`, blank when absent.
pub fn format_date(value: Option<NaiveDate>) -> String {
    value
        .map(|d| d.format(DATE_FORMAT).to_string())
        .unwrap_or_default()
}

/// Serialize an optional date-time as `yyyyMMdd HH:mm:ss`, blank when absent.
pub fn format_datetime(value: Option<NaiveDateTime>) -> String {
    value
        .map(|d| d.format(DATETIME_FORMAT).to_string())
        .unwrap_or_default()
}

/// Serialize any optional displayable value, blank when absent.
pub fn format_opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Serialize an optional vendor enum as its vendor token.
pub fn format_vendor<E: VendorEnum>(value: Option<E>) -> String {
    value.map(|v| v.token().to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vendor::Execution;

    const TAIL: &[&str] = &["Extra"];

    #[test]
    fn test_clean_line_strips_quotes() {
        assert_eq!(clean_line("\"a\"\t\"b\"\r\n"), "a\tb");
    }

    #[test]
    fn test_clean_line_strips_byte_order_mark() {
        let line = clean_line("\u{feff}TransactionID\tEventType\r\n");
        assert_eq!(line, "TransactionID\tEventType");
        assert!(is_header_line(&line));
    }

    #[test]
    fn test_blank_lines() {
        assert!(is_blank_line("\t\t\t"));
        assert!(is_blank_line(""));
        assert!(!is_blank_line("\tx\t"));
    }

    #[test]
    fn test_header_detection_is_case_insensitive() {
        assert!(is_header_line("TransactionID\tEventType"));
        assert!(is_header_line("transactionid\tEventType"));
        assert!(!is_header_line("BIXYZ123\tTransaction"));
    }

    #[test]
    fn test_header_index_lookup() {
        let index = HeaderIndex::from_header("TransactionID\tLastUpdate\tTickerSymbol");
        assert_eq!(index.width(), 3);
        assert_eq!(index.position("lastupdate"), Some(1));
        assert_eq!(index.position("TICKERSYMBOL"), Some(2));
        assert_eq!(index.position("ISIN"), None);
    }

    #[test]
    fn test_named_missing_column_is_none() {
        let schema = Schema::HeaderIndexed(HeaderIndex::from_header("TransactionID\tLastUpdate"));
        let source = schema.source("T1\t2019-03-08", TAIL).unwrap();
        assert_eq!(source.text("TransactionID").unwrap().as_deref(), Some("T1"));
        assert_eq!(source.text("ISIN").unwrap(), None);
        assert_eq!(
            source.required_date("LastUpdate").unwrap(),
            NaiveDate::from_ymd_opt(2019, 3, 8).unwrap()
        );
    }

    #[test]
    fn test_blank_cells_are_none() {
        let schema = Schema::HeaderIndexed(HeaderIndex::from_header("TransactionID\tLastUpdate"));
        let source = schema.source("T1\t   ", TAIL).unwrap();
        assert_eq!(
            source.required_date("LastUpdate"),
            Err(ParseError::MissingRequired("LastUpdate"))
        );
    }

    #[test]
    fn test_fixed_offset_strips_noise_columns() {
        // 30 raw cells: noise at 13, 21, 28, 29; canonical values elsewhere
        let mut raw: Vec<String> = Vec::new();
        let mut canonical = 0;
        for idx in 0..31 {
            if LEGACY_NOISE_COLUMNS.contains(&idx) {
                raw.push(format!("noise{idx}"));
            } else {
                raw.push(format!("c{canonical}"));
                canonical += 1;
            }
        }
        let line = raw.join("\t");
        let source = Schema::FixedOffset.source(&line, TAIL).unwrap();

        assert_eq!(source.text("TransactionID").unwrap().as_deref(), Some("c0"));
        assert_eq!(source.text("CompanyName").unwrap().as_deref(), Some("c12"));
        assert_eq!(
            source.text("PreviousResultsAnnouncementDate").unwrap().as_deref(),
            Some("c13")
        );
        assert_eq!(source.text("TickerSymbol").unwrap().as_deref(), Some("c19"));
        assert_eq!(source.text("AnnouncementDate").unwrap().as_deref(), Some("c20"));
        assert_eq!(source.text("AnnouncedIn").unwrap().as_deref(), Some("c25"));
        assert_eq!(source.text("Extra").unwrap().as_deref(), Some("c26"));
    }

    #[test]
    fn test_fixed_offset_short_line() {
        let result = Schema::FixedOffset.source("a\tb\tc", TAIL);
        assert!(matches!(result, Err(ParseError::ShortLine { expected: 30, found: 3 })));
    }

    #[test]
    fn test_persisted_skips_timestamp_column() {
        let line = "20190308 10:41:00\tT1\tIntention\t20190308";
        let source = Schema::Persisted.source(line, TAIL).unwrap();
        assert_eq!(source.text("TransactionID").unwrap().as_deref(), Some("T1"));
        assert!(matches!(
            source.cell("NoSuchColumn"),
            Err(ParseError::UnknownColumn("NoSuchColumn"))
        ));
    }

    #[test]
    fn test_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2019, 3, 8).unwrap();
        assert_eq!(parse_date("20190308"), Some(expected));
        assert_eq!(parse_date("2019-03-08"), Some(expected));
        assert_eq!(parse_date("08/03/2019"), None);
        assert_eq!(parse_date("20191340"), None);

        let dt = parse_datetime("2019-03-08 10:41:00").unwrap();
        assert_eq!(format_datetime(Some(dt)), "20190308 10:41:00");
        assert_eq!(parse_datetime("20190308 10:41:00"), Some(dt));
        assert_eq!(
            parse_datetime("20190308"),
            Some(expected.and_time(NaiveTime::MIN))
        );
    }

    #[test]
    fn test_decimal_keeps_scale() {
        assert_eq!(parse_decimal("22.50").unwrap().to_string(), "22.50");
        assert_eq!(parse_decimal("1.5E+07").unwrap(), Decimal::from(15_000_000));
        assert_eq!(parse_decimal("abc"), None);
    }

    #[test]
    fn test_invalid_number_reports_field() {
        let schema = Schema::HeaderIndexed(HeaderIndex::from_header("TransactionID\tCompanyID"));
        let source = schema.source("T1\tACME", TAIL).unwrap();
        assert_eq!(
            source.integer("CompanyID"),
            Err(ParseError::InvalidNumber {
                field: "CompanyID",
                value: "ACME".to_string()
            })
        );
    }

    #[test]
    fn test_integer_accepts_whole_decimal() {
        let schema = Schema::HeaderIndexed(HeaderIndex::from_header("TransactionID\tCompanyID"));
        let source = schema.source("T1\t1200.0", TAIL).unwrap();
        assert_eq!(source.integer("CompanyID").unwrap(), Some(1200));
    }

    #[test]
    fn test_vendor_enum_never_fails() {
        let schema = Schema::HeaderIndexed(HeaderIndex::from_header("TransactionID\tExecution"));
        let source = schema.source("T1\tSomething odd", TAIL).unwrap();
        assert_eq!(
            source.vendor::<Execution>("Execution").unwrap(),
            Some(Execution::Error)
        );
    }

    #[test]
    fn test_format_blank_is_empty() {
        assert_eq!(format_date(None), "");
        assert_eq!(format_opt::<Decimal>(None), "");
        assert_eq!(format_vendor::<Execution>(None), "");
        assert_eq!(format_vendor(Some(Execution::Market)), "On Market");
    }
}
