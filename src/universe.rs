//! Daily universe aggregation.
//!
//! Every accepted record contributes to one row per (date, identifier). The
//! row is kept serialized (`identifier,v1,v2,...`) and each new observation
//! is folded in with the kind's [`Reducer`]s:
//!
//! - sums, minimums and maximums are order-independent
//! - the market-cap column is [`Reducer::Last`]: the most recently
//!   accumulated record wins, so callers feed records in file order
//!
//! A blank stored value acts as the reducer's identity (0, +∞, −∞). Two blanks
//! stay blank, so identities are never written out. A sum that does not fit
//! in a `Decimal` rejects the record and leaves the row as it was.
//!
//! # Example
//!
//! ```
//! use buyback_converter::universe::{Reducer, UniverseAccumulator};
//! use chrono::NaiveDate;
//! use rust_decimal::Decimal;
//!
//! let mut universe = UniverseAccumulator::new(&[Reducer::Sum, Reducer::Max]);
//! let date = NaiveDate::from_ymd_opt(2019, 3, 8).unwrap();
//!
//! let id = "AAPL R735QTJ8XC9X";
//! universe.accumulate(id, date, &[Some(Decimal::from(10)), Some(Decimal::from(3))])?;
//! universe.accumulate(id, date, &[Some(Decimal::from(5)), None])?;
//!
//! assert_eq!(universe.row(id, date), Some("AAPL R735QTJ8XC9X,15,3"));
//! # Ok::<(), buyback_converter::ParseError>(())
//! ```

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::ParseError;
use crate::record::BuybackRecord;
use crate::schema::{format_opt, parse_decimal};

/// How a universe column combines repeated observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    /// Running total
    Sum,
    /// Running minimum
    Min,
    /// Running maximum
    Max,
    /// Newest observation replaces the stored one, blank included
    Last,
}

impl Reducer {
    /// Fold `next` into `current`. `None` is the identity for sum/min/max.
    ///
    /// Returns `None` when a sum overflows.
    #[inline]
    pub fn apply(self, current: Option<Decimal>, next: Option<Decimal>) -> Option<Option<Decimal>> {
        match self {
            Reducer::Last => Some(next),
            Reducer::Sum => combine(current, next, Decimal::checked_add),
            Reducer::Min => combine(current, next, |a, b| Some(a.min(b))),
            Reducer::Max => combine(current, next, |a, b| Some(a.max(b))),
        }
    }
}

fn combine(
    current: Option<Decimal>,
    next: Option<Decimal>,
    f: impl FnOnce(Decimal, Decimal) -> Option<Decimal>,
) -> Option<Option<Decimal>> {
    match (current, next) {
        (Some(a), Some(b)) => f(a, b).map(Some),
        (a, b) => Some(a.or(b)),
    }
}

/// In-memory universe rows for one conversion run.
///
/// Rows are keyed by date, then identifier; both maps are ordered so the
/// rows come out already sorted for the universe files.
#[derive(Debug, Clone)]
pub struct UniverseAccumulator {
    reducers: &'static [Reducer],
    rows: BTreeMap<NaiveDate, BTreeMap<String, String>>,
    observations: u64,
}

impl UniverseAccumulator {
    /// Create an accumulator with one reducer per value column.
    pub fn new(reducers: &'static [Reducer]) -> Self {
        Self {
            reducers,
            rows: BTreeMap::new(),
            observations: 0,
        }
    }

    /// Create an accumulator for a record kind.
    pub fn for_kind<R: BuybackRecord>() -> Self {
        Self::new(R::UNIVERSE_REDUCERS)
    }

    /// Fold one record into the row for `(date, identifier)`.
    pub fn accumulate_record<R: BuybackRecord>(
        &mut self,
        identifier: &str,
        date: NaiveDate,
        record: &R,
    ) -> Result<(), ParseError> {
        self.accumulate(identifier, date, &record.universe_values())
    }

    /// Fold raw values into the row for `(date, identifier)`.
    ///
    /// `values` must line up with the reducers; missing trailing values are
    /// treated as blank. On overflow the stored row is left untouched.
    pub fn accumulate(
        &mut self,
        identifier: &str,
        date: NaiveDate,
        values: &[Option<Decimal>],
    ) -> Result<(), ParseError> {
        debug_assert_eq!(values.len(), self.reducers.len());

        let day = self.rows.entry(date).or_default();
        match day.get_mut(identifier) {
            None => {
                let merged: Vec<Option<Decimal>> = (0..self.reducers.len())
                    .map(|i| values.get(i).copied().flatten())
                    .collect();
                day.insert(identifier.to_string(), serialize_row(identifier, &merged));
            }
            Some(stored) => {
                let current = parse_row_values(stored, self.reducers.len());
                let merged = self
                    .reducers
                    .iter()
                    .zip(current)
                    .enumerate()
                    .map(|(column, (reducer, current))| {
                        reducer
                            .apply(current, values.get(column).copied().flatten())
                            .ok_or_else(|| ParseError::AggregateOverflow {
                                identifier: identifier.to_string(),
                                column,
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                *stored = serialize_row(identifier, &merged);
            }
        }

        self.observations += 1;
        Ok(())
    }

    /// Serialized row for a key, if any record touched it.
    pub fn row(&self, identifier: &str, date: NaiveDate) -> Option<&str> {
        self.rows
            .get(&date)
            .and_then(|day| day.get(identifier))
            .map(String::as_str)
    }

    /// Dates that have at least one row, ascending.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.rows.keys().copied()
    }

    /// Total number of rows across all dates.
    pub fn len(&self) -> usize {
        self.rows.values().map(BTreeMap::len).sum()
    }

    /// Whether no record has been accumulated.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of records folded in.
    pub fn observations(&self) -> u64 {
        self.observations
    }

    /// Consume the accumulator into per-date lines sorted by identifier.
    pub fn into_lines(self) -> BTreeMap<NaiveDate, Vec<String>> {
        self.rows
            .into_iter()
            .map(|(date, day)| (date, day.into_values().collect()))
            .collect()
    }
}

fn serialize_row(identifier: &str, values: &[Option<Decimal>]) -> String {
    let mut row = String::from(identifier);
    for value in values {
        row.push(',');
        row.push_str(&format_opt(*value));
    }
    row
}

/// Read the value columns of a stored row; blanks become `None`.
fn parse_row_values(row: &str, width: usize) -> Vec<Option<Decimal>> {
    let mut cells = row.split(',').skip(1);
    (0..width)
        .map(|_| {
            let cell = cells.next().unwrap_or("").trim();
            if cell.is_empty() {
                return None;
            }
            let parsed = parse_decimal(cell);
            if parsed.is_none() {
                log::warn!("Unreadable universe value {cell:?} in row {row:?}, treating as blank");
            }
            parsed
        })
        .collect()
}
