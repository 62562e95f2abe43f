//! Buyback event records.
//!
//! Both dataset kinds share a block of common columns ([`EventHeader`]) and
//! add their own tail. The [`BuybackRecord`] trait is the capability set the
//! pipeline needs from a kind: parse from any layout, serialize to the
//! persisted line, and expose the values and reducers of its universe row.

mod intention;
mod transaction;

pub use intention::Intention;
pub use transaction::Transaction;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

use crate::error::ParseError;
use crate::schema::{format_date, format_datetime, format_opt, format_vendor, FieldSource, Schema};
use crate::universe::Reducer;
use crate::vendor::{EventKind, EventType};

/// Capabilities shared by [`Intention`] and [`Transaction`].
pub trait BuybackRecord: Sized + Clone + Send + Sync {
    /// Which dataset this record belongs to.
    const KIND: EventKind;

    /// Kind-specific columns following the common block, in canonical order.
    const COLUMNS: &'static [&'static str];

    /// One reducer per universe value, aligned with [`universe_values`].
    ///
    /// [`universe_values`]: BuybackRecord::universe_values
    const UNIVERSE_REDUCERS: &'static [Reducer];

    /// Build a record from a line's fields.
    fn from_fields(fields: &FieldSource<'_>) -> Result<Self, ParseError>;

    /// Common columns.
    fn header(&self) -> &EventHeader;

    /// Append the kind-specific columns, serialized.
    fn write_columns(&self, out: &mut Vec<String>);

    /// Values contributed to the daily universe row.
    fn universe_values(&self) -> Vec<Option<Decimal>>;

    /// Parse a cleaned line in the given layout.
    fn parse(line: &str, schema: &Schema) -> Result<Self, ParseError> {
        let fields = schema.source(line, Self::COLUMNS)?;
        Self::from_fields(&fields)
    }

    /// Parse a line previously written by [`to_line`](BuybackRecord::to_line).
    fn from_line(line: &str) -> Result<Self, ParseError> {
        Self::parse(line, &Schema::Persisted)
    }

    /// Serialize as a tab-separated output line, processing time first.
    fn to_line(&self) -> String {
        let header = self.header();
        let width = 1 + crate::schema::COMMON_COLUMNS.len() + Self::COLUMNS.len();
        let mut out = Vec::with_capacity(width);
        out.push(format_datetime(Some(header.processed_at())));
        header.write_columns(&mut out);
        self.write_columns(&mut out);
        out.join("\t")
    }

    /// Sort key for output files.
    fn processed_at(&self) -> NaiveDateTime {
        self.header().processed_at()
    }
}

/// Columns common to every vendor event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventHeader {
    pub transaction_id: Option<String>,
    pub event_type: Option<EventType>,
    pub last_update: NaiveDate,
    pub last_ids_update: Option<NaiveDate>,
    pub isin: Option<String>,
    pub usd_market_cap: Option<Decimal>,
    pub company_id: Option<i64>,
    pub icb_industry: Option<String>,
    pub icb_super_sector: Option<String>,
    pub icb_sector: Option<String>,
    pub icb_sub_sector: Option<String>,
    pub icb_code: Option<i64>,
    pub company_name: Option<String>,
    pub previous_results_announcement_date: Option<NaiveDate>,
    pub next_results_announcements_date: Option<NaiveDate>,
    pub next_close_begin: Option<NaiveDate>,
    pub last_close_ended: Option<NaiveDate>,
    pub security_description: Option<String>,
    pub ticker_country: Option<String>,
    pub ticker_symbol: Option<String>,
    pub announcement_date: Option<NaiveDate>,
    pub time_released: Option<NaiveDateTime>,
    pub time_processed: Option<NaiveDateTime>,
    pub time_released_utc: Option<NaiveDateTime>,
    pub time_processed_utc: Option<NaiveDateTime>,
    pub announced_in: Option<String>,
}

impl EventHeader {
    /// An otherwise empty header with the required last-update date.
    pub fn new(last_update: NaiveDate) -> Self {
        Self {
            transaction_id: None,
            event_type: None,
            last_update,
            last_ids_update: None,
            isin: None,
            usd_market_cap: None,
            company_id: None,
            icb_industry: None,
            icb_super_sector: None,
            icb_sector: None,
            icb_sub_sector: None,
            icb_code: None,
            company_name: None,
            previous_results_announcement_date: None,
            next_results_announcements_date: None,
            next_close_begin: None,
            last_close_ended: None,
            security_description: None,
            ticker_country: None,
            ticker_symbol: None,
            announcement_date: None,
            time_released: None,
            time_processed: None,
            time_released_utc: None,
            time_processed_utc: None,
            announced_in: None,
        }
    }

    /// Read the common columns. `LastUpdate` is required.
    pub fn from_fields(f: &FieldSource<'_>) -> Result<Self, ParseError> {
        Ok(Self {
            transaction_id: f.text("TransactionID")?,
            event_type: f.vendor("EventType")?,
            last_update: f.required_date("LastUpdate")?,
            last_ids_update: f.date("LastIDsUpdate")?,
            isin: f.text("ISIN")?,
            usd_market_cap: f.decimal("USDMarketCap")?,
            company_id: f.integer("CompanyID")?,
            icb_industry: f.text("ICBIndustry")?,
            icb_super_sector: f.text("ICBSuperSector")?,
            icb_sector: f.text("ICBSector")?,
            icb_sub_sector: f.text("ICBSubSector")?,
            icb_code: f.integer("ICBCode")?,
            company_name: f.text("CompanyName")?,
            previous_results_announcement_date: f.date("PreviousResultsAnnouncementDate")?,
            next_results_announcements_date: f.date("NextResultsAnnouncementsDate")?,
            next_close_begin: f.date("NextCloseBegin")?,
            last_close_ended: f.date("LastCloseEnded")?,
            security_description: f.text("SecurityDescription")?,
            ticker_country: f.text("TickerCountry")?,
            ticker_symbol: f.text("TickerSymbol")?,
            announcement_date: f.date("AnnouncementDate")?,
            time_released: f.datetime("TimeReleased")?,
            time_processed: f.datetime("TimeProcessed")?,
            time_released_utc: f.datetime("TimeReleasedUtc")?,
            time_processed_utc: f.datetime("TimeProcessedUtc")?,
            announced_in: f.text("AnnouncedIn")?,
        })
    }

    /// Append the common columns, serialized.
    pub fn write_columns(&self, out: &mut Vec<String>) {
        out.push(format_opt(self.transaction_id.as_deref()));
        out.push(format_vendor(self.event_type));
        out.push(format_date(Some(self.last_update)));
        out.push(format_date(self.last_ids_update));
        out.push(format_opt(self.isin.as_deref()));
        out.push(format_opt(self.usd_market_cap));
        out.push(format_opt(self.company_id));
        out.push(format_opt(self.icb_industry.as_deref()));
        out.push(format_opt(self.icb_super_sector.as_deref()));
        out.push(format_opt(self.icb_sector.as_deref()));
        out.push(format_opt(self.icb_sub_sector.as_deref()));
        out.push(format_opt(self.icb_code));
        out.push(format_opt(self.company_name.as_deref()));
        out.push(format_date(self.previous_results_announcement_date));
        out.push(format_date(self.next_results_announcements_date));
        out.push(format_date(self.next_close_begin));
        out.push(format_date(self.last_close_ended));
        out.push(format_opt(self.security_description.as_deref()));
        out.push(format_opt(self.ticker_country.as_deref()));
        out.push(format_opt(self.ticker_symbol.as_deref()));
        out.push(format_date(self.announcement_date));
        out.push(format_datetime(self.time_released));
        out.push(format_datetime(self.time_processed));
        out.push(format_datetime(self.time_released_utc));
        out.push(format_datetime(self.time_processed_utc));
        out.push(format_opt(self.announced_in.as_deref()));
    }

    /// Processing timestamp: processed UTC, else released UTC, else last update.
    pub fn processed_at(&self) -> NaiveDateTime {
        self.time_processed_utc
            .or(self.time_released_utc)
            .unwrap_or_else(|| self.last_update.and_time(NaiveTime::MIN))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::HeaderIndex;

    #[test]
    fn test_processed_at_fallbacks() {
        let date = NaiveDate::from_ymd_opt(2019, 3, 8).unwrap();
        let mut header = EventHeader::new(date);
        assert_eq!(header.processed_at(), date.and_time(NaiveTime::MIN));

        let released = date.and_hms_opt(9, 0, 0).unwrap();
        header.time_released_utc = Some(released);
        assert_eq!(header.processed_at(), released);

        let processed = date.and_hms_opt(10, 41, 0).unwrap();
        header.time_processed_utc = Some(processed);
        assert_eq!(header.processed_at(), processed);
    }

    #[test]
    fn test_header_requires_last_update() {
        let index = HeaderIndex::from_header(&fixtures::header_line(&[]));
        let schema = Schema::HeaderIndexed(index);
        let line = fixtures::indexed_line(&[], &[("TransactionID", "T1"), ("LastUpdate", " ")]);
        let fields = schema.source(&line, &[]).unwrap();
        assert_eq!(
            EventHeader::from_fields(&fields),
            Err(ParseError::MissingRequired("LastUpdate"))
        );
    }

    #[test]
    fn test_header_columns_width() {
        let header = EventHeader::new(NaiveDate::from_ymd_opt(2019, 3, 8).unwrap());
        let mut out = Vec::new();
        header.write_columns(&mut out);
        assert_eq!(out.len(), crate::schema::COMMON_COLUMNS.len());
        assert_eq!(out[2], "20190308");
        assert!(out.iter().all(|cell| cell != "null"));
    }
}
