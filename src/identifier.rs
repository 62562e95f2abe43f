//! Stable security identifiers.
//!
//! Downstream consumers correlate companies across files and ticker renames
//! by an identifier derived from (first date, ticker, market). The encoding
//! is the platform's equity identifier:
//!
//! ```text
//! properties = oa_days(first_date) * 10^14 + market_code * 100 + EQUITY
//! identifier = "<TICKER> <base36(properties)>"
//! ```
//!
//! where `oa_days` counts days since 1899-12-30.
//!
//! ```
//! use buyback_converter::identifier::SecurityIdentifier;
//! use chrono::NaiveDate;
//!
//! let first = NaiveDate::from_ymd_opt(1998, 1, 2).unwrap();
//! let sid = SecurityIdentifier::generate_equity(first, "spy", "usa").unwrap();
//! assert_eq!(sid.to_string(), "SPY R735QTJ8XC9X");
//! ```

use std::fmt;

use chrono::NaiveDate;

use crate::error::{BuybackError, Result};

const SECURITY_TYPE_EQUITY: u64 = 1;
const MARKET_OFFSET: u64 = 100;
const DAYS_OFFSET: u64 = 100_000_000_000_000;
const BASE36_DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Numeric code of a market within the identifier.
pub fn market_code(market: &str) -> Option<u64> {
    match market.to_ascii_lowercase().as_str() {
        "usa" => Some(1),
        _ => None,
    }
}

/// A ticker plus its encoded properties.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SecurityIdentifier {
    symbol: String,
    properties: u64,
}

impl SecurityIdentifier {
    /// Identifier for an equity first listed on `first_date` as `symbol`.
    pub fn generate_equity(first_date: NaiveDate, symbol: &str, market: &str) -> Result<Self> {
        let code = market_code(market)
            .ok_or_else(|| BuybackError::UnsupportedMarket(market.to_string()))?;
        Self::from_market_code(first_date, symbol, code)
    }

    /// Same as [`generate_equity`](Self::generate_equity) with a resolved market code.
    pub fn from_market_code(first_date: NaiveDate, symbol: &str, code: u64) -> Result<Self> {
        let days = u64::try_from(ole_automation_days(first_date)).map_err(|_| {
            BuybackError::generic(format!("First date {first_date} predates 1899-12-30"))
        })?;

        let properties = days
            .checked_mul(DAYS_OFFSET)
            .and_then(|p| p.checked_add(code * MARKET_OFFSET + SECURITY_TYPE_EQUITY))
            .ok_or_else(|| {
                BuybackError::generic(format!("First date {first_date} is out of range"))
            })?;

        Ok(Self {
            symbol: symbol.trim().to_ascii_uppercase(),
            properties,
        })
    }

    /// Ticker the identifier was generated with.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Encoded properties.
    pub fn properties(&self) -> u64 {
        self.properties
    }
}

impl fmt::Display for SecurityIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.symbol, encode_base36(self.properties))
    }
}

fn ole_automation_days(date: NaiveDate) -> i64 {
    // Day zero of the OLE automation calendar.
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or(NaiveDate::MIN);
    (date - epoch).num_days()
}

fn encode_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::with_capacity(13);
    while value != 0 {
        digits.push(BASE36_DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_known_identifiers() {
        let spy = SecurityIdentifier::generate_equity(date(1998, 1, 2), "SPY", "usa").unwrap();
        assert_eq!(spy.to_string(), "SPY R735QTJ8XC9X");

        let aapl = SecurityIdentifier::generate_equity(date(1980, 12, 12), "AAPL", "USA").unwrap();
        assert_eq!(aapl.to_string(), "AAPL MGOUOCLO92ED");
    }

    #[test]
    fn test_deterministic_and_date_sensitive() {
        let a = SecurityIdentifier::generate_equity(date(2004, 8, 19), "goog", "usa").unwrap();
        let b = SecurityIdentifier::generate_equity(date(2004, 8, 19), "GOOG", "usa").unwrap();
        let c = SecurityIdentifier::generate_equity(date(2004, 8, 20), "GOOG", "usa").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.symbol(), "GOOG");
    }

    #[test]
    fn test_unsupported_market() {
        let result = SecurityIdentifier::generate_equity(date(2004, 8, 19), "GOOG", "lse");
        assert!(matches!(result, Err(BuybackError::UnsupportedMarket(_))));
    }

    #[test]
    fn test_base36() {
        assert_eq!(encode_base36(0), "0");
        assert_eq!(encode_base36(35), "Z");
        assert_eq!(encode_base36(36), "10");
        assert_eq!(ole_automation_days(date(1899, 12, 31)), 1);
    }
}
