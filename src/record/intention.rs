use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::{BuybackRecord, EventHeader};
use crate::error::ParseError;
use crate::schema::{format_date, format_opt, format_vendor, FieldSource};
use crate::universe::Reducer;
use crate::vendor::{EventKind, Execution, ExecutionEntity, ExecutionHolding};

/// An announced authorization or plan to buy back shares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intention {
    pub event: EventHeader,
    pub execution: Option<Execution>,
    pub execution_entity: Option<ExecutionEntity>,
    pub execution_holding: Option<ExecutionHolding>,
    /// Authorized number of shares
    pub amount: Option<i64>,
    pub value_currency: Option<String>,
    /// Authorized value in `value_currency`
    pub amount_value: Option<Decimal>,
    /// Authorized share of outstanding stock
    pub percentage: Option<Decimal>,
    pub authorization_start_date: Option<NaiveDate>,
    pub authorization_end_date: Option<NaiveDate>,
    pub price_currency: Option<String>,
    pub minimum_price: Option<Decimal>,
    pub maximum_price: Option<Decimal>,
    pub note_text: Option<String>,
}

impl Intention {
    /// An intention with only the common columns set.
    pub fn new(event: EventHeader) -> Self {
        Self {
            event,
            execution: None,
            execution_entity: None,
            execution_holding: None,
            amount: None,
            value_currency: None,
            amount_value: None,
            percentage: None,
            authorization_start_date: None,
            authorization_end_date: None,
            price_currency: None,
            minimum_price: None,
            maximum_price: None,
            note_text: None,
        }
    }
}

impl BuybackRecord for Intention {
    const KIND: EventKind = EventKind::Intention;

    const COLUMNS: &'static [&'static str] = &[
        "Execution",
        "ExecutionEntity",
        "ExecutionHolding",
        "Amount",
        "ValueCurrency",
        "AmountValue",
        "Percentage",
        "AuthorizationStartDate",
        "AuthorizationEndDate",
        "PriceCurrency",
        "MinimumPrice",
        "MaximumPrice",
        "NoteText",
    ];

    /// amount, amount value, percentage, minimum price, maximum price, market cap
    const UNIVERSE_REDUCERS: &'static [Reducer] = &[
        Reducer::Sum,
        Reducer::Sum,
        Reducer::Sum,
        Reducer::Min,
        Reducer::Max,
        Reducer::Last,
    ];

    fn from_fields(f: &FieldSource<'_>) -> Result<Self, ParseError> {
        Ok(Self {
            event: EventHeader::from_fields(f)?,
            execution: f.vendor("Execution")?,
            execution_entity: f.vendor("ExecutionEntity")?,
            execution_holding: f
                .vendor::<ExecutionHolding>("ExecutionHolding")?
                .map(ExecutionHolding::normalized),
            amount: f.integer("Amount")?,
            value_currency: f.text("ValueCurrency")?,
            amount_value: f.decimal("AmountValue")?,
            percentage: f.decimal("Percentage")?,
            authorization_start_date: f.date("AuthorizationStartDate")?,
            authorization_end_date: f.date("AuthorizationEndDate")?,
            price_currency: f.text("PriceCurrency")?,
            minimum_price: f.decimal("MinimumPrice")?,
            maximum_price: f.decimal("MaximumPrice")?,
            note_text: f.text("NoteText")?,
        })
    }

    fn header(&self) -> &EventHeader {
        &self.event
    }

    fn write_columns(&self, out: &mut Vec<String>) {
        out.push(format_vendor(self.execution));
        out.push(format_vendor(self.execution_entity));
        out.push(format_vendor(self.execution_holding));
        out.push(format_opt(self.amount));
        out.push(format_opt(self.value_currency.as_deref()));
        out.push(format_opt(self.amount_value));
        out.push(format_opt(self.percentage));
        out.push(format_date(self.authorization_start_date));
        out.push(format_date(self.authorization_end_date));
        out.push(format_opt(self.price_currency.as_deref()));
        out.push(format_opt(self.minimum_price));
        out.push(format_opt(self.maximum_price));
        out.push(format_opt(self.note_text.as_deref()));
    }

    fn universe_values(&self) -> Vec<Option<Decimal>> {
        vec![
            self.amount.map(Decimal::from),
            self.amount_value,
            self.percentage,
            self.minimum_price,
            self.maximum_price,
            self.event.usd_market_cap,
        ]
    }
}
