use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::{BuybackRecord, EventHeader};
use crate::error::ParseError;
use crate::schema::{format_date, format_opt, format_vendor, FieldSource};
use crate::universe::Reducer;
use crate::vendor::{EventKind, Execution, ExecutionEntity, ExecutionHolding};

/// An executed buyback trade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub event: EventHeader,
    /// Date the shares were bought back
    pub buyback_date: Option<NaiveDate>,
    pub execution: Option<Execution>,
    pub execution_entity: Option<ExecutionEntity>,
    pub execution_holding: Option<ExecutionHolding>,
    pub currency: Option<String>,
    pub execution_price: Option<Decimal>,
    /// Shares bought back
    pub amount: Option<Decimal>,
    /// Trade value in `currency`
    pub local_value: Option<Decimal>,
    pub eur_value: Option<Decimal>,
    pub usd_value: Option<Decimal>,
    pub note_text: Option<String>,
    /// Shares bought back as a share of market capitalization
    pub buyback_percentage: Option<Decimal>,
    /// Shares bought back as a share of the day's traded volume
    pub volume_percentage: Option<Decimal>,
    pub conversion_rate: Option<Decimal>,
    pub amount_adjusted_factor: Option<Decimal>,
    pub price_adjusted_factor: Option<Decimal>,
    /// Shares held in treasury after the trade
    pub treasury_holding: Option<i64>,
}

impl Transaction {
    /// A transaction with only the common columns set.
    pub fn new(event: EventHeader) -> Self {
        Self {
            event,
            buyback_date: None,
            execution: None,
            execution_entity: None,
            execution_holding: None,
            currency: None,
            execution_price: None,
            amount: None,
            local_value: None,
            eur_value: None,
            usd_value: None,
            note_text: None,
            buyback_percentage: None,
            volume_percentage: None,
            conversion_rate: None,
            amount_adjusted_factor: None,
            price_adjusted_factor: None,
            treasury_holding: None,
        }
    }
}

impl BuybackRecord for Transaction {
    const KIND: EventKind = EventKind::Transaction;

    const COLUMNS: &'static [&'static str] = &[
        "BuybackDate",
        "Execution",
        "ExecutionEntity",
        "ExecutionHolding",
        "Currency",
        "ExecutionPrice",
        "Amount",
        "LocalValue",
        "EURValue",
        "USDValue",
        "NoteText",
        "BuybackPercentage",
        "VolumePercentage",
        "ConversionRate",
        "AmountAdjustedFactor",
        "PriceAdjustedFactor",
        "TreasuryHolding",
    ];

    /// amount, min price, max price, USD value, buyback %, volume %, market cap
    const UNIVERSE_REDUCERS: &'static [Reducer] = &[
        Reducer::Sum,
        Reducer::Min,
        Reducer::Max,
        Reducer::Sum,
        Reducer::Sum,
        Reducer::Sum,
        Reducer::Last,
    ];

    fn from_fields(f: &FieldSource<'_>) -> Result<Self, ParseError> {
        Ok(Self {
            event: EventHeader::from_fields(f)?,
            buyback_date: f.date("BuybackDate")?,
            execution: f.vendor("Execution")?,
            execution_entity: f.vendor("ExecutionEntity")?,
            execution_holding: f
                .vendor::<ExecutionHolding>("ExecutionHolding")?
                .map(ExecutionHolding::normalized),
            currency: f.text("Currency")?,
            execution_price: f.decimal("ExecutionPrice")?,
            amount: f.decimal("Amount")?,
            local_value: f.decimal("LocalValue")?,
            eur_value: f.decimal("EURValue")?,
            usd_value: f.decimal("USDValue")?,
            note_text: f.text("NoteText")?,
            buyback_percentage: f.decimal("BuybackPercentage")?,
            volume_percentage: f.decimal("VolumePercentage")?,
            conversion_rate: f.decimal("ConversionRate")?,
            amount_adjusted_factor: f.decimal("AmountAdjustedFactor")?,
            price_adjusted_factor: f.decimal("PriceAdjustedFactor")?,
            treasury_holding: f.integer("TreasuryHolding")?,
        })
    }

    fn header(&self) -> &EventHeader {
        &self.event
    }

    fn write_columns(&self, out: &mut Vec<String>) {
        out.push(format_date(self.buyback_date));
        out.push(format_vendor(self.execution));
        out.push(format_vendor(self.execution_entity));
        out.push(format_vendor(self.execution_holding));
        out.push(format_opt(self.currency.as_deref()));
        out.push(format_opt(self.execution_price));
        out.push(format_opt(self.amount));
        out.push(format_opt(self.local_value));
        out.push(format_opt(self.eur_value));
        out.push(format_opt(self.usd_value));
        out.push(format_opt(self.note_text.as_deref()));
        out.push(format_opt(self.buyback_percentage));
        out.push(format_opt(self.volume_percentage));
        out.push(format_opt(self.conversion_rate));
        out.push(format_opt(self.amount_adjusted_factor));
        out.push(format_opt(self.price_adjusted_factor));
        out.push(format_opt(self.treasury_holding));
    }

    fn universe_values(&self) -> Vec<Option<Decimal>> {
        vec![
            self.amount,
            self.execution_price,
            self.execution_price,
            self.usd_value,
            self.buyback_percentage,
            self.volume_percentage,
            self.event.usd_market_cap,
        ]
    }
}
