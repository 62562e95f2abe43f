//! One conversion run: both kinds for one date.
//!
//! Intentions and transactions are converted and written independently. A
//! missing input file or a failure in one kind is logged and reported, and
//! the other kind still runs.
//!
//! The [`RunReport`] can be saved as JSON next to the output for monitoring.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::ConverterConfig;
use crate::converter::{ConversionStats, Converter};
use crate::error::{BuybackError, Result};
use crate::record::{BuybackRecord, Intention, Transaction};
use crate::symbology::SymbolResolver;
use crate::vendor::EventKind;
use crate::writer::{OutputWriter, WriteSummary};

/// Outcome of one kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum KindReport {
    /// Converted and written
    Completed {
        stats: ConversionStats,
        written: WriteSummary,
    },
    /// Aborted; the message is the error that stopped it
    Failed(String),
}

impl KindReport {
    /// Whether the kind completed.
    pub fn is_success(&self) -> bool {
        matches!(self, KindReport::Completed { .. })
    }

    /// Conversion counters, when the kind completed.
    pub fn stats(&self) -> Option<&ConversionStats> {
        match self {
            KindReport::Completed { stats, .. } => Some(stats),
            KindReport::Failed(_) => None,
        }
    }
}

/// Outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub date: NaiveDate,
    pub intentions: KindReport,
    pub transactions: KindReport,
}

impl RunReport {
    /// True only when both kinds completed.
    pub fn success(&self) -> bool {
        self.intentions.is_success() && self.transactions.is_success()
    }

    /// Report for one kind.
    pub fn kind(&self, kind: EventKind) -> &KindReport {
        match kind {
            EventKind::Intention => &self.intentions,
            EventKind::Transaction => &self.transactions,
        }
    }

    /// Pretty-printed JSON form of the report.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| BuybackError::generic(format!("Cannot serialize run report: {e}")))
    }

    /// Save the report as JSON.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?).map_err(|e| BuybackError::io(path, e))
    }
}

/// Convert and write both kinds for `date`.
///
/// Only configuration errors are returned; per-kind failures end up in the
/// report.
pub fn run_date(
    config: &ConverterConfig,
    resolver: &dyn SymbolResolver,
    date: NaiveDate,
) -> Result<RunReport> {
    config.validate()?;
    let mut converter = Converter::new(resolver, config)?;
    let writer = OutputWriter::new(config);

    log::info!("Starting buyback conversion for {date}");
    let intentions = run_kind::<Intention>(&mut converter, &writer, config, date);
    let transactions = run_kind::<Transaction>(&mut converter, &writer, config, date);

    let report = RunReport {
        date,
        intentions,
        transactions,
    };
    if report.success() {
        log::info!("Buyback conversion for {date} completed");
    } else {
        log::error!("Buyback conversion for {date} finished with failures");
    }
    Ok(report)
}

fn run_kind<R: BuybackRecord>(
    converter: &mut Converter<'_>,
    writer: &OutputWriter,
    config: &ConverterConfig,
    date: NaiveDate,
) -> KindReport {
    let path = config.input_path(R::KIND, date);
    let result = converter
        .process::<R, _>(&path)
        .and_then(|output| {
            let stats = output.stats.clone();
            writer.write(output).map(|written| (stats, written))
        });

    match result {
        Ok((stats, written)) => KindReport::Completed { stats, written },
        Err(e) => {
            log::error!("Failed to convert {} for {date}: {e}", R::KIND);
            KindReport::Failed(e.to_string())
        }
    }
}
