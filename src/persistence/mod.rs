use crate::models::TradeRecord;
use crate::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Column order is consumed by downstream analysis scripts; keep it stable
pub const LEDGER_HEADER: &str = "timestamp,action,price,profit";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Writes the trade ledger as CSV
#[derive(Debug, Clone)]
pub struct LedgerWriter {
    path: PathBuf,
}

impl LedgerWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the file with the full ledger
    ///
    /// The header is written even for an empty ledger.
    pub fn write(&self, records: &[TradeRecord]) -> Result<()> {
        let mut file = BufWriter::new(File::create(&self.path)?);

        writeln!(file, "{}", LEDGER_HEADER)?;

        for record in records {
            writeln!(file, "{}", format_row(record))?;
        }

        file.flush()?;

        tracing::debug!(
            "Wrote {} trades to {}",
            records.len(),
            self.path.display()
        );

        Ok(())
    }
}

fn format_row(record: &TradeRecord) -> String {
    format!(
        "{},{},{},{}",
        record.timestamp.format(TIMESTAMP_FORMAT),
        record.action.as_str(),
        record.price,
        record.realized_return
    )
}
