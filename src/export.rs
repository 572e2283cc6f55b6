use anyhow::{Context, Result};
use std::io::Write;

use crate::models::{to_ledger_precision, LedgerEntry};

const HEADER: [&str; 5] = ["budget_id", "category_id", "month", "budgeted", "carryover_balance"];

/// Write ledger entries as CSV, one row per month. Returns the number of rows.
pub fn write_ledger_csv<W: Write>(writer: W, entries: &[LedgerEntry]) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(HEADER)
        .context("Failed to write CSV header")?;
    for entry in entries {
        let budgeted = format!("{:.2}", to_ledger_precision(entry.budgeted));
        let carryover = format!("{:.2}", to_ledger_precision(entry.carryover_balance));
        wtr.write_record([
            entry.budget_id.as_str(),
            entry.category_id.as_str(),
            entry.month.as_str(),
            budgeted.as_str(),
            carryover.as_str(),
        ])
        .with_context(|| format!("Failed to write ledger row for {}", entry.key()))?;
    }
    wtr.flush().context("Failed to flush CSV output")?;
    Ok(entries.len())
}
