use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;

use crate::application::Dealership;
use crate::domain::{
    DateRange, Expense, ServiceRecord, SparePart, Tractor, Transaction, TransactionFilter,
    format_cents, format_date,
};

pub const LEDGER_CSV_HEADER: [&str; 8] = [
    "id",
    "date",
    "type",
    "entity_type",
    "entity_id",
    "amount",
    "party",
    "description",
];

/// Everything the dealership has on file, for backups and audits.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub tractors: Vec<Tractor>,
    pub spare_parts: Vec<SparePart>,
    pub service_records: Vec<ServiceRecord>,
    pub expenses: Vec<Expense>,
    pub transactions: Vec<Transaction>,
}

pub struct Exporter<'a> {
    dealership: &'a Dealership,
}

impl<'a> Exporter<'a> {
    pub fn new(dealership: &'a Dealership) -> Self {
        Self { dealership }
    }

    /// Write ledger entries as CSV, newest first. Returns the number of rows.
    pub async fn export_ledger_csv<W: Write>(&self, filter: TransactionFilter, writer: W) -> Result<usize> {
        let entries = self.dealership.accounting.transactions(filter).await?;
        write_ledger_csv(&entries, writer)
    }

    /// Write a JSON snapshot of every table.
    pub async fn export_full_json<W: Write>(&self, mut writer: W) -> Result<Snapshot> {
        let snapshot = Snapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            tractors: self.dealership.tractors.list(None).await?,
            spare_parts: self.dealership.parts.list().await?,
            service_records: self.dealership.services.list(DateRange::all()).await?,
            expenses: self.dealership.accounting.list_expenses(None, DateRange::all()).await?,
            transactions: self
                .dealership
                .accounting
                .transactions(TransactionFilter::default())
                .await?,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}

pub fn write_ledger_csv<W: Write>(entries: &[Transaction], writer: W) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(LEDGER_CSV_HEADER)?;

    for entry in entries {
        csv_writer.write_record(&[
            entry.id.to_string(),
            format_date(entry.date),
            entry.kind.as_str().to_string(),
            entry.entity_type.as_str().to_string(),
            entry.entity_id.to_string(),
            format_cents(entry.amount),
            entry.party_name.clone(),
            entry.description.clone(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(entries.len())
}
