//! Append-only transaction ledger.
//!
//! There is no update or delete here; the schema triggers reject both.

use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::domain::{
    Cents, DateRange, EntityType, NewTransaction, Transaction, TransactionKind, format_date,
};

use super::decode_date;

const COLUMNS: &str = "id, kind, entity_type, entity_id, amount, party_name, date, description";

pub async fn append(conn: &mut SqliteConnection, entry: &NewTransaction) -> Result<Transaction> {
    let sql = format!(
        r#"
        INSERT INTO transactions (kind, entity_type, entity_id, amount, party_name, date, description)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING {COLUMNS}
        "#
    );
    let row = sqlx::query(&sql)
        .bind(entry.kind.as_str())
        .bind(entry.entity_type.as_str())
        .bind(entry.entity_id)
        .bind(entry.amount)
        .bind(&entry.party_name)
        .bind(format_date(entry.date))
        .bind(&entry.description)
        .fetch_one(&mut *conn)
        .await
        .context("Failed to append ledger entry")?;

    row_to_transaction(&row)
}

/// Entries newest first, optionally restricted by kind and date range.
pub async fn list(
    conn: &mut SqliteConnection,
    kind: Option<TransactionKind>,
    range: DateRange,
) -> Result<Vec<Transaction>> {
    let mut sql = format!("SELECT {COLUMNS} FROM transactions WHERE 1=1");
    let (where_clause, binds) = filter_clause(kind, range);
    sql.push_str(&where_clause);
    sql.push_str(" ORDER BY date DESC, id DESC");

    let mut query = sqlx::query(&sql);
    for value in &binds {
        query = query.bind(value);
    }

    let rows = query
        .fetch_all(&mut *conn)
        .await
        .context("Failed to list transactions")?;

    rows.iter().map(row_to_transaction).collect()
}

pub async fn total_by_kind(
    conn: &mut SqliteConnection,
    kind: TransactionKind,
    range: DateRange,
) -> Result<Cents> {
    let mut sql = String::from("SELECT COALESCE(SUM(amount), 0) AS total FROM transactions WHERE 1=1");
    let (where_clause, binds) = filter_clause(Some(kind), range);
    sql.push_str(&where_clause);

    let mut query = sqlx::query(&sql);
    for value in &binds {
        query = query.bind(value);
    }

    let row = query
        .fetch_one(&mut *conn)
        .await
        .context("Failed to total transactions")?;

    Ok(row.get("total"))
}

/// Every entry that references one entity, oldest first.
pub async fn list_for_entity(
    conn: &mut SqliteConnection,
    entity_type: EntityType,
    entity_id: i64,
) -> Result<Vec<Transaction>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM transactions WHERE entity_type = ? AND entity_id = ? ORDER BY id"
    );
    let rows = sqlx::query(&sql)
        .bind(entity_type.as_str())
        .bind(entity_id)
        .fetch_all(&mut *conn)
        .await
        .context("Failed to list transactions for entity")?;

    rows.iter().map(row_to_transaction).collect()
}

/// Counts of rows that break the inventory/ledger pairing rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityStats {
    pub tractors_without_purchase: i64,
    pub sold_tractors_without_sale: i64,
    pub services_without_sale: i64,
    pub negative_entries: i64,
    pub dangling_exchange_links: i64,
}

pub async fn integrity_stats(conn: &mut SqliteConnection) -> Result<IntegrityStats> {
    let row = sqlx::query(
        r#"
        SELECT
            (SELECT COUNT(*) FROM tractors t
              WHERE NOT EXISTS (SELECT 1 FROM transactions x
                                 WHERE x.entity_type = 'tractor' AND x.entity_id = t.id
                                   AND x.kind = 'purchase')) AS tractors_without_purchase,
            (SELECT COUNT(*) FROM tractors t
              WHERE t.status = 'sold'
                AND NOT EXISTS (SELECT 1 FROM transactions x
                                 WHERE x.entity_type = 'tractor' AND x.entity_id = t.id
                                   AND x.kind = 'sale')) AS sold_tractors_without_sale,
            (SELECT COUNT(*) FROM service_records s
              WHERE NOT EXISTS (SELECT 1 FROM transactions x
                                 WHERE x.entity_type = 'service' AND x.entity_id = s.id
                                   AND x.kind = 'sale')) AS services_without_sale,
            (SELECT COUNT(*) FROM transactions WHERE amount < 0) AS negative_entries,
            (SELECT COUNT(*) FROM tractors t
              WHERE t.exchange_tractor_id IS NOT NULL
                AND NOT EXISTS (SELECT 1 FROM tractors e
                                 WHERE e.id = t.exchange_tractor_id)) AS dangling_exchange_links
        "#,
    )
    .fetch_one(&mut *conn)
    .await
    .context("Failed to compute ledger integrity")?;

    Ok(IntegrityStats {
        tractors_without_purchase: row.get("tractors_without_purchase"),
        sold_tractors_without_sale: row.get("sold_tractors_without_sale"),
        services_without_sale: row.get("services_without_sale"),
        negative_entries: row.get("negative_entries"),
        dangling_exchange_links: row.get("dangling_exchange_links"),
    })
}

fn filter_clause(kind: Option<TransactionKind>, range: DateRange) -> (String, Vec<String>) {
    let mut clause = String::new();
    let mut binds = Vec::new();

    if let Some(kind) = kind {
        clause.push_str(" AND kind = ?");
        binds.push(kind.as_str().to_string());
    }
    if let Some(start) = range.start_str() {
        clause.push_str(" AND date >= ?");
        binds.push(start);
    }
    if let Some(end) = range.end_str() {
        clause.push_str(" AND date <= ?");
        binds.push(end);
    }

    (clause, binds)
}

fn row_to_transaction(row: &SqliteRow) -> Result<Transaction> {
    let kind: String = row.get("kind");
    let entity_type: String = row.get("entity_type");
    let date: String = row.get("date");

    Ok(Transaction {
        id: row.get("id"),
        kind: TransactionKind::from_str(&kind)
            .ok_or_else(|| anyhow::anyhow!("Invalid transaction kind: {}", kind))?,
        entity_type: EntityType::from_str(&entity_type)
            .ok_or_else(|| anyhow::anyhow!("Invalid entity type: {}", entity_type))?,
        entity_id: row.get("entity_id"),
        amount: row.get("amount"),
        party_name: row.get("party_name"),
        date: decode_date(&date, "date")?,
        description: row.get("description"),
    })
}
