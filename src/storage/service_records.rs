//! Service job table. Consumed parts are kept as a JSON column.

use anyhow::{Context, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::domain::{
    DateRange, PartUsage, ServiceRecord, ServiceRecordId, ServiceStatus, TractorId, format_date,
};

use super::decode_date;

const COLUMNS: &str = "id, tractor_id, customer_name, description, labor_cost, parts_cost, \
    total_cost, parts_used, service_date, status";

/// Save a new service record and assign its id.
pub async fn insert(conn: &mut SqliteConnection, record: &mut ServiceRecord) -> Result<()> {
    let parts_json = serde_json::to_string(&record.parts_used)?;

    let row = sqlx::query(
        r#"
        INSERT INTO service_records (tractor_id, customer_name, description, labor_cost, parts_cost,
                                     total_cost, parts_used, service_date, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(record.tractor_id)
    .bind(&record.customer_name)
    .bind(&record.description)
    .bind(record.labor_cost)
    .bind(record.parts_cost)
    .bind(record.total_cost)
    .bind(&parts_json)
    .bind(format_date(record.service_date))
    .bind(record.status.as_str())
    .fetch_one(&mut *conn)
    .await
    .context("Failed to insert service record")?;

    record.id = row.get("id");
    Ok(())
}

pub async fn get(conn: &mut SqliteConnection, id: ServiceRecordId) -> Result<Option<ServiceRecord>> {
    let sql = format!("SELECT {COLUMNS} FROM service_records WHERE id = ?");
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to fetch service record")?;

    row.as_ref().map(row_to_record).transpose()
}

/// Records inside the range, most recent service date first.
pub async fn list(conn: &mut SqliteConnection, range: DateRange) -> Result<Vec<ServiceRecord>> {
    let mut sql = format!("SELECT {COLUMNS} FROM service_records WHERE 1=1");
    let start = range.start_str();
    let end = range.end_str();

    if start.is_some() {
        sql.push_str(" AND service_date >= ?");
    }
    if end.is_some() {
        sql.push_str(" AND service_date <= ?");
    }
    sql.push_str(" ORDER BY service_date DESC, id DESC");

    let mut query = sqlx::query(&sql);
    if let Some(ref start) = start {
        query = query.bind(start);
    }
    if let Some(ref end) = end {
        query = query.bind(end);
    }

    let rows = query
        .fetch_all(&mut *conn)
        .await
        .context("Failed to list service records")?;

    rows.iter().map(row_to_record).collect()
}

pub async fn update(conn: &mut SqliteConnection, record: &ServiceRecord) -> Result<bool> {
    let parts_json = serde_json::to_string(&record.parts_used)?;

    let result = sqlx::query(
        r#"
        UPDATE service_records
        SET tractor_id = ?, customer_name = ?, description = ?, labor_cost = ?, parts_cost = ?,
            total_cost = ?, parts_used = ?, service_date = ?, status = ?
        WHERE id = ?
        "#,
    )
    .bind(record.tractor_id)
    .bind(&record.customer_name)
    .bind(&record.description)
    .bind(record.labor_cost)
    .bind(record.parts_cost)
    .bind(record.total_cost)
    .bind(&parts_json)
    .bind(format_date(record.service_date))
    .bind(record.status.as_str())
    .bind(record.id)
    .execute(&mut *conn)
    .await
    .context("Failed to update service record")?;

    Ok(result.rows_affected() > 0)
}

/// Forget the tractor on every job that referenced it; the jobs themselves stay.
pub async fn detach_tractor(conn: &mut SqliteConnection, tractor_id: TractorId) -> Result<u64> {
    let result = sqlx::query("UPDATE service_records SET tractor_id = NULL WHERE tractor_id = ?")
        .bind(tractor_id)
        .execute(&mut *conn)
        .await
        .context("Failed to detach tractor from service records")?;
    Ok(result.rows_affected())
}

pub async fn delete(conn: &mut SqliteConnection, id: ServiceRecordId) -> Result<bool> {
    let result = sqlx::query("DELETE FROM service_records WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await
        .context("Failed to delete service record")?;
    Ok(result.rows_affected() > 0)
}

fn row_to_record(row: &SqliteRow) -> Result<ServiceRecord> {
    let parts_json: String = row.get("parts_used");
    let service_date: String = row.get("service_date");
    let status: String = row.get("status");

    let parts_used: Vec<PartUsage> = if parts_json.trim().is_empty() {
        Vec::new()
    } else {
        serde_json::from_str(&parts_json).context("Invalid parts_used JSON")?
    };

    Ok(ServiceRecord {
        id: row.get("id"),
        tractor_id: row.get("tractor_id"),
        customer_name: row.get("customer_name"),
        description: row.get("description"),
        labor_cost: row.get("labor_cost"),
        parts_cost: row.get("parts_cost"),
        total_cost: row.get("total_cost"),
        parts_used,
        service_date: decode_date(&service_date, "service_date")?,
        status: ServiceStatus::from_str(&status)
            .ok_or_else(|| anyhow::anyhow!("Invalid service status: {}", status))?,
    })
}
