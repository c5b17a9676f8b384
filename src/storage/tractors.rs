//! Tractor inventory table.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::domain::{
    Cents, NewTractor, Tractor, TractorId, TractorStatus, TractorType, format_date,
};

use super::decode_date;

const COLUMNS: &str = "id, brand, model, year, tractor_type, chassis_number, engine_number, \
    purchase_price, sale_price, status, supplier_name, purchase_date, sale_date, customer_name, \
    notes, exchange_tractor_id";

/// Insert a freshly received tractor as in stock.
pub async fn insert(
    conn: &mut SqliteConnection,
    tractor: &NewTractor,
    purchase_date: NaiveDate,
) -> Result<Tractor> {
    let sql = format!(
        r#"
        INSERT INTO tractors (brand, model, year, tractor_type, chassis_number, engine_number,
                              purchase_price, status, supplier_name, purchase_date, notes)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING {COLUMNS}
        "#
    );
    let row = sqlx::query(&sql)
        .bind(&tractor.brand)
        .bind(&tractor.model)
        .bind(tractor.year)
        .bind(tractor.tractor_type.as_str())
        .bind(&tractor.chassis_number)
        .bind(&tractor.engine_number)
        .bind(tractor.purchase_price)
        .bind(TractorStatus::InStock.as_str())
        .bind(&tractor.supplier_name)
        .bind(format_date(purchase_date))
        .bind(&tractor.notes)
        .fetch_one(&mut *conn)
        .await
        .context("Failed to insert tractor")?;

    row_to_tractor(&row)
}

pub async fn get(conn: &mut SqliteConnection, id: TractorId) -> Result<Option<Tractor>> {
    let sql = format!("SELECT {COLUMNS} FROM tractors WHERE id = ?");
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to fetch tractor")?;

    row.as_ref().map(row_to_tractor).transpose()
}

/// Newest first, optionally restricted to one status.
pub async fn list(
    conn: &mut SqliteConnection,
    status: Option<TractorStatus>,
) -> Result<Vec<Tractor>> {
    let rows = match status {
        Some(status) => {
            let sql = format!("SELECT {COLUMNS} FROM tractors WHERE status = ? ORDER BY id DESC");
            sqlx::query(&sql)
                .bind(status.as_str())
                .fetch_all(&mut *conn)
                .await
        }
        None => {
            let sql = format!("SELECT {COLUMNS} FROM tractors ORDER BY id DESC");
            sqlx::query(&sql).fetch_all(&mut *conn).await
        }
    }
    .context("Failed to list tractors")?;

    rows.iter().map(row_to_tractor).collect()
}

pub async fn count_by_status(conn: &mut SqliteConnection, status: TractorStatus) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS count FROM tractors WHERE status = ?")
        .bind(status.as_str())
        .fetch_one(&mut *conn)
        .await
        .context("Failed to count tractors")?;

    Ok(row.get("count"))
}

/// Flip an in-stock tractor to sold. Returns `None` when the tractor is missing
/// or already sold, so concurrent sales of the same unit cannot both win.
pub async fn mark_sold(
    conn: &mut SqliteConnection,
    id: TractorId,
    sale_price: Cents,
    customer_name: &str,
    sale_date: NaiveDate,
) -> Result<Option<Tractor>> {
    let sql = format!(
        r#"
        UPDATE tractors
        SET status = ?, sale_price = ?, customer_name = ?, sale_date = ?
        WHERE id = ? AND status = ?
        RETURNING {COLUMNS}
        "#
    );
    let row = sqlx::query(&sql)
        .bind(TractorStatus::Sold.as_str())
        .bind(sale_price)
        .bind(customer_name)
        .bind(format_date(sale_date))
        .bind(id)
        .bind(TractorStatus::InStock.as_str())
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to mark tractor as sold")?;

    row.as_ref().map(row_to_tractor).transpose()
}

pub async fn set_exchange(
    conn: &mut SqliteConnection,
    id: TractorId,
    exchange_tractor_id: TractorId,
) -> Result<()> {
    sqlx::query("UPDATE tractors SET exchange_tractor_id = ? WHERE id = ?")
        .bind(exchange_tractor_id)
        .bind(id)
        .execute(&mut *conn)
        .await
        .context("Failed to link exchange tractor")?;
    Ok(())
}

/// Overwrite every mutable column. Returns false if the id is unknown.
pub async fn update(conn: &mut SqliteConnection, tractor: &Tractor) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE tractors
        SET brand = ?, model = ?, year = ?, tractor_type = ?, chassis_number = ?, engine_number = ?,
            purchase_price = ?, sale_price = ?, status = ?, supplier_name = ?, purchase_date = ?,
            sale_date = ?, customer_name = ?, notes = ?, exchange_tractor_id = ?
        WHERE id = ?
        "#,
    )
    .bind(&tractor.brand)
    .bind(&tractor.model)
    .bind(tractor.year)
    .bind(tractor.tractor_type.as_str())
    .bind(&tractor.chassis_number)
    .bind(&tractor.engine_number)
    .bind(tractor.purchase_price)
    .bind(tractor.sale_price)
    .bind(tractor.status.as_str())
    .bind(&tractor.supplier_name)
    .bind(format_date(tractor.purchase_date))
    .bind(tractor.sale_date.map(format_date))
    .bind(&tractor.customer_name)
    .bind(&tractor.notes)
    .bind(tractor.exchange_tractor_id)
    .bind(tractor.id)
    .execute(&mut *conn)
    .await
    .context("Failed to update tractor")?;

    Ok(result.rows_affected() > 0)
}

/// Null out every `exchange_tractor_id` that points at `id`.
pub async fn clear_exchange_references(conn: &mut SqliteConnection, id: TractorId) -> Result<u64> {
    let result = sqlx::query("UPDATE tractors SET exchange_tractor_id = NULL WHERE exchange_tractor_id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await
        .context("Failed to clear exchange references")?;
    Ok(result.rows_affected())
}

pub async fn delete(conn: &mut SqliteConnection, id: TractorId) -> Result<bool> {
    let result = sqlx::query("DELETE FROM tractors WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await
        .context("Failed to delete tractor")?;
    Ok(result.rows_affected() > 0)
}

fn row_to_tractor(row: &SqliteRow) -> Result<Tractor> {
    let tractor_type: String = row.get("tractor_type");
    let status: String = row.get("status");
    let purchase_date: String = row.get("purchase_date");
    let sale_date: Option<String> = row.get("sale_date");

    Ok(Tractor {
        id: row.get("id"),
        brand: row.get("brand"),
        model: row.get("model"),
        year: row.get("year"),
        tractor_type: TractorType::from_str(&tractor_type)
            .ok_or_else(|| anyhow::anyhow!("Invalid tractor type: {}", tractor_type))?,
        chassis_number: row.get("chassis_number"),
        engine_number: row.get("engine_number"),
        purchase_price: row.get("purchase_price"),
        sale_price: row.get("sale_price"),
        status: TractorStatus::from_str(&status)
            .ok_or_else(|| anyhow::anyhow!("Invalid tractor status: {}", status))?,
        supplier_name: row.get("supplier_name"),
        purchase_date: decode_date(&purchase_date, "purchase_date")?,
        sale_date: sale_date
            .map(|raw| decode_date(&raw, "sale_date"))
            .transpose()?,
        customer_name: row.get("customer_name"),
        notes: row.get("notes"),
        exchange_tractor_id: row.get("exchange_tractor_id"),
    })
}
