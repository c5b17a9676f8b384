//! Spare-part stock table.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::domain::{NewSparePart, PartDetails, PartId, SparePart};

use super::decode_timestamp;

const COLUMNS: &str =
    "id, name, part_number, category, stock_quantity, unit_price, min_stock, created_at, updated_at";

pub async fn insert(conn: &mut SqliteConnection, part: &NewSparePart) -> Result<SparePart> {
    let now = Utc::now().to_rfc3339();
    let sql = format!(
        r#"
        INSERT INTO spare_parts (name, part_number, category, stock_quantity, unit_price, min_stock, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING {COLUMNS}
        "#
    );
    let row = sqlx::query(&sql)
        .bind(&part.details.name)
        .bind(&part.details.part_number)
        .bind(&part.details.category)
        .bind(part.stock_quantity)
        .bind(part.details.unit_price)
        .bind(part.details.min_stock)
        .bind(&now)
        .bind(&now)
        .fetch_one(&mut *conn)
        .await
        .context("Failed to insert spare part")?;

    row_to_part(&row)
}

pub async fn get(conn: &mut SqliteConnection, id: PartId) -> Result<Option<SparePart>> {
    let sql = format!("SELECT {COLUMNS} FROM spare_parts WHERE id = ?");
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to fetch spare part")?;

    row.as_ref().map(row_to_part).transpose()
}

pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<SparePart>> {
    let sql = format!("SELECT {COLUMNS} FROM spare_parts ORDER BY name, id");
    let rows = sqlx::query(&sql)
        .fetch_all(&mut *conn)
        .await
        .context("Failed to list spare parts")?;

    rows.iter().map(row_to_part).collect()
}

/// Parts at or below their reorder threshold, emptiest first.
pub async fn list_low_stock(conn: &mut SqliteConnection) -> Result<Vec<SparePart>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM spare_parts WHERE stock_quantity <= min_stock ORDER BY stock_quantity, name, id"
    );
    let rows = sqlx::query(&sql)
        .fetch_all(&mut *conn)
        .await
        .context("Failed to list low stock parts")?;

    rows.iter().map(row_to_part).collect()
}

pub async fn count_low_stock(conn: &mut SqliteConnection) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS count FROM spare_parts WHERE stock_quantity <= min_stock")
        .fetch_one(&mut *conn)
        .await
        .context("Failed to count low stock parts")?;

    Ok(row.get("count"))
}

/// Atomically add `delta` to the stock of a part.
///
/// The guard lives in the `WHERE` clause, so the check and the write happen in
/// one statement. It compares `delta` against the current stock instead of
/// adding them, since SQLite turns an overflowing sum into a REAL. Returns
/// `None` when the part does not exist or the result would be negative or out
/// of range; the caller tells these apart.
pub async fn try_adjust(
    conn: &mut SqliteConnection,
    id: PartId,
    delta: i64,
) -> Result<Option<SparePart>> {
    let sql = format!(
        r#"
        UPDATE spare_parts
        SET stock_quantity = stock_quantity + ?, updated_at = ?
        WHERE id = ? AND ? >= -stock_quantity AND ? <= 9223372036854775807 - stock_quantity
        RETURNING {COLUMNS}
        "#
    );
    let row = sqlx::query(&sql)
        .bind(delta)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .bind(delta)
        .bind(delta)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to adjust stock")?;

    row.as_ref().map(row_to_part).transpose()
}

/// Replace the descriptive fields; stock is left alone.
pub async fn update_details(
    conn: &mut SqliteConnection,
    id: PartId,
    details: &PartDetails,
) -> Result<Option<SparePart>> {
    let sql = format!(
        r#"
        UPDATE spare_parts
        SET name = ?, part_number = ?, category = ?, unit_price = ?, min_stock = ?, updated_at = ?
        WHERE id = ?
        RETURNING {COLUMNS}
        "#
    );
    let row = sqlx::query(&sql)
        .bind(&details.name)
        .bind(&details.part_number)
        .bind(&details.category)
        .bind(details.unit_price)
        .bind(details.min_stock)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to update spare part")?;

    row.as_ref().map(row_to_part).transpose()
}

pub async fn delete(conn: &mut SqliteConnection, id: PartId) -> Result<bool> {
    let result = sqlx::query("DELETE FROM spare_parts WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await
        .context("Failed to delete spare part")?;
    Ok(result.rows_affected() > 0)
}

fn row_to_part(row: &SqliteRow) -> Result<SparePart> {
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(SparePart {
        id: row.get("id"),
        name: row.get("name"),
        part_number: row.get("part_number"),
        category: row.get("category"),
        stock_quantity: row.get("stock_quantity"),
        unit_price: row.get("unit_price"),
        min_stock: row.get("min_stock"),
        created_at: decode_timestamp(&created_at, "created_at")?,
        updated_at: decode_timestamp(&updated_at, "updated_at")?,
    })
}
