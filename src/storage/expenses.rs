//! Operating expense table.

use anyhow::{Context, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::domain::{Cents, DateRange, Expense, ExpenseCategory, ExpenseId, format_date};

use super::{decode_date, decode_timestamp};

const COLUMNS: &str = "id, category, amount, description, recipient, date, created_by, created_at";

/// Save a new expense and assign its id.
pub async fn insert(conn: &mut SqliteConnection, expense: &mut Expense) -> Result<()> {
    let row = sqlx::query(
        r#"
        INSERT INTO expenses (category, amount, description, recipient, date, created_by, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(expense.category.as_str())
    .bind(expense.amount)
    .bind(&expense.description)
    .bind(&expense.recipient)
    .bind(format_date(expense.date))
    .bind(expense.created_by)
    .bind(expense.created_at.to_rfc3339())
    .fetch_one(&mut *conn)
    .await
    .context("Failed to insert expense")?;

    expense.id = row.get("id");
    Ok(())
}

pub async fn get(conn: &mut SqliteConnection, id: ExpenseId) -> Result<Option<Expense>> {
    let sql = format!("SELECT {COLUMNS} FROM expenses WHERE id = ?");
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to fetch expense")?;

    row.as_ref().map(row_to_expense).transpose()
}

/// Expenses newest first, optionally narrowed to a category and a date range.
pub async fn list(
    conn: &mut SqliteConnection,
    category: Option<ExpenseCategory>,
    range: DateRange,
) -> Result<Vec<Expense>> {
    let mut sql = format!("SELECT {COLUMNS} FROM expenses WHERE 1=1");
    let (where_clause, binds) = filter_clause(category, range);
    sql.push_str(&where_clause);
    sql.push_str(" ORDER BY date DESC, id DESC");

    let mut query = sqlx::query(&sql);
    for value in &binds {
        query = query.bind(value);
    }

    let rows = query
        .fetch_all(&mut *conn)
        .await
        .context("Failed to list expenses")?;

    rows.iter().map(row_to_expense).collect()
}

/// The latest `limit` expenses by date.
pub async fn list_recent(conn: &mut SqliteConnection, limit: i64) -> Result<Vec<Expense>> {
    let sql = format!("SELECT {COLUMNS} FROM expenses ORDER BY date DESC, id DESC LIMIT ?");
    let rows = sqlx::query(&sql)
        .bind(limit)
        .fetch_all(&mut *conn)
        .await
        .context("Failed to list recent expenses")?;

    rows.iter().map(row_to_expense).collect()
}

/// Sum of expense amounts, zero when nothing matches.
pub async fn total(
    conn: &mut SqliteConnection,
    category: Option<ExpenseCategory>,
    range: DateRange,
) -> Result<Cents> {
    let mut sql = String::from("SELECT COALESCE(SUM(amount), 0) AS total FROM expenses WHERE 1=1");
    let (where_clause, binds) = filter_clause(category, range);
    sql.push_str(&where_clause);

    let mut query = sqlx::query(&sql);
    for value in &binds {
        query = query.bind(value);
    }

    let row = query
        .fetch_one(&mut *conn)
        .await
        .context("Failed to total expenses")?;

    Ok(row.get("total"))
}

pub async fn update(conn: &mut SqliteConnection, expense: &Expense) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE expenses
        SET category = ?, amount = ?, description = ?, recipient = ?, date = ?
        WHERE id = ?
        "#,
    )
    .bind(expense.category.as_str())
    .bind(expense.amount)
    .bind(&expense.description)
    .bind(&expense.recipient)
    .bind(format_date(expense.date))
    .bind(expense.id)
    .execute(&mut *conn)
    .await
    .context("Failed to update expense")?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete(conn: &mut SqliteConnection, id: ExpenseId) -> Result<bool> {
    let result = sqlx::query("DELETE FROM expenses WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await
        .context("Failed to delete expense")?;
    Ok(result.rows_affected() > 0)
}

fn filter_clause(category: Option<ExpenseCategory>, range: DateRange) -> (String, Vec<String>) {
    let mut clause = String::new();
    let mut binds = Vec::new();

    if let Some(category) = category {
        clause.push_str(" AND category = ?");
        binds.push(category.as_str().to_string());
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

fn row_to_expense(row: &SqliteRow) -> Result<Expense> {
    let category: String = row.get("category");
    let date: String = row.get("date");
    let created_at: String = row.get("created_at");

    Ok(Expense {
        id: row.get("id"),
        category: ExpenseCategory::from_str(&category)
            .ok_or_else(|| anyhow::anyhow!("Invalid expense category: {}", category))?,
        amount: row.get("amount"),
        description: row.get("description"),
        recipient: row.get("recipient"),
        date: decode_date(&date, "date")?,
        created_by: row.get("created_by"),
        created_at: decode_timestamp(&created_at, "created_at")?,
    })
}
