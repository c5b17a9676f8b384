use anyhow::{Context, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::domain::{Role, User};

use super::decode_timestamp;

const COLUMNS: &str = "id, username, password_hash, role, full_name, created_at";

/// Save a new user and assign its id.
pub async fn insert(conn: &mut SqliteConnection, user: &mut User) -> Result<()> {
    let row = sqlx::query(
        r#"
        INSERT INTO users (username, password_hash, role, full_name, created_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(&user.username)
    .bind(&user.password_hash)
    .bind(user.role.as_str())
    .bind(&user.full_name)
    .bind(user.created_at.to_rfc3339())
    .fetch_one(&mut *conn)
    .await
    .context("Failed to insert user")?;

    user.id = row.get("id");
    Ok(())
}

pub async fn find_by_username(conn: &mut SqliteConnection, username: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {COLUMNS} FROM users WHERE username = ?");
    let row = sqlx::query(&sql)
        .bind(username)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to fetch user by username")?;

    row.as_ref().map(row_to_user).transpose()
}

pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<User>> {
    let sql = format!("SELECT {COLUMNS} FROM users ORDER BY username");
    let rows = sqlx::query(&sql)
        .fetch_all(&mut *conn)
        .await
        .context("Failed to list users")?;

    rows.iter().map(row_to_user).collect()
}

pub async fn count(conn: &mut SqliteConnection) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS total FROM users")
        .fetch_one(&mut *conn)
        .await
        .context("Failed to count users")?;
    Ok(row.get("total"))
}

fn row_to_user(row: &SqliteRow) -> Result<User> {
    let role: String = row.get("role");
    let created_at: String = row.get("created_at");

    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        role: Role::from_str(&role).ok_or_else(|| anyhow::anyhow!("Invalid role: {}", role))?,
        full_name: row.get("full_name"),
        created_at: decode_timestamp(&created_at, "created_at")?,
    })
}
