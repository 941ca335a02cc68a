use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{DbUser, Person, StoredMessage};

pub type Database = Arc<SqlitePool>;

const SCHEMA: &str = include_str!("../schema.sql");

/// Opens the pool and makes sure the schema exists.
pub async fn connect(database_url: &str) -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    // Every connection to `:memory:` is its own database.
    let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    init_schema(&pool).await?;
    info!("Database ready at {database_url}");

    Ok(pool)
}

pub async fn init_schema(pool: &SqlitePool) -> Result<(), AppError> {
    for statement in SCHEMA.split(';') {
        let statement = statement.trim();
        if !statement.is_empty() {
            sqlx::query(statement).execute(pool).await?;
        }
    }
    Ok(())
}

fn user_from_row(row: &SqliteRow) -> DbUser {
    DbUser {
        id: row.get("id"),
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn message_from_row(row: &SqliteRow) -> StoredMessage {
    StoredMessage {
        id: row.get("id"),
        sender: row.get("sender"),
        recipient: row.get("recipient"),
        text: row.get("text"),
        file: row.get("file"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub async fn create_user(
    pool: &SqlitePool,
    username: &str,
    password_hash: &str,
) -> Result<DbUser, AppError> {
    let existing = sqlx::query("SELECT id FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        return Err(AppError::Conflict("Username already taken".to_string()));
    }

    let user = DbUser {
        id: Uuid::new_v4().to_string(),
        username: username.to_string(),
        password_hash: password_hash.to_string(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    sqlx::query(
        "INSERT INTO users (id, username, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&user.id)
    .bind(&user.username)
    .bind(&user.password_hash)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            AppError::Conflict("Username already taken".to_string())
        }
        other => AppError::Database(other),
    })?;

    debug!("Created user {} ({})", user.username, user.id);
    Ok(user)
}

pub async fn find_user_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<DbUser>, AppError> {
    let row = sqlx::query(
        "SELECT id, username, password_hash, created_at, updated_at FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(user_from_row))
}

pub async fn get_user_by_id(pool: &SqlitePool, user_id: &str) -> Result<Option<DbUser>, AppError> {
    let row = sqlx::query(
        "SELECT id, username, password_hash, created_at, updated_at FROM users WHERE id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(user_from_row))
}

pub async fn list_people(pool: &SqlitePool) -> Result<Vec<Person>, AppError> {
    let rows = sqlx::query("SELECT id, username FROM users ORDER BY created_at ASC, rowid ASC")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| Person {
            id: row.get("id"),
            username: row.get("username"),
        })
        .collect())
}

pub async fn create_message(
    pool: &SqlitePool,
    sender: &str,
    recipient: &str,
    text: Option<&str>,
    file: Option<&str>,
) -> Result<StoredMessage, AppError> {
    let now = Utc::now();
    let message = StoredMessage {
        id: Uuid::new_v4().to_string(),
        sender: sender.to_string(),
        recipient: recipient.to_string(),
        text: text.map(str::to_string),
        file: file.map(str::to_string),
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        "INSERT INTO messages (id, sender, recipient, text, file, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&message.id)
    .bind(&message.sender)
    .bind(&message.recipient)
    .bind(&message.text)
    .bind(&message.file)
    .bind(message.created_at)
    .bind(message.updated_at)
    .execute(pool)
    .await?;

    Ok(message)
}

/// Conversation between two users in both directions, oldest first.
pub async fn messages_between(
    pool: &SqlitePool,
    user_a: &str,
    user_b: &str,
) -> Result<Vec<StoredMessage>, AppError> {
    let rows = sqlx::query(
        "SELECT id, sender, recipient, text, file, created_at, updated_at FROM messages
         WHERE sender IN (?, ?) AND recipient IN (?, ?)
         ORDER BY created_at ASC, rowid ASC",
    )
    .bind(user_a)
    .bind(user_b)
    .bind(user_a)
    .bind(user_b)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(message_from_row).collect())
}
