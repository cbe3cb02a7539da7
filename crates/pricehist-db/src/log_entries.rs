//! Database operations for `channel_pricing_log_entries`.
//!
//! Entries are only ever inserted and, by the retention job, deleted.

use chrono::{DateTime, Utc};
use pricehist_core::PriceLogEntry;
use sqlx::{PgConnection, PgPool};

use crate::DbError;

/// A row from the `channel_pricing_log_entries` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LogEntryRow {
    pub id: i64,
    pub channel_pricing_id: i64,
    pub price: i64,
    pub original_price: Option<i64>,
    pub logged_at: DateTime<Utc>,
}

impl From<LogEntryRow> for PriceLogEntry {
    fn from(row: LogEntryRow) -> Self {
        Self {
            id: row.id,
            channel_pricing_id: row.channel_pricing_id,
            price: row.price,
            original_price: row.original_price,
            logged_at: row.logged_at,
        }
    }
}

/// Appends a log entry on an existing connection or transaction.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_log_entry(
    conn: &mut PgConnection,
    channel_pricing_id: i64,
    price: i64,
    original_price: Option<i64>,
    logged_at: DateTime<Utc>,
) -> Result<LogEntryRow, DbError> {
    let row = sqlx::query_as::<_, LogEntryRow>(
        "INSERT INTO channel_pricing_log_entries \
             (channel_pricing_id, price, original_price, logged_at) \
         VALUES ($1, $2, $3, $4) \
         RETURNING id, channel_pricing_id, price, original_price, logged_at",
    )
    .bind(channel_pricing_id)
    .bind(price)
    .bind(original_price)
    .bind(logged_at)
    .fetch_one(conn)
    .await?;

    Ok(row)
}

/// Full history of one channel pricing, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_by_channel_pricing_id_desc(
    pool: &PgPool,
    channel_pricing_id: i64,
) -> Result<Vec<LogEntryRow>, DbError> {
    let rows = sqlx::query_as::<_, LogEntryRow>(
        "SELECT id, channel_pricing_id, price, original_price, logged_at \
         FROM channel_pricing_log_entries \
         WHERE channel_pricing_id = $1 \
         ORDER BY id DESC",
    )
    .bind(channel_pricing_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Entries logged strictly before `date`, oldest first.
///
/// # Errors
///
/// Returns [`DbError::InvalidLimit`] without touching the database if
/// `limit` is zero or negative, or [`DbError::Sqlx`] if the query fails.
pub async fn find_older_than(
    pool: &PgPool,
    date: DateTime<Utc>,
    limit: Option<i64>,
) -> Result<Vec<LogEntryRow>, DbError> {
    if let Some(limit) = limit {
        ensure_positive(limit)?;
    }

    let rows = sqlx::query_as::<_, LogEntryRow>(
        "SELECT id, channel_pricing_id, price, original_price, logged_at \
         FROM channel_pricing_log_entries \
         WHERE logged_at < $1 \
         ORDER BY id \
         LIMIT $2",
    )
    .bind(date)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Number of entries logged strictly before `date`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_older_than(pool: &PgPool, date: DateTime<Utc>) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM channel_pricing_log_entries WHERE logged_at < $1",
    )
    .bind(date)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Deletes every entry logged before `date`, `batch_size` rows per statement.
///
/// Returns the number of entries deleted.
///
/// # Errors
///
/// Returns [`DbError::InvalidLimit`] for a non-positive batch size, or
/// [`DbError::Sqlx`] if a delete fails. Batches already deleted stay deleted.
pub async fn delete_older_than(
    pool: &PgPool,
    date: DateTime<Utc>,
    batch_size: i64,
) -> Result<u64, DbError> {
    ensure_positive(batch_size)?;

    let mut deleted: u64 = 0;
    loop {
        let batch = sqlx::query(
            "DELETE FROM channel_pricing_log_entries \
             WHERE id IN ( \
                 SELECT id FROM channel_pricing_log_entries \
                 WHERE logged_at < $1 \
                 ORDER BY id \
                 LIMIT $2 \
             )",
        )
        .bind(date)
        .bind(batch_size)
        .execute(pool)
        .await?
        .rows_affected();

        deleted += batch;
        tracing::debug!(batch, deleted, "purged price log batch");

        if batch < batch_size.unsigned_abs() {
            break;
        }
    }

    Ok(deleted)
}

fn ensure_positive(limit: i64) -> Result<(), DbError> {
    if limit < 1 {
        return Err(DbError::InvalidLimit(limit));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_positive_rejects_zero_and_negative() {
        assert!(matches!(ensure_positive(0), Err(DbError::InvalidLimit(0))));
        assert!(matches!(ensure_positive(-1), Err(DbError::InvalidLimit(-1))));
        assert!(ensure_positive(1).is_ok());
    }
}
