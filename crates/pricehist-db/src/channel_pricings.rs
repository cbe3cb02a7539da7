//! Database operations for `channel_pricings`.
//!
//! Every write that changes `price` or `original_price` appends a row to
//! `channel_pricing_log_entries` in the same transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pricehist_core::{ChannelPricing, ChannelPricingSource};
use sqlx::PgPool;

use crate::{log_entries::insert_log_entry, DbError};

/// A row from the `channel_pricings` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChannelPricingRow {
    pub id: i64,
    pub channel_code: String,
    pub product_variant_code: String,
    pub price: i64,
    pub original_price: Option<i64>,
    pub lowest_price_before_discount: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ChannelPricingRow> for ChannelPricing {
    fn from(row: ChannelPricingRow) -> Self {
        Self {
            id: row.id,
            channel_code: row.channel_code,
            product_variant_code: row.product_variant_code,
            price: row.price,
            original_price: row.original_price,
            lowest_price_before_discount: row.lowest_price_before_discount,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewChannelPricing<'a> {
    pub channel_code: &'a str,
    pub product_variant_code: &'a str,
    pub price: i64,
    pub original_price: Option<i64>,
}

const SELECT_COLUMNS: &str = "SELECT id, channel_code, product_variant_code, price, original_price, \
            lowest_price_before_discount, created_at, updated_at \
     FROM channel_pricings";

/// Inserts a channel pricing and logs its initial price.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails, e.g. for an unknown channel
/// or a duplicate `(channel_code, product_variant_code)`.
pub async fn create_channel_pricing(
    pool: &PgPool,
    new: &NewChannelPricing<'_>,
) -> Result<ChannelPricingRow, DbError> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, ChannelPricingRow>(
        "INSERT INTO channel_pricings \
             (channel_code, product_variant_code, price, original_price) \
         VALUES ($1, $2, $3, $4) \
         RETURNING id, channel_code, product_variant_code, price, original_price, \
                   lowest_price_before_discount, created_at, updated_at",
    )
    .bind(new.channel_code)
    .bind(new.product_variant_code)
    .bind(new.price)
    .bind(new.original_price)
    .fetch_one(&mut *tx)
    .await?;

    insert_log_entry(&mut tx, row.id, row.price, row.original_price, row.created_at).await?;
    tx.commit().await?;

    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_channel_pricing(
    pool: &PgPool,
    id: i64,
) -> Result<Option<ChannelPricingRow>, DbError> {
    let row = sqlx::query_as::<_, ChannelPricingRow>(&format!("{SELECT_COLUMNS} WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Pricings with any of the given ids, ordered by id. Unknown ids are skipped.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_channel_pricings_by_ids(
    pool: &PgPool,
    ids: &[i64],
) -> Result<Vec<ChannelPricingRow>, DbError> {
    let rows = sqlx::query_as::<_, ChannelPricingRow>(&format!(
        "{SELECT_COLUMNS} WHERE id = ANY($1) ORDER BY id"
    ))
    .bind(ids)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Sets the price of a channel pricing, logging the change.
///
/// Returns `true` if a log entry was written, `false` if price and original
/// price were already equal to the given values.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] for an unknown id, or [`DbError::Sqlx`] if a
/// statement fails.
pub async fn set_channel_pricing_price(
    pool: &PgPool,
    id: i64,
    price: i64,
    original_price: Option<i64>,
) -> Result<bool, DbError> {
    let mut tx = pool.begin().await?;

    let current: (i64, Option<i64>) = sqlx::query_as::<_, (i64, Option<i64>)>(
        "SELECT price, original_price FROM channel_pricings WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(DbError::NotFound)?;

    if current == (price, original_price) {
        tx.commit().await?;
        return Ok(false);
    }

    sqlx::query(
        "UPDATE channel_pricings \
         SET price = $2, original_price = $3, updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(price)
    .bind(original_price)
    .execute(&mut *tx)
    .await?;

    insert_log_entry(&mut tx, id, price, original_price, Utc::now()).await?;
    tx.commit().await?;

    tracing::debug!(channel_pricing_id = id, price, "logged price change");
    Ok(true)
}

/// Writes the derived lowest price in a single statement.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] for an unknown id, or [`DbError::Sqlx`] if the
/// update fails.
pub async fn update_lowest_price_before_discount(
    pool: &PgPool,
    id: i64,
    lowest_price_before_discount: Option<i64>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE channel_pricings \
         SET lowest_price_before_discount = $2, updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(lowest_price_before_discount)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// [`ChannelPricingSource`] backed by the `channel_pricings` table.
#[derive(Debug, Clone)]
pub struct PgChannelPricingSource {
    pool: PgPool,
}

impl PgChannelPricingSource {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChannelPricingSource for PgChannelPricingSource {
    type Error = DbError;

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<ChannelPricing>, DbError> {
        let rows = find_channel_pricings_by_ids(&self.pool, ids).await?;
        Ok(rows.into_iter().map(ChannelPricing::from).collect())
    }
}
