//! Database operations for `channels` and `channel_excluded_taxons`.

use chrono::{DateTime, Utc};
use pricehist_core::{Channel, CheckingPeriod, CoreError};
use sqlx::{PgConnection, PgPool};

use crate::DbError;

/// A row from the `channels` table. Excluded taxons live in their own table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChannelRow {
    pub id: i64,
    pub code: String,
    pub name: String,
    /// Days; the schema enforces `1..=36500`.
    pub lowest_price_checking_period: i32,
    pub lowest_price_visible: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChannelRow {
    /// # Errors
    ///
    /// Returns [`DbError::Core`] if the stored period is not positive.
    pub fn checking_period(&self) -> Result<CheckingPeriod, DbError> {
        Ok(CheckingPeriod::new(i64::from(
            self.lowest_price_checking_period,
        ))?)
    }
}

/// Inserts a channel together with its excluded taxons.
///
/// Returns the new channel's `id`.
///
/// # Errors
///
/// Returns [`DbError::TaxonNotFound`] if an excluded taxon code does not
/// exist, or [`DbError::Sqlx`] if a statement fails. Nothing is written on error.
pub async fn create_channel(pool: &PgPool, channel: &Channel) -> Result<i64, DbError> {
    let mut tx = pool.begin().await?;

    let id: i64 = sqlx::query_scalar::<_, i64>(
        "INSERT INTO channels (code, name, lowest_price_checking_period, lowest_price_visible) \
         VALUES ($1, $2, $3, $4) \
         RETURNING id",
    )
    .bind(&channel.code)
    .bind(&channel.name)
    .bind(period_to_db(channel.lowest_price_checking_period)?)
    .bind(channel.lowest_price_visible)
    .fetch_one(&mut *tx)
    .await?;

    replace_excluded_taxons(&mut tx, id, channel).await?;
    tx.commit().await?;

    Ok(id)
}

/// Loads a channel and its excluded taxon codes.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if a query fails.
pub async fn get_channel(pool: &PgPool, code: &str) -> Result<Option<Channel>, DbError> {
    let Some(row) = sqlx::query_as::<_, ChannelRow>(
        "SELECT id, code, name, lowest_price_checking_period, lowest_price_visible, \
                created_at, updated_at \
         FROM channels \
         WHERE code = $1",
    )
    .bind(code)
    .fetch_optional(pool)
    .await?
    else {
        return Ok(None);
    };

    let excluded: Vec<String> = sqlx::query_scalar::<_, String>(
        "SELECT t.code \
         FROM channel_excluded_taxons cet \
         JOIN taxons t ON t.id = cet.taxon_id \
         WHERE cet.channel_id = $1 \
         ORDER BY t.code",
    )
    .bind(row.id)
    .fetch_all(pool)
    .await?;

    Ok(Some(Channel {
        lowest_price_checking_period: row.checking_period()?,
        code: row.code,
        name: row.name,
        lowest_price_visible: row.lowest_price_visible,
        taxons_excluded_from_lowest_price: excluded.into_iter().collect(),
    }))
}

/// Reads only the checking period of a channel.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_channel_checking_period(
    pool: &PgPool,
    code: &str,
) -> Result<Option<CheckingPeriod>, DbError> {
    let days: Option<i32> = sqlx::query_scalar::<_, i32>(
        "SELECT lowest_price_checking_period FROM channels WHERE code = $1",
    )
    .bind(code)
    .fetch_optional(pool)
    .await?;

    days.map(|d| CheckingPeriod::new(i64::from(d)).map_err(DbError::from))
        .transpose()
}

/// Persists every field of an existing channel, replacing its excluded taxons.
///
/// # Errors
///
/// Returns [`DbError::ChannelNotFound`] if no channel has `channel.code`,
/// [`DbError::TaxonNotFound`] for an unknown excluded taxon, or
/// [`DbError::Sqlx`] if a statement fails. Nothing is written on error.
pub async fn save_channel(pool: &PgPool, channel: &Channel) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    let id: i64 = sqlx::query_scalar::<_, i64>(
        "UPDATE channels SET \
             name                         = $2, \
             lowest_price_checking_period = $3, \
             lowest_price_visible         = $4, \
             updated_at                   = NOW() \
         WHERE code = $1 \
         RETURNING id",
    )
    .bind(&channel.code)
    .bind(&channel.name)
    .bind(period_to_db(channel.lowest_price_checking_period)?)
    .bind(channel.lowest_price_visible)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| DbError::ChannelNotFound(channel.code.clone()))?;

    replace_excluded_taxons(&mut tx, id, channel).await?;
    tx.commit().await?;

    Ok(())
}

async fn replace_excluded_taxons(
    conn: &mut PgConnection,
    channel_id: i64,
    channel: &Channel,
) -> Result<(), DbError> {
    let codes: Vec<&str> = channel
        .taxons_excluded_from_lowest_price
        .iter()
        .map(String::as_str)
        .collect();

    let missing: Option<String> = sqlx::query_scalar::<_, String>(
        "SELECT c.code FROM UNNEST($1::text[]) AS c(code) \
         WHERE NOT EXISTS (SELECT 1 FROM taxons t WHERE t.code = c.code) \
         ORDER BY c.code \
         LIMIT 1",
    )
    .bind(&codes)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(code) = missing {
        return Err(DbError::TaxonNotFound(code));
    }

    sqlx::query("DELETE FROM channel_excluded_taxons WHERE channel_id = $1")
        .bind(channel_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        "INSERT INTO channel_excluded_taxons (channel_id, taxon_id) \
         SELECT $1, t.id FROM taxons t WHERE t.code = ANY($2::text[])",
    )
    .bind(channel_id)
    .bind(&codes)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

fn period_to_db(period: CheckingPeriod) -> Result<i32, DbError> {
    i32::try_from(period.days())
        .map_err(|_| DbError::Core(CoreError::InvalidCheckingPeriod(i64::from(period))))
}
