//! Persisting the lowest price before discount.
//!
//! Both entry points load log entries and hand them to
//! [`pricehist_core::lowest_price_before_discount`]; the window logic lives
//! only there.

use std::collections::HashMap;

use async_trait::async_trait;
use pricehist_core::{
    lowest_price_before_discount, ChannelEvent, ChannelField, ChannelListener, ChannelPricing,
    CheckingPeriod, ListenerError, LowestPriceProcessor, PriceLogEntry,
};
use sqlx::PgPool;

use crate::{
    channel_pricings::{update_lowest_price_before_discount, ChannelPricingRow},
    channels::get_channel_checking_period,
    log_entries::{find_by_channel_pricing_id_desc, LogEntryRow},
    DbError,
};

/// Outcome of a channel-wide recompute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BulkRecomputeSummary {
    /// Pricings examined.
    pub pricings: usize,
    /// Pricings whose stored value actually changed.
    pub changed: u64,
}

/// Lowest price before discount for one channel pricing, ignoring whether it
/// is currently discounted. `None` when there is no usable history.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_lowest_price_before_discount(
    pool: &PgPool,
    channel_pricing_id: i64,
    period: CheckingPeriod,
) -> Result<Option<i64>, DbError> {
    let entries: Vec<PriceLogEntry> = find_by_channel_pricing_id_desc(pool, channel_pricing_id)
        .await?
        .into_iter()
        .map(PriceLogEntry::from)
        .collect();

    Ok(lowest_price_before_discount(&entries, period))
}

/// Recomputes `lowest_price_before_discount` for every pricing in a channel.
///
/// Runs in one transaction: the channel's pricing rows are locked, the new
/// values computed, and all of them written by a single `UPDATE`, so readers
/// see either the old or the new state of the whole channel.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; nothing is written then.
pub async fn bulk_update_lowest_prices_before_discount(
    pool: &PgPool,
    channel_code: &str,
    period: CheckingPeriod,
) -> Result<BulkRecomputeSummary, DbError> {
    let mut tx = pool.begin().await?;

    let pricings: Vec<ChannelPricing> = sqlx::query_as::<_, ChannelPricingRow>(
        "SELECT id, channel_code, product_variant_code, price, original_price, \
                lowest_price_before_discount, created_at, updated_at \
         FROM channel_pricings \
         WHERE channel_code = $1 \
         ORDER BY id \
         FOR UPDATE",
    )
    .bind(channel_code)
    .fetch_all(&mut *tx)
    .await?
    .into_iter()
    .map(ChannelPricing::from)
    .collect();

    if pricings.is_empty() {
        tx.commit().await?;
        return Ok(BulkRecomputeSummary::default());
    }

    let ids: Vec<i64> = pricings.iter().map(|p| p.id).collect();
    let entries = sqlx::query_as::<_, LogEntryRow>(
        "SELECT id, channel_pricing_id, price, original_price, logged_at \
         FROM channel_pricing_log_entries \
         WHERE channel_pricing_id = ANY($1) \
         ORDER BY channel_pricing_id, id",
    )
    .bind(&ids)
    .fetch_all(&mut *tx)
    .await?;

    let mut by_pricing: HashMap<i64, Vec<PriceLogEntry>> = HashMap::new();
    for row in entries {
        by_pricing
            .entry(row.channel_pricing_id)
            .or_default()
            .push(row.into());
    }

    let mut lowest_prices: Vec<Option<i64>> = Vec::with_capacity(pricings.len());
    for mut pricing in pricings {
        let log = by_pricing.get(&pricing.id).map_or(&[][..], Vec::as_slice);
        pricing.apply_lowest_price_before_discount(lowest_price_before_discount(log, period));
        lowest_prices.push(pricing.lowest_price_before_discount);
    }

    let changed = sqlx::query(
        "UPDATE channel_pricings AS cp \
         SET lowest_price_before_discount = v.lowest_price, updated_at = NOW() \
         FROM UNNEST($1::bigint[], $2::bigint[]) AS v(id, lowest_price) \
         WHERE cp.id = v.id \
           AND cp.lowest_price_before_discount IS DISTINCT FROM v.lowest_price",
    )
    .bind(&ids)
    .bind(&lowest_prices)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    tx.commit().await?;

    tracing::info!(
        channel = channel_code,
        period = %period,
        pricings = ids.len(),
        changed,
        "recomputed lowest prices before discount"
    );

    Ok(BulkRecomputeSummary {
        pricings: ids.len(),
        changed,
    })
}

/// Recomputes one pricing using its channel's checking period.
#[derive(Debug, Clone)]
pub struct PgLowestPriceProcessor {
    pool: PgPool,
}

impl PgLowestPriceProcessor {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LowestPriceProcessor for PgLowestPriceProcessor {
    type Error = DbError;

    async fn process(&self, channel_pricing: &mut ChannelPricing) -> Result<(), DbError> {
        let candidate = if channel_pricing.is_price_reduced() {
            let period = get_channel_checking_period(&self.pool, &channel_pricing.channel_code)
                .await?
                .ok_or_else(|| DbError::ChannelNotFound(channel_pricing.channel_code.clone()))?;
            find_lowest_price_before_discount(&self.pool, channel_pricing.id, period).await?
        } else {
            None
        };

        channel_pricing.apply_lowest_price_before_discount(candidate);
        update_lowest_price_before_discount(
            &self.pool,
            channel_pricing.id,
            channel_pricing.lowest_price_before_discount,
        )
        .await
    }
}

/// Runs the channel-wide recompute when a checking period changes.
#[derive(Debug, Clone)]
pub struct RecomputeOnCheckingPeriodChange {
    pool: PgPool,
}

impl RecomputeOnCheckingPeriodChange {
    const NAME: &'static str = "recompute_on_checking_period_change";

    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChannelListener for RecomputeOnCheckingPeriodChange {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn observed_fields(&self) -> &'static [ChannelField] {
        &[ChannelField::CheckingPeriod]
    }

    async fn on_change(&self, event: &ChannelEvent) -> Result<(), ListenerError> {
        let ChannelEvent::CheckingPeriodChanged {
            channel_code, new, ..
        } = event
        else {
            return Ok(());
        };

        bulk_update_lowest_prices_before_discount(&self.pool, channel_code, *new)
            .await
            .map(|_| ())
            .map_err(|e| ListenerError::new(Self::NAME, e))
    }
}
