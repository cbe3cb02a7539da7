//! Price maintenance command handlers.
//!
//! Called from `main` once the pool is connected. `recompute` and `apply`
//! write derived values; `purge` deletes old history; `history` only reads.

use chrono::{DateTime, Duration, Utc};
use pricehist_core::{ApplyLowestPriceHandler, ApplyLowestPriceOnChannelPricings};
use pricehist_db::{PgChannelPricingSource, PgLowestPriceProcessor};
use sqlx::PgPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PurgeOptions {
    pub retention_days: u32,
    pub batch_size: i64,
    pub dry_run: bool,
}

impl PurgeOptions {
    pub(crate) fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(Duration::days(i64::from(self.retention_days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Recompute every pricing in `channel_code` with the channel's stored period.
///
/// # Errors
///
/// Returns an error if the channel does not exist or a query fails.
pub(crate) async fn run_recompute(pool: &PgPool, channel_code: &str) -> anyhow::Result<()> {
    let period = pricehist_db::get_channel_checking_period(pool, channel_code)
        .await?
        .ok_or_else(|| anyhow::anyhow!("channel '{channel_code}' not found"))?;

    let summary =
        pricehist_db::bulk_update_lowest_prices_before_discount(pool, channel_code, period)
            .await?;

    println!(
        "channel {channel_code}: {} pricing(s) checked over {period}, {} updated",
        summary.pricings, summary.changed
    );
    Ok(())
}

/// # Errors
///
/// Returns an error if loading or updating a pricing fails.
pub(crate) async fn run_apply(pool: &PgPool, ids: Vec<i64>) -> anyhow::Result<()> {
    let command = ApplyLowestPriceOnChannelPricings::new(ids);
    let handler = ApplyLowestPriceHandler::new(
        PgChannelPricingSource::new(pool.clone()),
        PgLowestPriceProcessor::new(pool.clone()),
    );

    let processed = handler.handle(&command).await?;
    let missing = command.channel_pricing_ids().len().saturating_sub(processed);

    println!("processed {processed} channel pricing(s)");
    if missing > 0 {
        println!("{missing} id(s) not found");
    }
    Ok(())
}

/// # Errors
///
/// Returns an error if the batch size is not positive or a query fails.
pub(crate) async fn run_purge(pool: &PgPool, options: &PurgeOptions) -> anyhow::Result<()> {
    let cutoff = options.cutoff(Utc::now());

    if options.dry_run {
        let expired = pricehist_db::count_older_than(pool, cutoff).await?;
        println!(
            "dry run: {expired} log entr{} before {} would be deleted",
            if expired == 1 { "y" } else { "ies" },
            cutoff.format("%Y-%m-%d %H:%M")
        );
        return Ok(());
    }

    let deleted = pricehist_db::delete_older_than(pool, cutoff, options.batch_size).await?;
    tracing::info!(deleted, cutoff = %cutoff, "purged price log");
    println!("deleted {deleted} log entries before {}", cutoff.format("%Y-%m-%d %H:%M"));
    Ok(())
}

/// # Errors
///
/// Returns an error if the pricing does not exist or a query fails.
pub(crate) async fn run_history(pool: &PgPool, id: i64) -> anyhow::Result<()> {
    let pricing = pricehist_db::get_channel_pricing(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("channel pricing {id} not found"))?;
    let entries = pricehist_db::find_by_channel_pricing_id_desc(pool, id).await?;

    println!(
        "{} / {}: price {}, lowest before discount {}",
        pricing.channel_code,
        pricing.product_variant_code,
        pricing.price,
        fmt_price(pricing.lowest_price_before_discount)
    );

    if entries.is_empty() {
        println!("no price history");
        return Ok(());
    }

    println!("{:<10}{:<20}{:<12}ORIGINAL", "ID", "LOGGED AT", "PRICE");
    for entry in &entries {
        println!(
            "{:<10}{:<20}{:<12}{}",
            entry.id,
            entry.logged_at.format("%Y-%m-%d %H:%M"),
            entry.price,
            fmt_price(entry.original_price)
        );
    }
    Ok(())
}

/// Format an optional price for display, returning `"\u{2014}"` when `None`.
fn fmt_price(price: Option<i64>) -> String {
    price.map_or_else(|| "\u{2014}".to_string(), |p| p.to_string())
}
