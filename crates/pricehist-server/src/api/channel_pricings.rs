//! Channel pricing handlers.
//!
//! - `GET  /api/v1/channel-pricings/{id}?taxons=a,b`: pricing plus display flag
//! - `PUT  /api/v1/channel-pricings/{id}/price`: set the price, log it and reapply
//! - `GET  /api/v1/channel-pricings/{id}/log-entries`: price history, newest first
//! - `POST /api/v1/channel-pricings/apply-lowest-price`: reapply for a set of ids

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use pricehist_core::{ApplyLowestPriceHandler, ApplyLowestPriceOnChannelPricings, ChannelPricing};
use pricehist_db::{LogEntryRow, PgChannelPricingSource, PgLowestPriceProcessor};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::middleware::RequestId;

use super::{channels::load_channel, map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

// ---------------------------------------------------------------------------
// Request and response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(in crate::api) struct PricingQuery {
    /// Comma-separated taxon codes the product is classified under.
    pub taxons: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::api) struct SetPriceRequest {
    pub price: i64,
    pub original_price: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(in crate::api) struct ApplyLowestPriceRequest {
    pub ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::api) struct ChannelPricingItem {
    pub id: i64,
    pub channel_code: String,
    pub product_variant_code: String,
    pub price: i64,
    pub original_price: Option<i64>,
    pub lowest_price_before_discount: Option<i64>,
    /// Whether the storefront should display `lowest_price_before_discount`.
    pub lowest_price_shown: bool,
}

impl ChannelPricingItem {
    fn new(pricing: ChannelPricing, shown_by_channel: bool) -> Self {
        Self {
            lowest_price_shown: shown_by_channel && pricing.lowest_price_before_discount.is_some(),
            id: pricing.id,
            channel_code: pricing.channel_code,
            product_variant_code: pricing.product_variant_code,
            price: pricing.price,
            original_price: pricing.original_price,
            lowest_price_before_discount: pricing.lowest_price_before_discount,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::api) struct SetPriceResponse {
    pub price_logged: bool,
    pub pricing: ChannelPricingItem,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::api) struct LogEntryItem {
    pub id: i64,
    pub price: i64,
    pub original_price: Option<i64>,
    pub logged_at: DateTime<Utc>,
}

impl From<LogEntryRow> for LogEntryItem {
    fn from(row: LogEntryRow) -> Self {
        Self {
            id: row.id,
            price: row.price,
            original_price: row.original_price,
            logged_at: row.logged_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct ApplyLowestPriceResponse {
    pub requested: usize,
    pub processed: usize,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

type PgApplyHandler = ApplyLowestPriceHandler<PgChannelPricingSource, PgLowestPriceProcessor>;

fn apply_handler(pool: &PgPool) -> PgApplyHandler {
    ApplyLowestPriceHandler::new(
        PgChannelPricingSource::new(pool.clone()),
        PgLowestPriceProcessor::new(pool.clone()),
    )
}

async fn load_pricing(pool: &PgPool, id: i64, request_id: &str) -> Result<ChannelPricing, ApiError> {
    pricehist_db::get_channel_pricing(pool, id)
        .await
        .map_err(|e| map_db_error(request_id.to_owned(), &e))?
        .map(ChannelPricing::from)
        .ok_or_else(|| {
            ApiError::new(
                request_id,
                "not_found",
                format!("channel pricing {id} not found"),
            )
        })
}

fn parse_taxon_codes(raw: Option<&str>) -> Vec<&str> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub(in crate::api) async fn get_channel_pricing(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Query(query): Query<PricingQuery>,
) -> Result<Json<ApiResponse<ChannelPricingItem>>, ApiError> {
    let rid = &req_id.0;
    let pricing = load_pricing(&state.pool, id, rid).await?;
    let channel = load_channel(&state.pool, &pricing.channel_code, rid).await?;

    let taxons = parse_taxon_codes(query.taxons.as_deref());
    let shown = channel.shows_lowest_price_for(&taxons);

    Ok(Json(ApiResponse {
        data: ChannelPricingItem::new(pricing, shown),
        meta: ResponseMeta::new(req_id.0.clone()),
    }))
}

pub(in crate::api) async fn set_price(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Json(body): Json<SetPriceRequest>,
) -> Result<Json<ApiResponse<SetPriceResponse>>, ApiError> {
    let rid = &req_id.0;

    if body.price < 0 || body.original_price.is_some_and(|p| p < 0) {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "prices must not be negative",
        ));
    }

    let price_logged =
        pricehist_db::set_channel_pricing_price(&state.pool, id, body.price, body.original_price)
            .await
            .map_err(|e| map_db_error(rid.to_owned(), &e))?;

    apply_handler(&state.pool)
        .handle(&ApplyLowestPriceOnChannelPricings::new([id]))
        .await
        .map_err(|e| map_db_error(rid.to_owned(), &e))?;

    let pricing = load_pricing(&state.pool, id, rid).await?;
    let channel = load_channel(&state.pool, &pricing.channel_code, rid).await?;
    let shown = channel.lowest_price_visible;

    Ok(Json(ApiResponse {
        data: SetPriceResponse {
            price_logged,
            pricing: ChannelPricingItem::new(pricing, shown),
        },
        meta: ResponseMeta::new(req_id.0.clone()),
    }))
}

pub(in crate::api) async fn list_log_entries(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<LogEntryItem>>>, ApiError> {
    let rid = &req_id.0;
    load_pricing(&state.pool, id, rid).await?;

    let entries = pricehist_db::find_by_channel_pricing_id_desc(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.to_owned(), &e))?;

    Ok(Json(ApiResponse {
        data: entries.into_iter().map(LogEntryItem::from).collect(),
        meta: ResponseMeta::new(req_id.0.clone()),
    }))
}

pub(in crate::api) async fn apply_lowest_price(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<ApplyLowestPriceRequest>,
) -> Result<Json<ApiResponse<ApplyLowestPriceResponse>>, ApiError> {
    let rid = &req_id.0;
    let command = ApplyLowestPriceOnChannelPricings::new(body.ids);

    let processed = apply_handler(&state.pool)
        .handle(&command)
        .await
        .map_err(|e| map_db_error(rid.to_owned(), &e))?;

    Ok(Json(ApiResponse {
        data: ApplyLowestPriceResponse {
            requested: command.channel_pricing_ids().len(),
            processed,
        },
        meta: ResponseMeta::new(req_id.0.clone()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_taxon_codes_splits_and_trims() {
        assert_eq!(parse_taxon_codes(Some("mugs, caps,,")), vec!["mugs", "caps"]);
        assert!(parse_taxon_codes(Some("")).is_empty());
        assert!(parse_taxon_codes(None).is_empty());
    }

    #[test]
    fn lowest_price_is_hidden_without_a_value() {
        let pricing = ChannelPricing {
            id: 1,
            channel_code: "WEB".to_string(),
            product_variant_code: "MUG".to_string(),
            price: 1000,
            original_price: None,
            lowest_price_before_discount: None,
        };

        let item = ChannelPricingItem::new(pricing, true);
        assert!(!item.lowest_price_shown);
    }

    #[test]
    fn channel_pricing_item_uses_camel_case() {
        let pricing = ChannelPricing {
            id: 1,
            channel_code: "WEB".to_string(),
            product_variant_code: "MUG".to_string(),
            price: 800,
            original_price: Some(1000),
            lowest_price_before_discount: Some(900),
        };

        let json = serde_json::to_value(ChannelPricingItem::new(pricing, true)).expect("json");
        assert_eq!(json["lowestPriceBeforeDiscount"], 900);
        assert_eq!(json["lowestPriceShown"], true);
        assert_eq!(json["channelCode"], "WEB");
    }
}
