//! Channel handlers.
//!
//! - `GET /api/v1/channels/{code}`: channel with its lowest-price settings
//! - `PUT /api/v1/channels/{code}`: update settings; a new checking period
//!   recomputes every pricing in the channel before the response is sent

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use pricehist_core::{diff_channel, excluded_taxon_iris, Channel, ChannelPayload};
use pricehist_db::PgTaxonResolver;
use serde::Serialize;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::api) struct ChannelItem {
    pub code: String,
    pub name: String,
    pub lowest_price_for_discounted_products_checking_period: u32,
    pub lowest_price_for_discounted_products_visible: bool,
    /// Taxon IRIs, in code order.
    pub taxons_excluded_from_showing_lowest_price: Vec<String>,
}

impl From<&Channel> for ChannelItem {
    fn from(channel: &Channel) -> Self {
        Self {
            code: channel.code.clone(),
            name: channel.name.clone(),
            lowest_price_for_discounted_products_checking_period: channel
                .lowest_price_checking_period
                .days(),
            lowest_price_for_discounted_products_visible: channel.lowest_price_visible,
            taxons_excluded_from_showing_lowest_price: excluded_taxon_iris(channel),
        }
    }
}

pub(super) async fn load_channel(
    pool: &sqlx::PgPool,
    code: &str,
    request_id: &str,
) -> Result<Channel, ApiError> {
    pricehist_db::get_channel(pool, code)
        .await
        .map_err(|e| map_db_error(request_id.to_owned(), &e))?
        .ok_or_else(|| {
            ApiError::new(
                request_id,
                "not_found",
                format!("channel '{code}' not found"),
            )
        })
}

pub(in crate::api) async fn get_channel(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(code): Path<String>,
) -> Result<Json<ApiResponse<ChannelItem>>, ApiError> {
    let channel = load_channel(&state.pool, &code, &req_id.0).await?;

    Ok(Json(ApiResponse {
        data: ChannelItem::from(&channel),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(in crate::api) async fn update_channel(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(code): Path<String>,
    Json(payload): Json<ChannelPayload>,
) -> Result<Json<ApiResponse<ChannelItem>>, ApiError> {
    let rid = &req_id.0;

    let before = load_channel(&state.pool, &code, rid).await?;
    let mut channel = before.clone();

    payload
        .apply_base(&mut channel)
        .map_err(|e| ApiError::new(rid, "validation_error", e.to_string()))?;
    payload
        .attach_excluded_taxons(&mut channel, &PgTaxonResolver::new(state.pool.clone()))
        .await
        .map_err(|e| map_db_error(rid.to_owned(), &e))?;

    pricehist_db::save_channel(&state.pool, &channel)
        .await
        .map_err(|e| map_db_error(rid.to_owned(), &e))?;

    let events = diff_channel(&before, &channel);
    state.dispatcher.dispatch(&events).await.map_err(|e| {
        tracing::error!(channel = %code, error = %e, "channel change listener failed");
        ApiError::new(
            rid,
            "internal_error",
            "channel saved but applying the change failed",
        )
    })?;

    tracing::info!(channel = %code, changes = events.len(), "channel updated");

    Ok(Json(ApiResponse {
        data: ChannelItem::from(&channel),
        meta: ResponseMeta::new(req_id.0.clone()),
    }))
}
