//! Decoding channel updates from the API.
//!
//! Decoding happens in two steps. [`ChannelPayload::apply_base`] sets the
//! scalar fields, then [`ChannelPayload::attach_excluded_taxons`] resolves the
//! taxon references and replaces the exclusion set. The set is never merged:
//! whatever the payload lists (possibly nothing) becomes the new set.

use async_trait::async_trait;
use serde::Deserialize;

use crate::model::{Channel, CheckingPeriod};
use crate::CoreError;

pub const TAXON_IRI_PREFIX: &str = "/api/v2/admin/taxons/";

#[must_use]
pub fn taxon_iri(code: &str) -> String {
    format!("{TAXON_IRI_PREFIX}{code}")
}

/// Extract the taxon code from an IRI such as `/api/v2/admin/taxons/mugs`.
///
/// # Errors
///
/// Returns [`CoreError::InvalidTaxonIri`] if the prefix is wrong or the code is
/// empty or contains a further path segment.
pub fn parse_taxon_iri(iri: &str) -> Result<&str, CoreError> {
    iri.strip_prefix(TAXON_IRI_PREFIX)
        .filter(|code| !code.is_empty() && !code.contains('/'))
        .ok_or_else(|| CoreError::InvalidTaxonIri(iri.to_string()))
}

/// Turns a taxon IRI into the code of an existing taxon.
#[async_trait]
pub trait TaxonResolver: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn resolve(&self, iri: &str) -> Result<String, Self::Error>;
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelPayload {
    pub name: Option<String>,
    pub lowest_price_for_discounted_products_checking_period: Option<i64>,
    pub lowest_price_for_discounted_products_visible: Option<bool>,
    #[serde(default)]
    pub taxons_excluded_from_showing_lowest_price: Vec<String>,
}

impl ChannelPayload {
    /// Apply everything except the excluded taxons.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidCheckingPeriod`] for a period outside
    /// `1..=MAX_CHECKING_PERIOD_DAYS`; `channel` is left unchanged in that case.
    pub fn apply_base(&self, channel: &mut Channel) -> Result<(), CoreError> {
        let period = self
            .lowest_price_for_discounted_products_checking_period
            .map(CheckingPeriod::new)
            .transpose()?;

        if let Some(name) = &self.name {
            channel.name.clone_from(name);
        }
        if let Some(period) = period {
            channel.lowest_price_checking_period = period;
        }
        if let Some(visible) = self.lowest_price_for_discounted_products_visible {
            channel.lowest_price_visible = visible;
        }
        Ok(())
    }

    /// Replace the channel's excluded taxons with the ones referenced here.
    ///
    /// All references are resolved before the channel is touched, so a bad
    /// reference leaves the previous set in place.
    ///
    /// # Errors
    ///
    /// Returns the resolver's error for the first reference it cannot resolve.
    pub async fn attach_excluded_taxons<R>(
        &self,
        channel: &mut Channel,
        resolver: &R,
    ) -> Result<(), R::Error>
    where
        R: TaxonResolver + ?Sized,
    {
        let mut codes = Vec::with_capacity(self.taxons_excluded_from_showing_lowest_price.len());
        for iri in &self.taxons_excluded_from_showing_lowest_price {
            codes.push(resolver.resolve(iri).await?);
        }

        channel.taxons_excluded_from_lowest_price.clear();
        for code in codes {
            channel.add_taxon_excluded_from_lowest_price(code);
        }
        Ok(())
    }
}

/// Excluded taxons of `channel` as IRIs, in code order.
#[must_use]
pub fn excluded_taxon_iris(channel: &Channel) -> Vec<String> {
    channel
        .taxons_excluded_from_lowest_price
        .iter()
        .map(|code| taxon_iri(code))
        .collect()
}
