//! Domain types shared by the calculator, the store and the API.
//!
//! Prices are integer minor units (cents). Nothing here talks to storage.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Default checking period for new channels, in days.
pub const DEFAULT_CHECKING_PERIOD_DAYS: u32 = 30;

/// Longest accepted checking period, in days (one hundred years).
pub const MAX_CHECKING_PERIOD_DAYS: u32 = 36_500;

/// Trailing window, in whole days, used to pick the price before a discount.
///
/// Between one day and [`MAX_CHECKING_PERIOD_DAYS`]; anything outside that
/// range is rejected when the value enters the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct CheckingPeriod(u32);

impl CheckingPeriod {
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidCheckingPeriod`] if `days` is not positive
    /// or exceeds [`MAX_CHECKING_PERIOD_DAYS`].
    pub fn new(days: i64) -> Result<Self, CoreError> {
        match u32::try_from(days) {
            Ok(d) if (1..=MAX_CHECKING_PERIOD_DAYS).contains(&d) => Ok(Self(d)),
            _ => Err(CoreError::InvalidCheckingPeriod(days)),
        }
    }

    #[must_use]
    pub fn days(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn as_duration(self) -> Duration {
        Duration::days(i64::from(self.0))
    }
}

impl Default for CheckingPeriod {
    fn default() -> Self {
        Self(DEFAULT_CHECKING_PERIOD_DAYS)
    }
}

impl TryFrom<i64> for CheckingPeriod {
    type Error = CoreError;

    fn try_from(days: i64) -> Result<Self, Self::Error> {
        Self::new(days)
    }
}

impl From<CheckingPeriod> for i64 {
    fn from(period: CheckingPeriod) -> Self {
        i64::from(period.0)
    }
}

impl std::fmt::Display for CheckingPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} days", self.0)
    }
}

/// One observed price of a channel pricing. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLogEntry {
    pub id: i64,
    pub channel_pricing_id: i64,
    pub price: i64,
    pub original_price: Option<i64>,
    pub logged_at: DateTime<Utc>,
}

/// The price of one product variant in one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPricing {
    pub id: i64,
    pub channel_code: String,
    pub product_variant_code: String,
    pub price: i64,
    /// Regular price while a discount is running.
    pub original_price: Option<i64>,
    /// Derived from the price log; see [`ChannelPricing::apply_lowest_price_before_discount`].
    pub lowest_price_before_discount: Option<i64>,
}

impl ChannelPricing {
    /// A pricing is discounted when it has an original price above the current one.
    #[must_use]
    pub fn is_price_reduced(&self) -> bool {
        self.original_price
            .is_some_and(|original| self.price < original)
    }

    /// Stores `candidate` only while the pricing is discounted; otherwise clears it.
    pub fn apply_lowest_price_before_discount(&mut self, candidate: Option<i64>) {
        self.lowest_price_before_discount = if self.is_price_reduced() {
            candidate
        } else {
            None
        };
    }
}

/// A sales channel and its lowest-price display rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub code: String,
    pub name: String,
    pub lowest_price_checking_period: CheckingPeriod,
    pub lowest_price_visible: bool,
    /// Codes of taxons whose products never show the lowest price.
    pub taxons_excluded_from_lowest_price: BTreeSet<String>,
}

impl Channel {
    #[must_use]
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            lowest_price_checking_period: CheckingPeriod::default(),
            lowest_price_visible: true,
            taxons_excluded_from_lowest_price: BTreeSet::new(),
        }
    }

    pub fn add_taxon_excluded_from_lowest_price(&mut self, taxon_code: impl Into<String>) {
        self.taxons_excluded_from_lowest_price
            .insert(taxon_code.into());
    }

    pub fn remove_taxon_excluded_from_lowest_price(&mut self, taxon_code: &str) {
        self.taxons_excluded_from_lowest_price.remove(taxon_code);
    }

    #[must_use]
    pub fn has_taxon_excluded_from_lowest_price(&self, taxon_code: &str) -> bool {
        self.taxons_excluded_from_lowest_price.contains(taxon_code)
    }

    /// Whether a product classified under `taxon_codes` should display its
    /// lowest price before discount in this channel.
    #[must_use]
    pub fn shows_lowest_price_for<S: AsRef<str>>(&self, taxon_codes: &[S]) -> bool {
        self.lowest_price_visible
            && !taxon_codes
                .iter()
                .any(|code| self.has_taxon_excluded_from_lowest_price(code.as_ref()))
    }
}
