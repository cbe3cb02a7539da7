pub mod app_config;
pub mod channel_payload;
pub mod command;
pub mod config;
pub mod events;
pub mod lowest_price;
pub mod model;

use thiserror::Error;

pub use app_config::{AppConfig, Environment, MAX_LOG_RETENTION_DAYS};
pub use channel_payload::{
    excluded_taxon_iris, parse_taxon_iri, taxon_iri, ChannelPayload, TaxonResolver,
};
pub use command::{
    ApplyLowestPriceHandler, ApplyLowestPriceOnChannelPricings, ChannelPricingSource,
    LowestPriceProcessor,
};
pub use config::{load_app_config, load_app_config_from_env};
pub use events::{
    diff_channel, ChannelEvent, ChannelEventDispatcher, ChannelField, ChannelListener,
    ListenerError,
};
pub use lowest_price::{lowest_price_before_discount, PriceWindow};
pub use model::{
    Channel, ChannelPricing, CheckingPeriod, PriceLogEntry, MAX_CHECKING_PERIOD_DAYS,
};

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("checking period must be between 1 and {max} days, got {0}", max = model::MAX_CHECKING_PERIOD_DAYS)]
    InvalidCheckingPeriod(i64),
    #[error("invalid taxon reference: {0}")]
    InvalidTaxonIri(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
