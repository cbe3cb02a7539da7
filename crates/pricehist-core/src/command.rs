//! Applying the lowest price before discount after prices change.

use async_trait::async_trait;

use crate::model::ChannelPricing;

/// Recompute the lowest price before discount for the given channel pricings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyLowestPriceOnChannelPricings {
    channel_pricing_ids: Vec<i64>,
}

impl ApplyLowestPriceOnChannelPricings {
    /// Duplicate ids are dropped, keeping the first occurrence.
    #[must_use]
    pub fn new(ids: impl IntoIterator<Item = i64>) -> Self {
        let mut channel_pricing_ids: Vec<i64> = Vec::new();
        for id in ids {
            if !channel_pricing_ids.contains(&id) {
                channel_pricing_ids.push(id);
            }
        }
        Self {
            channel_pricing_ids,
        }
    }

    #[must_use]
    pub fn channel_pricing_ids(&self) -> &[i64] {
        &self.channel_pricing_ids
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channel_pricing_ids.is_empty()
    }
}

#[async_trait]
pub trait ChannelPricingSource: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the pricings with the given ids; unknown ids are skipped.
    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<ChannelPricing>, Self::Error>;
}

#[async_trait]
pub trait LowestPriceProcessor: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Recompute and persist `lowest_price_before_discount` for one pricing.
    async fn process(&self, channel_pricing: &mut ChannelPricing) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone)]
pub struct ApplyLowestPriceHandler<S, P> {
    source: S,
    processor: P,
}

impl<S, P, E> ApplyLowestPriceHandler<S, P>
where
    S: ChannelPricingSource<Error = E>,
    P: LowestPriceProcessor<Error = E>,
    E: std::error::Error + Send + Sync + 'static,
{
    pub fn new(source: S, processor: P) -> Self {
        Self { source, processor }
    }

    /// Runs the processor once per pricing found. Returns how many were processed.
    ///
    /// # Errors
    ///
    /// Propagates the first loading or processing error.
    pub async fn handle(&self, command: &ApplyLowestPriceOnChannelPricings) -> Result<usize, E> {
        if command.is_empty() {
            return Ok(0);
        }

        let mut pricings = self
            .source
            .find_by_ids(command.channel_pricing_ids())
            .await?;

        for pricing in &mut pricings {
            self.processor.process(pricing).await?;
        }

        tracing::debug!(
            requested = command.channel_pricing_ids().len(),
            processed = pricings.len(),
            "applied lowest price before discount"
        );
        Ok(pricings.len())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("fake failure")]
    struct FakeError;

    #[derive(Default)]
    struct FakeSource {
        lookups: Mutex<Vec<Vec<i64>>>,
    }

    #[async_trait]
    impl ChannelPricingSource for FakeSource {
        type Error = FakeError;

        async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<ChannelPricing>, FakeError> {
            self.lookups.lock().unwrap().push(ids.to_vec());
            Ok(ids
                .iter()
                .map(|&id| ChannelPricing {
                    id,
                    channel_code: "WEB".to_string(),
                    product_variant_code: format!("VARIANT_{id}"),
                    price: 900,
                    original_price: Some(1000),
                    lowest_price_before_discount: None,
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct FakeProcessor {
        processed: Mutex<Vec<i64>>,
        fail_on: Option<i64>,
    }

    #[async_trait]
    impl LowestPriceProcessor for FakeProcessor {
        type Error = FakeError;

        async fn process(&self, channel_pricing: &mut ChannelPricing) -> Result<(), FakeError> {
            if self.fail_on == Some(channel_pricing.id) {
                return Err(FakeError);
            }
            self.processed.lock().unwrap().push(channel_pricing.id);
            Ok(())
        }
    }

    #[test]
    fn command_deduplicates_ids_in_first_seen_order() {
        let command = ApplyLowestPriceOnChannelPricings::new([4, 1, 4, 3, 1]);
        assert_eq!(command.channel_pricing_ids(), &[4, 1, 3]);
    }

    #[tokio::test]
    async fn processes_every_given_channel_pricing() {
        let handler = ApplyLowestPriceHandler::new(FakeSource::default(), FakeProcessor::default());

        let processed = handler
            .handle(&ApplyLowestPriceOnChannelPricings::new([1, 3, 4]))
            .await
            .expect("handle");

        assert_eq!(processed, 3);
        let mut seen = handler.processor.processed.lock().unwrap().clone();
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 3, 4]);
    }

    #[tokio::test]
    async fn empty_command_touches_nothing() {
        let handler = ApplyLowestPriceHandler::new(FakeSource::default(), FakeProcessor::default());

        let processed = handler
            .handle(&ApplyLowestPriceOnChannelPricings::new([]))
            .await
            .expect("handle");

        assert_eq!(processed, 0);
        assert!(handler.processor.processed.lock().unwrap().is_empty());
        assert!(handler.source.lookups.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_ids_are_processed_once() {
        let handler = ApplyLowestPriceHandler::new(FakeSource::default(), FakeProcessor::default());

        handler
            .handle(&ApplyLowestPriceOnChannelPricings::new([2, 2, 2]))
            .await
            .expect("handle");

        assert_eq!(*handler.processor.processed.lock().unwrap(), vec![2]);
        assert_eq!(*handler.source.lookups.lock().unwrap(), vec![vec![2]]);
    }

    #[tokio::test]
    async fn processor_failure_is_propagated() {
        let processor = FakeProcessor {
            fail_on: Some(3),
            ..FakeProcessor::default()
        };
        let handler = ApplyLowestPriceHandler::new(FakeSource::default(), processor);

        let result = handler
            .handle(&ApplyLowestPriceOnChannelPricings::new([1, 3, 4]))
            .await;

        assert!(result.is_err());
        assert_eq!(*handler.processor.processed.lock().unwrap(), vec![1]);
    }
}
