//! Channel field-change notifications.
//!
//! A write path loads the channel, applies the update, commits, then hands
//! `diff_channel(&before, &after)` to a [`ChannelEventDispatcher`]. Listeners
//! declare which fields they observe and run synchronously, in registration
//! order.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Channel, CheckingPeriod};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelField {
    CheckingPeriod,
    Visibility,
    ExcludedTaxons,
}

/// A committed change to one channel field, with both values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    CheckingPeriodChanged {
        channel_code: String,
        old: CheckingPeriod,
        new: CheckingPeriod,
    },
    VisibilityChanged {
        channel_code: String,
        old: bool,
        new: bool,
    },
    ExcludedTaxonsChanged {
        channel_code: String,
        old: BTreeSet<String>,
        new: BTreeSet<String>,
    },
}

impl ChannelEvent {
    #[must_use]
    pub fn channel_code(&self) -> &str {
        match self {
            ChannelEvent::CheckingPeriodChanged { channel_code, .. }
            | ChannelEvent::VisibilityChanged { channel_code, .. }
            | ChannelEvent::ExcludedTaxonsChanged { channel_code, .. } => channel_code,
        }
    }

    #[must_use]
    pub fn field(&self) -> ChannelField {
        match self {
            ChannelEvent::CheckingPeriodChanged { .. } => ChannelField::CheckingPeriod,
            ChannelEvent::VisibilityChanged { .. } => ChannelField::Visibility,
            ChannelEvent::ExcludedTaxonsChanged { .. } => ChannelField::ExcludedTaxons,
        }
    }
}

/// Events for every observed field that differs between `old` and `new`.
#[must_use]
pub fn diff_channel(old: &Channel, new: &Channel) -> Vec<ChannelEvent> {
    let mut events = Vec::new();

    if old.lowest_price_checking_period != new.lowest_price_checking_period {
        events.push(ChannelEvent::CheckingPeriodChanged {
            channel_code: new.code.clone(),
            old: old.lowest_price_checking_period,
            new: new.lowest_price_checking_period,
        });
    }

    if old.lowest_price_visible != new.lowest_price_visible {
        events.push(ChannelEvent::VisibilityChanged {
            channel_code: new.code.clone(),
            old: old.lowest_price_visible,
            new: new.lowest_price_visible,
        });
    }

    if old.taxons_excluded_from_lowest_price != new.taxons_excluded_from_lowest_price {
        events.push(ChannelEvent::ExcludedTaxonsChanged {
            channel_code: new.code.clone(),
            old: old.taxons_excluded_from_lowest_price.clone(),
            new: new.taxons_excluded_from_lowest_price.clone(),
        });
    }

    events
}

#[derive(Debug, Error)]
#[error("channel listener `{listener}` failed: {source}")]
pub struct ListenerError {
    pub listener: &'static str,
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl ListenerError {
    pub fn new(
        listener: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            listener,
            source: source.into(),
        }
    }
}

#[async_trait]
pub trait ChannelListener: Send + Sync {
    fn name(&self) -> &'static str;

    fn observed_fields(&self) -> &'static [ChannelField];

    /// # Errors
    ///
    /// Returns [`ListenerError`] when the reaction to the change fails.
    async fn on_change(&self, event: &ChannelEvent) -> Result<(), ListenerError>;
}

#[derive(Clone, Default)]
pub struct ChannelEventDispatcher {
    listeners: Vec<Arc<dyn ChannelListener>>,
}

impl ChannelEventDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn ChannelListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn register(&mut self, listener: Arc<dyn ChannelListener>) {
        self.listeners.push(listener);
    }

    /// Deliver each event to the listeners observing its field.
    ///
    /// Stops at the first failing listener. Returns how many listener calls
    /// were made.
    ///
    /// # Errors
    ///
    /// Returns the first [`ListenerError`] raised.
    pub async fn dispatch(&self, events: &[ChannelEvent]) -> Result<usize, ListenerError> {
        let mut delivered = 0;
        for event in events {
            for listener in &self.listeners {
                if !listener.observed_fields().contains(&event.field()) {
                    continue;
                }
                tracing::debug!(
                    listener = listener.name(),
                    channel = event.channel_code(),
                    field = ?event.field(),
                    "dispatching channel change"
                );
                listener.on_change(event).await?;
                delivered += 1;
            }
        }
        Ok(delivered)
    }
}

impl std::fmt::Debug for ChannelEventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.listeners.iter().map(|l| l.name()).collect();
        f.debug_struct("ChannelEventDispatcher")
            .field("listeners", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Recorder {
        fields: &'static [ChannelField],
        seen: Mutex<Vec<ChannelEvent>>,
        fail: bool,
    }

    impl Recorder {
        fn new(fields: &'static [ChannelField]) -> Arc<Self> {
            Arc::new(Self {
                fields,
                seen: Mutex::new(Vec::new()),
                fail: false,
            })
        }

        fn failing(fields: &'static [ChannelField]) -> Arc<Self> {
            Arc::new(Self {
                fields,
                seen: Mutex::new(Vec::new()),
                fail: true,
            })
        }

        fn seen(&self) -> Vec<ChannelEvent> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChannelListener for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn observed_fields(&self) -> &'static [ChannelField] {
            self.fields
        }

        async fn on_change(&self, event: &ChannelEvent) -> Result<(), ListenerError> {
            self.seen.lock().unwrap().push(event.clone());
            if self.fail {
                return Err(ListenerError::new("recorder", "boom"));
            }
            Ok(())
        }
    }

    fn channel() -> Channel {
        Channel::new("WEB", "Web Store")
    }

    #[test]
    fn unchanged_channel_emits_nothing() {
        assert!(diff_channel(&channel(), &channel()).is_empty());
    }

    #[test]
    fn checking_period_change_carries_old_and_new() {
        let old = channel();
        let mut new = channel();
        new.lowest_price_checking_period = CheckingPeriod::new(15).unwrap();

        let events = diff_channel(&old, &new);
        assert_eq!(
            events,
            vec![ChannelEvent::CheckingPeriodChanged {
                channel_code: "WEB".to_string(),
                old: CheckingPeriod::new(30).unwrap(),
                new: CheckingPeriod::new(15).unwrap(),
            }]
        );
    }

    #[test]
    fn every_changed_field_is_reported() {
        let old = channel();
        let mut new = channel();
        new.lowest_price_checking_period = CheckingPeriod::new(7).unwrap();
        new.lowest_price_visible = false;
        new.add_taxon_excluded_from_lowest_price("caps");

        let fields: Vec<ChannelField> = diff_channel(&old, &new)
            .iter()
            .map(ChannelEvent::field)
            .collect();
        assert_eq!(
            fields,
            vec![
                ChannelField::CheckingPeriod,
                ChannelField::Visibility,
                ChannelField::ExcludedTaxons
            ]
        );
    }

    #[tokio::test]
    async fn dispatch_only_reaches_listeners_observing_the_field() {
        let period_listener = Recorder::new(&[ChannelField::CheckingPeriod]);
        let taxon_listener = Recorder::new(&[ChannelField::ExcludedTaxons]);
        let dispatcher = ChannelEventDispatcher::new()
            .with_listener(period_listener.clone())
            .with_listener(taxon_listener.clone());

        let mut new = channel();
        new.lowest_price_checking_period = CheckingPeriod::new(10).unwrap();
        let events = diff_channel(&channel(), &new);

        let delivered = dispatcher.dispatch(&events).await.expect("dispatch");
        assert_eq!(delivered, 1);
        assert_eq!(period_listener.seen(), events);
        assert!(taxon_listener.seen().is_empty());
    }

    #[tokio::test]
    async fn dispatch_with_no_events_calls_nobody() {
        let listener = Recorder::new(&[ChannelField::CheckingPeriod]);
        let mut dispatcher = ChannelEventDispatcher::new();
        dispatcher.register(listener.clone());

        assert_eq!(dispatcher.dispatch(&[]).await.expect("dispatch"), 0);
        assert!(listener.seen().is_empty());
    }

    #[tokio::test]
    async fn dispatch_stops_at_first_failure() {
        let failing = Recorder::failing(&[ChannelField::CheckingPeriod]);
        let after = Recorder::new(&[ChannelField::CheckingPeriod]);
        let dispatcher = ChannelEventDispatcher::new()
            .with_listener(failing.clone())
            .with_listener(after.clone());

        let mut new = channel();
        new.lowest_price_checking_period = CheckingPeriod::new(10).unwrap();
        let err = dispatcher
            .dispatch(&diff_channel(&channel(), &new))
            .await
            .expect_err("listener failure should propagate");

        assert_eq!(err.listener, "recorder");
        assert_eq!(failing.seen().len(), 1);
        assert!(after.seen().is_empty());
    }
}
