//! Lowest price before discount.
//!
//! The figure shown next to a discounted price is the lowest price the item
//! had during the checking period that ends at the most recent price change.
//! The most recent entry is the current price and never counts. When nothing
//! else was logged inside the window, the price that stood when the window
//! opened (the latest entry before it) is used instead, so a price that was
//! constant for longer than the period still qualifies.
//!
//! Both the single-record lookup and the channel-wide recompute go through
//! [`lowest_price_before_discount`].

use chrono::{DateTime, Utc};

use crate::model::{CheckingPeriod, PriceLogEntry};

/// The two candidates the lowest price is chosen from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceWindow {
    pub window_start: DateTime<Utc>,
    /// Minimum price logged at or after `window_start`, excluding the latest entry.
    pub lowest_set_in_period: Option<i64>,
    /// Price of the latest entry logged before `window_start`.
    pub latest_set_beyond_period: Option<i64>,
}

impl PriceWindow {
    /// Collect both candidates from `entries`, which may be in any order.
    ///
    /// Returns `None` when there is no history at all.
    #[must_use]
    pub fn from_entries(entries: &[PriceLogEntry], period: CheckingPeriod) -> Option<Self> {
        let latest = entries.iter().max_by_key(|e| e.id)?;
        // A window reaching past the earliest representable instant holds everything.
        let window_start = latest
            .logged_at
            .checked_sub_signed(period.as_duration())
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let lowest_set_in_period = entries
            .iter()
            .filter(|e| e.id != latest.id && e.logged_at >= window_start)
            .map(|e| e.price)
            .min();

        let latest_set_beyond_period = entries
            .iter()
            .filter(|e| e.logged_at < window_start)
            .max_by_key(|e| e.id)
            .map(|e| e.price);

        Some(Self {
            window_start,
            lowest_set_in_period,
            latest_set_beyond_period,
        })
    }

    #[must_use]
    pub fn lowest(&self) -> Option<i64> {
        match (self.lowest_set_in_period, self.latest_set_beyond_period) {
            (Some(in_period), Some(beyond)) => Some(in_period.min(beyond)),
            (in_period, beyond) => in_period.or(beyond),
        }
    }
}

/// Lowest price before discount for one channel pricing's log.
///
/// `None` means there is nothing to show: no history, or only the current price.
#[must_use]
pub fn lowest_price_before_discount(
    entries: &[PriceLogEntry],
    period: CheckingPeriod,
) -> Option<i64> {
    PriceWindow::from_entries(entries, period).and_then(|w| w.lowest())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    /// Entries are given oldest first; ids follow insertion order.
    fn log(prices_and_days_ago: &[(i64, i64)]) -> Vec<PriceLogEntry> {
        prices_and_days_ago
            .iter()
            .zip(1_i64..)
            .map(|(&(price, days_ago), id)| PriceLogEntry {
                id,
                channel_pricing_id: 7,
                price,
                original_price: None,
                logged_at: now() - Duration::days(days_ago),
            })
            .collect()
    }

    fn period(days: i64) -> CheckingPeriod {
        CheckingPeriod::new(days).unwrap()
    }

    #[test]
    fn no_history_has_no_lowest_price() {
        assert_eq!(lowest_price_before_discount(&[], period(30)), None);
    }

    #[test]
    fn only_current_price_has_no_lowest_price() {
        assert_eq!(lowest_price_before_discount(&log(&[(900, 0)]), period(30)), None);
    }

    #[test]
    fn minimum_in_window_excludes_current_price() {
        let entries = log(&[(1200, 10), (1000, 5), (500, 0)]);
        assert_eq!(lowest_price_before_discount(&entries, period(30)), Some(1000));
    }

    #[test]
    fn falls_back_to_price_standing_before_window() {
        let entries = log(&[(1500, 60), (900, 0)]);
        assert_eq!(lowest_price_before_discount(&entries, period(30)), Some(1500));
    }

    #[test]
    fn fallback_uses_latest_entry_before_window_not_lowest() {
        let entries = log(&[(400, 90), (1500, 60), (900, 0)]);
        assert_eq!(lowest_price_before_discount(&entries, period(30)), Some(1500));
    }

    #[test]
    fn takes_minimum_of_both_branches() {
        // 100 @ -40d, 80 @ -10d, 90 @ now, P = 15
        let entries = log(&[(100, 40), (80, 10), (90, 0)]);
        let window = PriceWindow::from_entries(&entries, period(15)).unwrap();
        assert_eq!(window.window_start, now() - Duration::days(15));
        assert_eq!(window.lowest_set_in_period, Some(80));
        assert_eq!(window.latest_set_beyond_period, Some(100));
        assert_eq!(window.lowest(), Some(80));
    }

    #[test]
    fn beyond_price_wins_when_lower() {
        let entries = log(&[(50, 40), (80, 10), (90, 0)]);
        assert_eq!(lowest_price_before_discount(&entries, period(15)), Some(50));
    }

    #[test]
    fn entry_exactly_at_window_start_is_in_period() {
        let entries = log(&[(700, 30), (900, 0)]);
        let window = PriceWindow::from_entries(&entries, period(30)).unwrap();
        assert_eq!(window.lowest_set_in_period, Some(700));
        assert_eq!(window.latest_set_beyond_period, None);
    }

    #[test]
    fn latest_entry_is_chosen_by_id_not_input_order() {
        let mut entries = log(&[(1200, 10), (1000, 5), (500, 0)]);
        entries.reverse();
        assert_eq!(lowest_price_before_discount(&entries, period(30)), Some(1000));
    }

    #[test]
    fn window_is_anchored_on_latest_entry_not_wall_clock() {
        // Latest change was 100 days ago; the window is 100..130 days ago.
        let entries = log(&[(900, 200), (600, 120), (800, 100)]);
        assert_eq!(lowest_price_before_discount(&entries, period(30)), Some(600));
    }

    #[test]
    fn longest_period_covers_whole_history() {
        let longest = period(i64::from(crate::model::MAX_CHECKING_PERIOD_DAYS));
        let entries = log(&[(100, 10), (90, 0)]);
        assert_eq!(lowest_price_before_discount(&entries, longest), Some(100));
    }

    #[test]
    fn window_reaching_before_earliest_instant_holds_everything() {
        let earliest = DateTime::<Utc>::MIN_UTC;
        let entries: Vec<PriceLogEntry> = [(300, 0), (200, 1)]
            .into_iter()
            .zip(1_i64..)
            .map(|((price, days_after), id)| PriceLogEntry {
                id,
                channel_pricing_id: 7,
                price,
                original_price: None,
                logged_at: earliest + Duration::days(days_after),
            })
            .collect();

        let window = PriceWindow::from_entries(&entries, period(30)).unwrap();
        assert_eq!(window.window_start, earliest);
        assert_eq!(window.lowest_set_in_period, Some(300));
        assert_eq!(window.latest_set_beyond_period, None);
    }

    #[test]
    fn result_is_stable_across_repeated_calls() {
        let entries = log(&[(100, 40), (80, 10), (90, 0)]);
        let first = lowest_price_before_discount(&entries, period(15));
        let second = lowest_price_before_discount(&entries, period(15));
        assert_eq!(first, second);
    }
}
