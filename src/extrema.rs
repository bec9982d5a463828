//! Running high/low statistics over every accepted trade

use crate::data::{HighLowStats, TradeRecord, TradeSide};

/// Cumulative extrema fold.
///
/// Covers the whole stream lifetime, not just the records still held by the
/// window store: highs never decrease and lows never increase. There is no
/// removal operation.
#[derive(Debug, Clone, Default)]
pub struct ExtremaTracker {
    stats: HighLowStats,
}

impl ExtremaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, record: &TradeRecord) {
        let stats = &mut self.stats;

        match record.side {
            TradeSide::Buy => {
                stats.highest_buy_price = stats.highest_buy_price.max(record.price);
                stats.lowest_buy_price = stats.lowest_buy_price.min(record.price);
            }
            TradeSide::Sell => {
                stats.highest_sell_price = stats.highest_sell_price.max(record.price);
                stats.lowest_sell_price = stats.lowest_sell_price.min(record.price);
            }
        }

        stats.highest_size = stats.highest_size.max(record.size);
        stats.lowest_size = stats.lowest_size.min(record.size);
    }

    pub fn current(&self) -> HighLowStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn trade(price: f64, size: f64, side: TradeSide) -> TradeRecord {
        TradeRecord::new(price, size, side, Utc::now())
    }

    #[test]
    fn test_three_trade_scenario() {
        let mut tracker = ExtremaTracker::new();
        tracker.update(&trade(100.0, 5.0, TradeSide::Buy));
        tracker.update(&trade(90.0, 3.0, TradeSide::Sell));
        tracker.update(&trade(110.0, 8.0, TradeSide::Buy));

        let stats = tracker.current();
        assert_eq!(stats.highest_buy_price, 110.0);
        assert_eq!(stats.lowest_buy_price, 100.0);
        assert_eq!(stats.highest_sell_price, 90.0);
        assert_eq!(stats.lowest_sell_price, 90.0);
        assert_eq!(stats.highest_size, 8.0);
        assert_eq!(stats.lowest_size, 3.0);
    }

    #[test]
    fn test_buy_leaves_sell_untouched() {
        let mut tracker = ExtremaTracker::new();
        tracker.update(&trade(90.0, 1.0, TradeSide::Sell));
        let before = tracker.current();

        tracker.update(&trade(500.0, 2.0, TradeSide::Buy));
        let after = tracker.current();

        assert_eq!(after.highest_sell_price, before.highest_sell_price);
        assert_eq!(after.lowest_sell_price, before.lowest_sell_price);
    }

    #[test]
    fn test_sell_leaves_buy_untouched() {
        let mut tracker = ExtremaTracker::new();
        tracker.update(&trade(100.0, 1.0, TradeSide::Buy));
        let before = tracker.current();

        tracker.update(&trade(1.0, 2.0, TradeSide::Sell));
        tracker.update(&trade(900.0, 2.0, TradeSide::Sell));
        let after = tracker.current();

        assert_eq!(after.highest_buy_price, before.highest_buy_price);
        assert_eq!(after.lowest_buy_price, before.lowest_buy_price);
    }

    #[test]
    fn test_initial_sentinels() {
        let stats = ExtremaTracker::new().current();
        assert_eq!(stats.highest_buy_price, 0.0);
        assert!(stats.lowest_buy_price.is_infinite());
        assert!(stats.lowest_size.is_infinite());
    }
}
