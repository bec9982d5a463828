//! Scenario tests across the engine, window store and feed adapter

use trade_window_sdk::{
    data::*,
    engine::*,
    error::*,
    feed::{FeedAdapter, FeedExit},
    transport::{ChannelTransport, TransportEvent},
    window::WindowStore,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio::sync::watch;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

fn insert_message(entries: &[(f64, f64, &str, DateTime<Utc>)]) -> String {
    let data: Vec<serde_json::Value> = entries
        .iter()
        .map(|(price, size, side, ts)| {
            serde_json::json!({"price": price, "size": size, "side": side, "timestamp": ts.to_rfc3339()})
        })
        .collect();
    serde_json::json!({"table": "trade", "action": "insert", "data": data}).to_string()
}

#[test]
fn test_three_trades_in_arrival_order() {
    let mut engine = AggregationEngine::default();

    engine.ingest_message_at(&insert_message(&[(100.0, 5.0, "buy", t0())]), t0());
    engine.ingest_message_at(
        &insert_message(&[(90.0, 3.0, "sell", t0() + Duration::seconds(1))]),
        t0() + Duration::seconds(1),
    );
    engine.ingest_message_at(
        &insert_message(&[(110.0, 8.0, "buy", t0() + Duration::seconds(2))]),
        t0() + Duration::seconds(2),
    );

    let snapshot = engine.snapshot();
    let prices: Vec<f64> = snapshot.window.iter().map(|r| r.price).collect();
    assert_eq!(prices, vec![100.0, 90.0, 110.0]);
    assert_eq!(snapshot.sequence, 3);

    assert_eq!(snapshot.stats.buy_price_range(), Some((100.0, 110.0)));
    assert_eq!(snapshot.stats.sell_price_range(), Some((90.0, 90.0)));
    assert_eq!(snapshot.stats.size_range(), Some((3.0, 8.0)));
}

#[test]
fn test_trade_61s_later_evicts_first() {
    let mut engine = AggregationEngine::default();
    let later = t0() + Duration::seconds(61);

    engine.ingest_record_at(TradeRecord::new(100.0, 1.0, TradeSide::Buy, t0()), t0());
    engine.ingest_record_at(TradeRecord::new(101.0, 1.0, TradeSide::Buy, later), later);

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.window.len(), 1);
    assert_eq!(snapshot.window[0].timestamp, later);
}

#[test]
fn test_late_old_trade_retained_by_own_timestamp() {
    let mut window = WindowStore::default();
    let now = t0() + Duration::seconds(100);

    // Arrives last but happened 50s ago: kept, and stays behind newer trades
    window.insert_at(TradeRecord::new(1.0, 1.0, TradeSide::Buy, t0() + Duration::seconds(95)), now);
    window.insert_at(TradeRecord::new(2.0, 1.0, TradeSide::Buy, t0() + Duration::seconds(50)), now);
    assert_eq!(window.len(), 2);

    // 111s: the late trade is now 61s old
    window.insert_at(
        TradeRecord::new(3.0, 1.0, TradeSide::Sell, t0() + Duration::seconds(111)),
        t0() + Duration::seconds(111),
    );
    let prices: Vec<f64> = window.iter().map(|r| r.price).collect();
    assert_eq!(prices, vec![1.0, 3.0]);
}

#[test]
fn test_custom_window_duration() {
    let mut engine = AggregationEngine::new(std::time::Duration::from_secs(5));
    assert_eq!(engine.window_duration(), std::time::Duration::from_secs(5));

    engine.ingest_record_at(TradeRecord::new(1.0, 1.0, TradeSide::Buy, t0()), t0());
    engine.ingest_record_at(
        TradeRecord::new(1.0, 1.0, TradeSide::Buy, t0() + Duration::seconds(6)),
        t0() + Duration::seconds(6),
    );
    assert_eq!(engine.window_len(), 1);
}

#[test]
fn test_ingest_counters() {
    let mut engine = AggregationEngine::default();

    engine.ingest_message(r#"{"info":"Welcome"}"#);
    engine.ingest_message("garbage");
    engine.ingest_message(&insert_message(&[
        (1.0, 1.0, "buy", Utc::now()),
        (1.0, 1.0, "hold", Utc::now()),
    ]));

    assert_eq!(
        engine.stats(),
        IngestStats {
            accepted_trades: 1,
            rejected_entries: 1,
            ignored_messages: 1,
            invalid_payloads: 1,
        }
    );
}

#[tokio::test]
async fn test_feed_adapter_forwards_batches_in_order() {
    let mut adapter = FeedAdapter::new(AggregationEngine::default());
    let mut states = adapter.state_changes();
    let (tx, mut transport) = ChannelTransport::pair();
    let (_shutdown_tx, mut shutdown) = watch::channel(false);

    let now = Utc::now();
    tx.send(TransportEvent::Open).unwrap();
    tx.send(TransportEvent::Message(insert_message(&[
        (10.0, 1.0, "Buy", now),
        (11.0, 1.0, "Sell", now),
    ])))
    .unwrap();
    tx.send(TransportEvent::Error("transient".into())).unwrap();
    tx.send(TransportEvent::Message(insert_message(&[(12.0, 1.0, "Buy", now)])))
        .unwrap();
    drop(tx);

    let exit = adapter.run(&mut transport, &mut shutdown).await;
    assert_eq!(exit, FeedExit::Closed);

    let prices: Vec<f64> = adapter.engine().snapshot().window.iter().map(|r| r.price).collect();
    assert_eq!(prices, vec![10.0, 11.0, 12.0]);

    assert!(states.has_changed().unwrap());
    assert_eq!(*states.borrow_and_update(), ConnectionState::Disconnected);
}

#[test]
fn test_error_display() {
    let err = SdkError::from(TransportError::EstablishmentFailed("refused".into()));
    assert_eq!(err.to_string(), "Transport error: Failed to establish connection: refused");
    assert_eq!(ErrorSeverity::from_error(&err), ErrorSeverity::High);
}
