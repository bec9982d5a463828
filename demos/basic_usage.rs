//! Basic usage example for the trade window SDK
//!
//! Replays a short recorded BitMEX session through the feed adapter, so it
//! runs without network access.

use trade_window_sdk::{
    init_logging, AggregationEngine, ChannelTransport, FeedAdapter, TransportEvent,
};
use chrono::{Duration, Utc};
use tokio::sync::watch;

fn trade_batch(entries: &[(f64, f64, &str, i64)]) -> String {
    let now = Utc::now();
    let data: Vec<serde_json::Value> = entries
        .iter()
        .map(|(price, size, side, ago_ms)| {
            serde_json::json!({
                "timestamp": (now - Duration::milliseconds(*ago_ms)).to_rfc3339(),
                "symbol": "XBTUSD",
                "side": side,
                "size": size,
                "price": price,
            })
        })
        .collect();

    serde_json::json!({"table": "trade", "action": "insert", "data": data}).to_string()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    println!("Trade Window SDK - Basic Usage Example");

    let engine = AggregationEngine::default();
    let mut snapshots = engine.subscribe();
    let mut adapter = FeedAdapter::new(engine);

    let (feed, mut transport) = ChannelTransport::pair();
    feed.send(TransportEvent::Open)?;
    feed.send(TransportEvent::Message(
        r#"{"info":"Welcome to the BitMEX Realtime API.","version":"2.0.0"}"#.to_string(),
    ))?;
    feed.send(TransportEvent::Message(
        r#"{"success":true,"subscribe":"trade:XBTUSD","request":{"op":"subscribe","args":["trade:XBTUSD"]}}"#
            .to_string(),
    ))?;
    // 90s old: evicted by the next insert, but still counted in the extrema
    feed.send(TransportEvent::Message(trade_batch(&[(64_950.0, 900.0, "Buy", 90_000)])))?;
    feed.send(TransportEvent::Message(trade_batch(&[
        (65_010.5, 200.0, "Buy", 3_000),
        (65_008.0, 1_500.0, "Sell", 2_000),
    ])))?;
    // One malformed entry; the other two still land
    feed.send(TransportEvent::Message(
        serde_json::json!({
            "table": "trade",
            "action": "insert",
            "data": [
                {"timestamp": Utc::now().to_rfc3339(), "side": "Sell", "size": 10, "price": null},
                {"timestamp": Utc::now().to_rfc3339(), "side": "Sell", "size": 25, "price": 65_001.0},
                {"timestamp": Utc::now().to_rfc3339(), "side": "Buy", "size": 50, "price": 65_012.0},
            ]
        })
        .to_string(),
    ))?;
    feed.send(TransportEvent::Close)?;

    let (_shutdown_tx, mut shutdown) = watch::channel(false);
    let exit = adapter.run(&mut transport, &mut shutdown).await;
    println!("Feed finished: {:?}", exit);

    let snapshot = snapshots.borrow_and_update().clone();
    println!("Snapshot #{} holds {} trades:", snapshot.sequence, snapshot.window.len());
    for trade in snapshot.window.iter() {
        println!("  {}", trade);
    }
    println!("High/low: {}", snapshot.stats);
    println!("Ingest counters: {:?}", adapter.engine().stats());

    Ok(())
}
