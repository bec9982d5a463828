use anyhow::Context;
use trade_window_sdk::{init_logging, ConnectionState, FeedConfig, FeedExit, TradeStreamClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = FeedConfig::from_env().context("loading feed configuration")?;
    tracing::info!(
        "Trade window: {:?} over {} (auto_reconnect={})",
        config.window_duration,
        config.endpoint,
        config.auto_reconnect
    );

    let mut client = TradeStreamClient::new(config)?;
    let mut snapshots = client.subscribe();
    let mut states = client.state_changes();

    client.start().await?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    // The supervisor can give up without a further state change
    let mut liveness = tokio::time::interval(std::time::Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("Interrupted");
                break;
            }
            _ = liveness.tick() => {
                if !client.is_running() {
                    break;
                }
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                tracing::info!(
                    "#{} window={} trades | {}",
                    snapshot.sequence,
                    snapshot.window.len(),
                    snapshot.stats
                );
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *states.borrow_and_update();
                tracing::info!("WebSocket Status: {}", state);

                let will_retry = client.config().auto_reconnect && client.is_running();
                if state == ConnectionState::Disconnected && !will_retry {
                    break;
                }
            }
        }
    }

    client.shutdown().await?;

    if let Ok(Some(FeedExit::Failed(e))) = client.join().await {
        anyhow::bail!("feed failed: {}", e);
    }

    Ok(())
}
