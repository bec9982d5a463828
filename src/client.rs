//! Main client interface: owns the feed task and hands out snapshots

use crate::{
    data::*,
    engine::{AggregationEngine, EngineSnapshot},
    error::SdkError,
    feed::{shutdown_requested, FeedAdapter, FeedExit},
    retry::ReconnectPolicy,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Streams trades from the configured feed into an aggregation engine.
///
/// The feed runs on its own tokio task; this handle only reads snapshots
/// and connectivity. Dropping the client signals shutdown to the task.
pub struct TradeStreamClient {
    config: FeedConfig,
    adapter: Option<FeedAdapter>,
    task: Option<JoinHandle<(FeedAdapter, FeedExit)>>,
    snapshots: watch::Receiver<Arc<EngineSnapshot>>,
    states: watch::Receiver<ConnectionState>,
    shutdown: watch::Sender<bool>,
    last_exit: Option<FeedExit>,
}

impl TradeStreamClient {
    /// Create a client; nothing connects until [`start`](Self::start)
    pub fn new(config: FeedConfig) -> Result<Self, SdkError> {
        config.validate().map_err(SdkError::Configuration)?;

        let engine = AggregationEngine::new(config.window_duration);
        let snapshots = engine.subscribe();
        let adapter = FeedAdapter::new(engine);
        let states = adapter.state_changes();
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            config,
            adapter: Some(adapter),
            task: None,
            snapshots,
            states,
            shutdown,
            last_exit: None,
        })
    }

    /// Spawn the feed task.
    ///
    /// Also used to connect again after the feed closed: the engine and its
    /// statistics carry over.
    pub async fn start(&mut self) -> Result<(), SdkError> {
        if self.is_running() {
            return Err(SdkError::Runtime("feed is already running".to_string()));
        }

        self.reclaim().await?;

        let adapter = self
            .adapter
            .take()
            .ok_or_else(|| SdkError::Runtime("feed adapter unavailable".to_string()))?;

        if adapter.is_released() {
            self.adapter = Some(adapter);
            return Err(SdkError::Runtime("client has been shut down".to_string()));
        }

        tracing::info!("Starting trade feed for {}", self.config.endpoint);
        let config = self.config.clone();
        let shutdown = self.shutdown.subscribe();
        self.task = Some(tokio::spawn(supervise(adapter, config, shutdown)));

        Ok(())
    }

    /// Wait for the feed task to finish on its own and return why it stopped
    pub async fn join(&mut self) -> Result<Option<FeedExit>, SdkError> {
        self.reclaim().await?;
        Ok(self.last_exit.clone())
    }

    /// Signal shutdown and wait for the transport to be released
    pub async fn shutdown(&mut self) -> Result<(), SdkError> {
        tracing::info!("Shutting down trade feed");
        self.shutdown.send_replace(true);
        self.reclaim().await?;

        if let Some(adapter) = self.adapter.as_mut() {
            adapter.release();
        }
        Ok(())
    }

    async fn reclaim(&mut self) -> Result<(), SdkError> {
        if let Some(task) = self.task.take() {
            let (adapter, exit) = task
                .await
                .map_err(|e| SdkError::Runtime(format!("feed task failed: {}", e)))?;
            tracing::info!("Feed task finished: {:?}", exit);
            self.adapter = Some(adapter);
            self.last_exit = Some(exit);
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    /// Latest window and statistics
    pub fn snapshot(&self) -> Arc<EngineSnapshot> {
        self.snapshots.borrow().clone()
    }

    /// Change notifications for snapshots
    pub fn subscribe(&self) -> watch::Receiver<Arc<EngineSnapshot>> {
        self.snapshots.clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.states.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.states.clone()
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }
}

impl Drop for TradeStreamClient {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

/// Feed task body: one connection, or repeated ones when `auto_reconnect`
/// is enabled
async fn supervise(
    mut adapter: FeedAdapter,
    config: FeedConfig,
    mut shutdown: watch::Receiver<bool>,
) -> (FeedAdapter, FeedExit) {
    let mut failures = 0u32;

    loop {
        let exit = adapter.connect_and_run(&config, &mut shutdown).await;

        match &exit {
            FeedExit::Shutdown => return (adapter, exit),
            FeedExit::Closed => failures = 0,
            FeedExit::Failed(_) => failures += 1,
        }

        if !config.auto_reconnect {
            return (adapter, exit);
        }

        if !config.reconnect.allows_attempt(failures) {
            tracing::error!("Giving up after {} failed connection attempts", failures);
            return (adapter, exit);
        }

        let delay = config.reconnect.delay_for(failures.max(1));
        tracing::info!("Reconnecting in {:?} (failures: {})", delay, failures);

        tokio::select! {
            biased;
            _ = shutdown_requested(&mut shutdown) => {
                adapter.release();
                return (adapter, FeedExit::Shutdown);
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Builder pattern for feed configuration
pub struct FeedConfigBuilder {
    config: FeedConfig,
}

impl FeedConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: FeedConfig::default(),
        }
    }

    pub fn endpoint(mut self, endpoint: &str) -> Self {
        self.config.endpoint = endpoint.to_string();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn window_duration(mut self, duration: Duration) -> Self {
        self.config.window_duration = duration;
        self
    }

    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.config.auto_reconnect = enabled;
        self
    }

    pub fn reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.config.reconnect = policy;
        self
    }

    pub fn build(self) -> FeedConfig {
        self.config
    }
}

impl Default for FeedConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = FeedConfigBuilder::new()
            .endpoint("ws://localhost:9001")
            .window_duration(Duration::from_secs(10))
            .auto_reconnect(true)
            .build();

        assert_eq!(config.endpoint, "ws://localhost:9001");
        assert_eq!(config.window_duration, Duration::from_secs(10));
        assert!(config.auto_reconnect);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = FeedConfigBuilder::new().endpoint("").build();
        assert!(matches!(
            TradeStreamClient::new(config),
            Err(SdkError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_fresh_client_state() {
        let client = TradeStreamClient::new(FeedConfig::default()).unwrap();
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
        assert!(!client.is_running());
        assert_eq!(client.snapshot().sequence, 0);
        assert!(client.snapshot().window.is_empty());
    }

    #[tokio::test]
    async fn test_start_after_shutdown_rejected() {
        let mut client = TradeStreamClient::new(FeedConfig::default()).unwrap();
        client.shutdown().await.unwrap();
        assert!(matches!(client.start().await, Err(SdkError::Runtime(_))));
    }
}
