//! Feed adapter: connection state machine in front of the aggregation engine
//!
//! ```text
//! DISCONNECTED ──connect──▶ CONNECTING ──open──▶ CONNECTED
//!      ▲                        │                   │
//!      └────────failure─────────┘                 close
//!      └────────────────────────────────────────────┘
//! ```
//!
//! Error events are reported but do not change state; only the transport's
//! close event (or a failed connect) returns the adapter to `Disconnected`.
//! The adapter never reconnects on its own.

use crate::{
    data::{ConnectionState, FeedConfig},
    engine::{AggregationEngine, IngestReport},
    error::{ErrorContext, ErrorReporter, SdkError, TransportError},
    transport::{Transport, TransportEvent, WebSocketTransport},
};
use tokio::sync::watch;
use uuid::Uuid;

/// Why a feed run returned
#[derive(Debug, Clone, PartialEq)]
pub enum FeedExit {
    /// The transport closed; the owner may connect again
    Closed,
    /// Shutdown was requested; the adapter is released
    Shutdown,
    /// The connection could not be established
    Failed(TransportError),
}

/// Owns the engine and drives it from transport events
pub struct FeedAdapter {
    engine: AggregationEngine,
    state: watch::Sender<ConnectionState>,
    connection_id: Option<Uuid>,
    released: bool,
}

impl FeedAdapter {
    pub fn new(engine: AggregationEngine) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            engine,
            state,
            connection_id: None,
            released: false,
        }
    }

    pub fn engine(&self) -> &AggregationEngine {
        &self.engine
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    /// Connectivity status channel
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Stop forwarding events. Permanent for this adapter.
    pub fn release(&mut self) {
        if !self.released {
            tracing::info!("Feed adapter released");
        }
        self.released = true;
        self.connection_id = None;
        self.set_state(ConnectionState::Disconnected);
    }

    /// Mark a connection attempt as started
    pub fn begin_connect(&mut self) {
        if self.released {
            return;
        }
        self.set_state(ConnectionState::Connecting);
    }

    /// React to one transport event.
    ///
    /// Returns the ingest report when a message reached the engine.
    pub fn handle_event(&mut self, event: TransportEvent) -> Option<IngestReport> {
        if self.released {
            tracing::debug!("Dropping {:?} after release", event);
            return None;
        }

        match event {
            TransportEvent::Open => {
                let id = Uuid::new_v4();
                self.connection_id = Some(id);
                self.set_state(ConnectionState::Connected);
                tracing::info!(connection = %id, "WebSocket Connected");
                None
            }
            TransportEvent::Message(text) => {
                if !self.is_connected() {
                    tracing::debug!("Dropping message received while {}", self.connection_state());
                    return None;
                }
                Some(self.engine.ingest_message(&text))
            }
            TransportEvent::Error(details) => {
                let mut context = ErrorContext::new("receive");
                if let Some(id) = self.connection_id {
                    context = context.with_detail("connection", id);
                }
                ErrorReporter::report_error(
                    &SdkError::Transport(TransportError::Stream(details)),
                    Some(&context),
                );
                None
            }
            TransportEvent::Close => {
                tracing::info!(
                    connection = ?self.connection_id,
                    "WebSocket Disconnected"
                );
                self.connection_id = None;
                self.set_state(ConnectionState::Disconnected);
                None
            }
        }
    }

    /// Pump events from `transport` until it closes or shutdown is signalled.
    ///
    /// Shutdown wins over pending events. The transport is closed on every
    /// exit path.
    pub async fn run<T>(&mut self, transport: &mut T, shutdown: &mut watch::Receiver<bool>) -> FeedExit
    where
        T: Transport + ?Sized,
    {
        let exit = loop {
            tokio::select! {
                biased;
                _ = shutdown_requested(shutdown) => break FeedExit::Shutdown,
                event = transport.next_event() => match event {
                    Some(TransportEvent::Close) | None => {
                        self.handle_event(TransportEvent::Close);
                        break FeedExit::Closed;
                    }
                    Some(event) => {
                        self.handle_event(event);
                    }
                },
            }
        };

        if exit == FeedExit::Shutdown {
            self.release();
        }

        if let Err(e) = transport.close().await {
            tracing::debug!("Error while closing transport: {}", e);
        }

        exit
    }

    /// Open a WebSocket to `config.endpoint` and run it to completion
    pub async fn connect_and_run(
        &mut self,
        config: &FeedConfig,
        shutdown: &mut watch::Receiver<bool>,
    ) -> FeedExit {
        if self.released {
            return FeedExit::Shutdown;
        }

        self.begin_connect();

        let connect = WebSocketTransport::connect(&config.endpoint, config.connect_timeout);
        let mut transport = tokio::select! {
            biased;
            _ = shutdown_requested(shutdown) => {
                self.release();
                return FeedExit::Shutdown;
            }
            result = connect => match result {
                Ok(transport) => transport,
                Err(e) => {
                    self.set_state(ConnectionState::Disconnected);
                    ErrorReporter::report_error(
                        &SdkError::Transport(e.clone()),
                        Some(&ErrorContext::new("connect").with_detail("endpoint", &config.endpoint)),
                    );
                    return FeedExit::Failed(e);
                }
            },
        };

        self.run(&mut transport, shutdown).await
    }

    fn set_state(&self, next: ConnectionState) {
        self.state.send_if_modified(|state| {
            if *state == next {
                false
            } else {
                tracing::debug!("Connection state {} -> {}", state, next);
                *state = next;
                true
            }
        });
    }
}

/// Resolves once shutdown is signalled or the signal's sender is gone
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
