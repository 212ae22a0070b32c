//! Bounded-wait receive loop
//!
//! One receiver owns one consumer handle and drives it from a dedicated
//! task: bounded-wait receive, hand the message to the dispatcher, repeat.
//! Timeouts are not errors. Recoverable transport failures log a warning
//! and back off before the next attempt; a connection-level failure ends
//! the loop for good.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::PollConfig;
use crate::error::Result;
use crate::listener::dispatcher::MessageDispatcher;
use crate::transport::Consumer;

/// Receiver lifecycle state, observable through [`MessageReceiver::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    Created,
    Consuming,
    Stopped,
}

/// How to treat in-flight handler work when stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMode {
    /// Wait for dispatched handler tasks to finish
    Graceful,
    /// Abort dispatched handler tasks
    Immediate,
}

pub struct MessageReceiver {
    consumer: Arc<dyn Consumer>,
    dispatcher: Arc<MessageDispatcher>,
    poll: PollConfig,
    state_tx: watch::Sender<ReceiverState>,
    shutdown_tx: watch::Sender<bool>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for MessageReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageReceiver")
            .field("service", &self.dispatcher.service().name())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl MessageReceiver {
    pub fn new(
        consumer: Arc<dyn Consumer>,
        dispatcher: Arc<MessageDispatcher>,
        poll: PollConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(ReceiverState::Created);
        let (shutdown_tx, _) = watch::channel(false);
        MessageReceiver {
            consumer,
            dispatcher,
            poll,
            state_tx,
            shutdown_tx,
            loop_handle: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ReceiverState {
        *self.state_tx.borrow()
    }

    /// Subscribe to receiver state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ReceiverState> {
        self.state_tx.subscribe()
    }

    /// Start the receive loop. Starting an already consuming or stopped
    /// receiver is a no-op.
    pub async fn start(&self) {
        let mut handle = self.loop_handle.lock().await;
        if handle.is_some() || self.state() == ReceiverState::Stopped {
            return;
        }

        let consumer = self.consumer.clone();
        let dispatcher = self.dispatcher.clone();
        let poll = self.poll;
        let state_tx = self.state_tx.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let _ = state_tx.send(ReceiverState::Consuming);
        info!(service = %self.dispatcher.service().name(), "Starting receive loop");

        *handle = Some(tokio::spawn(async move {
            let receive_timeout = Duration::from_millis(poll.receive_timeout_ms);
            let retry_backoff = Duration::from_millis(poll.retry_backoff_ms);

            loop {
                if *shutdown_rx.borrow() {
                    break;
                }

                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    received = consumer.receive(receive_timeout) => match received {
                        Ok(Some(message)) => dispatcher.dispatch(message).await,
                        // Timeout with no message; keep polling
                        Ok(None) => {}
                        Err(error) if error.is_connection_closed() => {
                            info!(
                                service = %dispatcher.service().name(),
                                "Connection closed, ending receive loop"
                            );
                            break;
                        }
                        Err(error) => {
                            warn!(
                                service = %dispatcher.service().name(),
                                error = %error,
                                "Receive failed, backing off before retry"
                            );
                            if interruptible_sleep(retry_backoff, &mut shutdown_rx).await {
                                break;
                            }
                        }
                    }
                }
            }

            let _ = state_tx.send(ReceiverState::Stopped);
            debug!(service = %dispatcher.service().name(), "Receive loop ended");
        }));
    }

    /// Stop the receive loop and close the consumer. Safe to call more than
    /// once; later calls return without touching the transport again.
    pub async fn stop(&self, mode: StopMode) -> Result<()> {
        let handle = {
            let mut guard = self.loop_handle.lock().await;
            guard.take()
        };

        let already_stopped = self.state() == ReceiverState::Stopped && handle.is_none();
        let _ = self.shutdown_tx.send(true);

        if let Some(handle) = handle {
            if tokio::time::timeout(Duration::from_secs(30), handle)
                .await
                .is_err()
            {
                warn!(
                    service = %self.dispatcher.service().name(),
                    "Receive loop did not end in time"
                );
            }
        }

        match mode {
            StopMode::Graceful => self.dispatcher.drain().await,
            StopMode::Immediate => self.dispatcher.abort_all().await,
        }

        let _ = self.state_tx.send(ReceiverState::Stopped);
        if already_stopped {
            return Ok(());
        }

        self.consumer.close().await?;
        Ok(())
    }
}

/// Sleep that wakes early on shutdown. Returns true when interrupted.
async fn interruptible_sleep(duration: Duration, shutdown_rx: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = shutdown_rx.changed() => *shutdown_rx.borrow(),
    }
}
