//! Subscription lifecycle coordination
//!
//! A listener owns one broker connection and any number of attached
//! subscriptions. Each attach creates a dedicated session and consumer;
//! receive loops run once the listener is started. Stop tears everything
//! down before the connection, continuing past per-subscription failures
//! and reporting the first one at the end.

pub mod caller;
pub mod dispatcher;
pub mod receiver;
pub mod service;

pub use caller::Caller;
pub use receiver::{ReceiverState, StopMode};
pub use service::{Service, ServiceBuilder};

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::listener::dispatcher::MessageDispatcher;
use crate::listener::receiver::MessageReceiver;
use crate::subscription::{resolve_consumer, Subscription};
use crate::transport::{Connection, Session};

/// Handle identifying one attached subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

struct AttachedSubscription {
    receiver: Arc<MessageReceiver>,
    session: Arc<dyn Session>,
    service_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListenerPhase {
    Created,
    Started,
    Stopped,
}

/// Connection-scoped coordinator for attached message services.
pub struct Listener {
    connection: Arc<dyn Connection>,
    attached: Mutex<HashMap<SubscriptionId, AttachedSubscription>>,
    phase: Mutex<ListenerPhase>,
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener").finish_non_exhaustive()
    }
}

impl Listener {
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Listener {
            connection,
            attached: Mutex::new(HashMap::new()),
            phase: Mutex::new(ListenerPhase::Created),
        }
    }

    /// Attach a service to a subscription.
    ///
    /// Creates a session for the subscription's acknowledgement mode, then
    /// the consumer variant the descriptor calls for. The receive loop
    /// begins immediately when the listener is already started, otherwise
    /// it waits for [`Listener::start`]. Nothing is created when the
    /// descriptor is invalid.
    pub async fn attach(
        &self,
        subscription: Subscription,
        service: Service,
    ) -> Result<SubscriptionId> {
        // Held for the whole attach: a concurrent stop cannot slip between
        // the phase check and the insert and orphan a running receiver
        let phase_guard = self.phase.lock().await;
        let phase = *phase_guard;
        if phase == ListenerPhase::Stopped {
            return Err(Error::config("Cannot attach to a stopped listener"));
        }
        subscription.validate()?;

        let ack_mode = subscription.ack_mode();
        let session = self
            .connection
            .create_session(ack_mode.is_transacted(), ack_mode)
            .await?;
        let consumer = resolve_consumer(session.as_ref(), &subscription).await?;

        let service_name = service.name().to_string();
        let poll = service.poll();
        let dispatcher = Arc::new(MessageDispatcher::new(Arc::new(service), session.clone()));
        let receiver = Arc::new(MessageReceiver::new(Arc::from(consumer), dispatcher, poll));
        if phase == ListenerPhase::Started {
            receiver.start().await;
        }

        let id = SubscriptionId(Uuid::new_v4());
        info!(
            subscription_id = %id,
            service = %service_name,
            destination = %subscription.destination().name(),
            "Attached service"
        );
        self.attached.lock().await.insert(
            id,
            AttachedSubscription {
                receiver,
                session,
                service_name,
            },
        );
        Ok(id)
    }

    /// Detach one subscription, stopping its receive loop and closing its
    /// session.
    pub async fn detach(&self, id: SubscriptionId, mode: StopMode) -> Result<()> {
        let entry = self
            .attached
            .lock()
            .await
            .remove(&id)
            .ok_or_else(|| Error::config(format!("Unknown subscription: {id}")))?;

        info!(subscription_id = %id, service = %entry.service_name, "Detaching service");
        let stop_result = entry.receiver.stop(mode).await;
        let close_result = entry.session.close().await;
        stop_result?;
        close_result?;
        Ok(())
    }

    /// Start message delivery: the connection first, then every attached
    /// receive loop. Starting again resumes delivery; already consuming
    /// receivers are untouched.
    pub async fn start(&self) -> Result<()> {
        let mut phase = self.phase.lock().await;
        if *phase == ListenerPhase::Stopped {
            return Err(Error::config("Cannot start a stopped listener"));
        }
        self.connection.start().await?;
        *phase = ListenerPhase::Started;
        drop(phase);

        for entry in self.attached.lock().await.values() {
            entry.receiver.start().await;
        }
        Ok(())
    }

    /// Stop every attached subscription, then the connection.
    ///
    /// Always attempts every teardown step; the first failure is reported
    /// after everything else has been tried. Safe to call more than once.
    pub async fn stop(&self, mode: StopMode) -> Result<()> {
        {
            let mut phase = self.phase.lock().await;
            if *phase == ListenerPhase::Stopped {
                return Ok(());
            }
            *phase = ListenerPhase::Stopped;
        }

        info!(?mode, "Stopping listener");
        let mut first_error: Option<Error> = None;

        let attached: Vec<_> = self.attached.lock().await.drain().collect();
        for (id, entry) in attached {
            if let Err(err) = entry.receiver.stop(mode).await {
                error!(subscription_id = %id, error = %err, "Failed to stop receiver");
                first_error.get_or_insert(err);
            }
            if let Err(err) = entry.session.close().await {
                error!(subscription_id = %id, error = %err, "Failed to close session");
                first_error.get_or_insert(Error::from(err));
            }
        }

        if let Err(err) = self.connection.stop().await {
            error!(error = %err, "Failed to stop connection");
            first_error.get_or_insert(Error::from(err));
        }
        if let Err(err) = self.connection.close().await {
            error!(error = %err, "Failed to close connection");
            first_error.get_or_insert(Error::from(err));
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Stop, waiting for in-flight handler work.
    pub async fn graceful_stop(&self) -> Result<()> {
        self.stop(StopMode::Graceful).await
    }

    /// Stop without waiting for in-flight handler work.
    pub async fn immediate_stop(&self) -> Result<()> {
        self.stop(StopMode::Immediate).await
    }

    /// Number of currently attached subscriptions.
    pub async fn attached_count(&self) -> usize {
        self.attached.lock().await.len()
    }
}
