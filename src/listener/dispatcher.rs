//! Per-message dispatch
//!
//! The dispatcher turns a received wire message into a handler invocation:
//! decode against the service's declared payload shape, build a caller when
//! the handler asked for one, then run the handler on its own task so a slow
//! handler never blocks the receive loop. Preparation failures (decode,
//! missing handler input) go to the error handler without ever invoking the
//! message handler.

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::debug;

use crate::codec;
use crate::listener::caller::Caller;
use crate::listener::service::{OnMessage, Service};
use crate::message::Message;
use crate::transport::Session;

pub struct MessageDispatcher {
    service: Arc<Service>,
    session: Arc<dyn Session>,
    tasks: Mutex<JoinSet<()>>,
}

impl std::fmt::Debug for MessageDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageDispatcher")
            .field("service", &self.service.name())
            .finish_non_exhaustive()
    }
}

impl MessageDispatcher {
    pub fn new(service: Arc<Service>, session: Arc<dyn Session>) -> Self {
        MessageDispatcher {
            service,
            session,
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    pub fn service(&self) -> &Arc<Service> {
        &self.service
    }

    /// Dispatch one message to the service handler.
    ///
    /// Exactly one handler invocation per message: either the message
    /// handler runs with a successfully decoded payload, or the error
    /// handler runs with the preparation failure. Both run on their own
    /// task; `dispatch` never waits on a user handler.
    pub async fn dispatch(&self, message: Message) {
        let payload = match codec::decode(&message, self.service.payload_target()) {
            Ok(payload) => payload,
            Err(error) => {
                let service = self.service.clone();
                let mut tasks = self.tasks.lock().await;
                while tasks.try_join_next().is_some() {}
                tasks.spawn(async move {
                    service.report_error(error).await;
                });
                return;
            }
        };

        let service = self.service.clone();
        let session = self.session.clone();

        let mut tasks = self.tasks.lock().await;
        // Reap finished handler tasks so the set does not grow unbounded
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            debug!(
                service = %service.name(),
                message_id = ?message.message_id,
                "Dispatching message"
            );
            let result = match service.on_message() {
                OnMessage::Message(handler) => handler(message, payload).await,
                OnMessage::WithCaller(handler) => {
                    handler(message, payload, Caller::new(session)).await
                }
            };
            if let Err(error) = result {
                service.report_error(error).await;
            }
        });
    }

    /// Wait for every in-flight handler task to finish.
    pub async fn drain(&self) {
        let mut tasks = self.tasks.lock().await;
        while tasks.join_next().await.is_some() {}
    }

    /// Abort in-flight handler tasks without waiting.
    pub async fn abort_all(&self) {
        let mut tasks = self.tasks.lock().await;
        tasks.abort_all();
        while tasks.join_next().await.is_some() {}
    }
}
