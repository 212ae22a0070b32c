//! Broker transport capability traits
//!
//! The connector does not implement the wire protocol. It consumes a
//! provider-supplied connection/session capability through these traits,
//! which mirror the operations the core needs: consumer creation in its
//! durable/shared variants, producer creation, local transaction control,
//! and lifecycle start/stop/close. Implementations are responsible for the
//! thread-safety of concurrent commit/ack calls on one session; the core
//! never assumes exclusive access.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::error::TransportError;
use crate::message::{Destination, Message};

/// A live connection to the broker.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Start (or resume) message delivery on this connection.
    async fn start(&self) -> Result<(), TransportError>;

    /// Pause message delivery.
    async fn stop(&self) -> Result<(), TransportError>;

    /// Close the connection and release broker-side resources.
    async fn close(&self) -> Result<(), TransportError>;

    /// Create a session. `transacted` sessions buffer work until
    /// `commit`/`rollback`; otherwise `ack_mode` governs acknowledgement.
    async fn create_session(
        &self,
        transacted: bool,
        ack_mode: crate::subscription::AckMode,
    ) -> Result<Arc<dyn Session>, TransportError>;
}

/// A session scoped to one connection.
#[async_trait]
pub trait Session: Send + Sync {
    /// Plain consumer on a queue or topic, with optional selector and
    /// (topics only) no-local flag.
    async fn create_consumer(
        &self,
        destination: &Destination,
        selector: Option<&str>,
        no_local: bool,
    ) -> Result<Box<dyn Consumer>, TransportError>;

    /// Durable topic subscriber keyed by subscriber name.
    async fn create_durable_consumer(
        &self,
        topic: &str,
        subscriber_name: &str,
        selector: Option<&str>,
        no_local: bool,
    ) -> Result<Box<dyn Consumer>, TransportError>;

    /// Shared topic consumer keyed by subscriber name.
    async fn create_shared_consumer(
        &self,
        topic: &str,
        subscriber_name: &str,
        selector: Option<&str>,
    ) -> Result<Box<dyn Consumer>, TransportError>;

    /// Shared durable topic consumer keyed by subscriber name.
    async fn create_shared_durable_consumer(
        &self,
        topic: &str,
        subscriber_name: &str,
        selector: Option<&str>,
    ) -> Result<Box<dyn Consumer>, TransportError>;

    /// Producer channel bound to one destination.
    async fn create_producer(
        &self,
        destination: &Destination,
    ) -> Result<Box<dyn ProducerChannel>, TransportError>;

    /// Commit the current local transaction.
    async fn commit(&self) -> Result<(), TransportError>;

    /// Roll back the current local transaction.
    async fn rollback(&self) -> Result<(), TransportError>;

    /// Close the session.
    async fn close(&self) -> Result<(), TransportError>;
}

/// A consumer handle pulling messages for one subscription.
#[async_trait]
pub trait Consumer: Send + Sync {
    /// Bounded-wait receive. `Ok(None)` means the timeout elapsed with no
    /// message, which is not an error.
    async fn receive(&self, timeout: Duration) -> Result<Option<Message>, TransportError>;

    /// Close the consumer.
    async fn close(&self) -> Result<(), TransportError>;
}

/// Producer-side channel for one destination.
#[async_trait]
pub trait ProducerChannel: Send + Sync {
    /// Send one fully encoded wire message.
    async fn send(&self, message: Message) -> Result<(), TransportError>;

    /// Close the producer channel.
    async fn close(&self) -> Result<(), TransportError>;
}

/// Per-message acknowledge handle, retained by a received [`Message`] solely
/// to support explicit acknowledgement.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn acknowledge(&self) -> Result<(), TransportError>;
}
