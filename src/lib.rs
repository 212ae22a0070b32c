//! msgbus - broker connector for JMS-style publish/subscribe messaging
//!
//! A client-side connector for queue- and topic-based brokers, built around
//! a provider-supplied transport capability:
//! - Subscription descriptors covering queue and durable/shared topic variants
//! - A per-subscription receive loop with per-message dispatch
//! - A type-directed payload codec between wire bodies and typed payloads
//! - A producer path with optional local transactions
//! - Declarative connection configuration assembled into provider properties
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use msgbus::listener::{Listener, Service};
//! use msgbus::message::PayloadTarget;
//! use msgbus::subscription::{AckMode, Subscription};
//! use std::sync::Arc;
//!
//! # async fn example(connection: Arc<dyn msgbus::transport::Connection>) -> msgbus::Result<()> {
//! let listener = Listener::new(connection);
//!
//! let service = Service::builder("orders")
//!     .payload_target(PayloadTarget::Text)
//!     .on_message(|message, payload| async move {
//!         println!("received {payload:?} from {:?}", message.destination);
//!         Ok(())
//!     })
//!     .build()?;
//!
//! listener
//!     .attach(Subscription::queue(AckMode::Auto, "orders"), service)
//!     .await?;
//! listener.start().await?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod listener;
pub mod message;
pub mod observability;
pub mod producer;
pub mod subscription;
pub mod testing;
pub mod transport;

pub use error::{Error, Result, TransportError};
pub use listener::{Listener, Service, ServiceBuilder, StopMode, SubscriptionId};
pub use message::{Destination, Message, OutboundMessage, Payload, PayloadTarget, Value, WireBody};
pub use producer::Producer;
pub use subscription::{AckMode, Subscription, TopicConsumerKind};
