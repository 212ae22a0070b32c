//! Message service descriptors
//!
//! A service bundles the application's message handler, an optional error
//! handler, and the payload type it expects. Handler shape is fixed at
//! construction: the dispatch path only ever sees boxed async closures, so
//! an ill-formed service cannot reach a receive loop.

use std::future::Future;
use std::pin::Pin;

use crate::config::PollConfig;
use crate::error::{Error, Result};
use crate::listener::caller::Caller;
use crate::message::{Message, Payload, PayloadTarget};

/// Boxed future returned by handler closures.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// The message handler in one of its two accepted shapes.
pub enum OnMessage {
    /// Handler taking the message and its decoded payload
    Message(Box<dyn Fn(Message, Payload) -> HandlerFuture + Send + Sync>),
    /// Handler additionally taking a session-scoped caller for
    /// acknowledge/commit/rollback
    WithCaller(Box<dyn Fn(Message, Payload, Caller) -> HandlerFuture + Send + Sync>),
}

impl OnMessage {
    /// Whether dispatch must construct a caller for this handler.
    pub fn wants_caller(&self) -> bool {
        matches!(self, OnMessage::WithCaller(_))
    }
}

impl std::fmt::Debug for OnMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OnMessage::Message(_) => f.write_str("OnMessage::Message"),
            OnMessage::WithCaller(_) => f.write_str("OnMessage::WithCaller"),
        }
    }
}

/// Error handler closure.
pub type OnError = Box<dyn Fn(Error) -> HandlerFuture + Send + Sync>;

/// An attached service: handlers plus the payload shape they expect.
pub struct Service {
    name: String,
    payload_target: PayloadTarget,
    poll: PollConfig,
    on_message: OnMessage,
    on_error: Option<OnError>,
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name)
            .field("payload_target", &self.payload_target)
            .field("poll", &self.poll)
            .field("on_message", &self.on_message)
            .field("has_on_error", &self.on_error.is_some())
            .finish()
    }
}

impl Service {
    pub fn builder(name: impl Into<String>) -> ServiceBuilder {
        ServiceBuilder {
            name: name.into(),
            payload_target: PayloadTarget::Any,
            poll: PollConfig::default(),
            on_message: None,
            on_error: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload_target(&self) -> PayloadTarget {
        self.payload_target
    }

    pub fn poll(&self) -> PollConfig {
        self.poll
    }

    pub fn on_message(&self) -> &OnMessage {
        &self.on_message
    }

    pub fn on_error(&self) -> Option<&OnError> {
        self.on_error.as_ref()
    }

    /// Invoke the error handler when one is registered, otherwise log.
    pub async fn report_error(&self, error: Error) {
        match &self.on_error {
            Some(handler) => {
                if let Err(secondary) = handler(error).await {
                    tracing::error!(
                        service = %self.name,
                        error = %secondary,
                        "Error handler itself failed"
                    );
                }
            }
            None => {
                tracing::error!(service = %self.name, error = %error, "Unhandled service error");
            }
        }
    }
}

/// Builder for [`Service`]. `build` fails when no message handler was set.
pub struct ServiceBuilder {
    name: String,
    payload_target: PayloadTarget,
    poll: PollConfig,
    on_message: Option<OnMessage>,
    on_error: Option<OnError>,
}

impl ServiceBuilder {
    /// Declare the payload shape messages decode into before dispatch.
    pub fn payload_target(mut self, target: PayloadTarget) -> Self {
        self.payload_target = target;
        self
    }

    /// Override receive-loop tuning for this service.
    pub fn poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Handler receiving the message and its decoded payload.
    pub fn on_message<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Message, Payload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.on_message = Some(OnMessage::Message(Box::new(move |message, payload| {
            Box::pin(handler(message, payload))
        })));
        self
    }

    /// Handler additionally receiving a session-scoped caller.
    pub fn on_message_with_caller<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Message, Payload, Caller) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.on_message = Some(OnMessage::WithCaller(Box::new(
            move |message, payload, caller| Box::pin(handler(message, payload, caller)),
        )));
        self
    }

    /// Handler invoked with decode and dispatch errors.
    pub fn on_error<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Error) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.on_error = Some(Box::new(move |error| Box::pin(handler(error))));
        self
    }

    pub fn build(self) -> Result<Service> {
        let on_message = self.on_message.ok_or_else(|| {
            Error::config(format!(
                "Service '{}' must declare a message handler",
                self.name
            ))
        })?;
        Ok(Service {
            name: self.name,
            payload_target: self.payload_target,
            poll: self.poll,
            on_message,
            on_error: self.on_error,
        })
    }
}
