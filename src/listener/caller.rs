//! Session-scoped handler callback surface
//!
//! A `Caller` is handed to handlers that asked for one. It carries the
//! session the message arrived on, so acknowledge, commit, and rollback act
//! on the right session even when many subscriptions share a listener.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::message::Message;
use crate::transport::Session;

/// Acknowledge/transaction surface scoped to one receiving session.
#[derive(Clone)]
pub struct Caller {
    session: Arc<dyn Session>,
}

impl std::fmt::Debug for Caller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Caller").finish_non_exhaustive()
    }
}

impl Caller {
    pub(crate) fn new(session: Arc<dyn Session>) -> Self {
        Caller { session }
    }

    /// Acknowledge one received message through its own acknowledge handle.
    ///
    /// Delegates unconditionally; under session ack modes other than
    /// client-acknowledge the transport decides whether the call is a no-op
    /// or an error.
    pub async fn acknowledge(&self, message: &Message) -> Result<()> {
        let ack = message.ack_handle().ok_or_else(|| {
            Error::config("Message carries no acknowledge handle".to_string())
        })?;
        ack.acknowledge().await?;
        Ok(())
    }

    /// Commit the session's local transaction.
    pub async fn commit(&self) -> Result<()> {
        self.session.commit().await?;
        Ok(())
    }

    /// Roll back the session's local transaction.
    pub async fn rollback(&self) -> Result<()> {
        self.session.rollback().await?;
        Ok(())
    }
}
