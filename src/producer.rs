//! Producer path
//!
//! A producer owns a dedicated session and a producer channel bound to one
//! destination. Sending encodes the typed payload into a wire message and
//! hands it to the channel; transaction control is only exposed on
//! transacted sessions.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::codec;
use crate::error::{Error, Result};
use crate::message::{Destination, OutboundMessage};
use crate::subscription::AckMode;
use crate::transport::{Connection, ProducerChannel, Session};

pub struct Producer {
    destination: Destination,
    session: Arc<dyn Session>,
    channel: Box<dyn ProducerChannel>,
    transacted: bool,
    closed: Mutex<bool>,
}

impl std::fmt::Debug for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer")
            .field("destination", &self.destination)
            .field("transacted", &self.transacted)
            .finish_non_exhaustive()
    }
}

impl Producer {
    /// Create a producer with its own session on the connection.
    pub async fn attach(
        connection: &dyn Connection,
        destination: Destination,
        ack_mode: AckMode,
    ) -> Result<Self> {
        let session = connection
            .create_session(ack_mode.is_transacted(), ack_mode)
            .await?;
        let channel = session.create_producer(&destination).await?;
        info!(destination = %destination.name(), "Attached producer");
        Ok(Producer {
            destination,
            session,
            channel,
            transacted: ack_mode.is_transacted(),
            closed: Mutex::new(false),
        })
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Encode and send one outbound message.
    pub async fn send(&self, outbound: &OutboundMessage) -> Result<()> {
        if *self.closed.lock().await {
            return Err(Error::config("Producer is closed"));
        }
        let message = codec::encode(outbound)?;
        debug!(destination = %self.destination.name(), "Sending message");
        self.channel.send(message).await?;
        Ok(())
    }

    /// Commit the session's local transaction. Fails on a non-transacted
    /// producer before any transport call.
    pub async fn commit(&self) -> Result<()> {
        if !self.transacted {
            return Err(Error::config("Producer session is not transacted"));
        }
        self.session.commit().await?;
        Ok(())
    }

    /// Roll back the session's local transaction.
    pub async fn rollback(&self) -> Result<()> {
        if !self.transacted {
            return Err(Error::config("Producer session is not transacted"));
        }
        self.session.rollback().await?;
        Ok(())
    }

    /// Close the channel, then the session. Both closes are always
    /// attempted; the first failure is reported after. Safe to call twice.
    pub async fn close(&self) -> Result<()> {
        {
            let mut closed = self.closed.lock().await;
            if *closed {
                return Ok(());
            }
            *closed = true;
        }
        let channel_result = self.channel.close().await;
        let session_result = self.session.close().await;
        channel_result?;
        session_result?;
        Ok(())
    }
}
