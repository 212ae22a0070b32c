//! Mock implementations for testing
//!
//! In-memory Connection/Session/Consumer/ProducerChannel implementations so
//! the lifecycle, dispatch, and producer paths can be tested without a
//! broker. Every mock records the calls it sees and can be scripted to fail.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::error::TransportError;
use crate::message::{Destination, Message};
use crate::subscription::AckMode;
use crate::transport::{Acknowledger, Connection, Consumer, ProducerChannel, Session};

/// One recorded consumer-creation call.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsumerRequest {
    Plain {
        destination: Destination,
        selector: Option<String>,
        no_local: bool,
    },
    Durable {
        topic: String,
        subscriber_name: String,
        selector: Option<String>,
        no_local: bool,
    },
    Shared {
        topic: String,
        subscriber_name: String,
        selector: Option<String>,
    },
    SharedDurable {
        topic: String,
        subscriber_name: String,
        selector: Option<String>,
    },
}

/// Mock broker connection for testing.
#[derive(Default)]
pub struct MockConnection {
    sessions: StdMutex<Vec<Arc<MockSession>>>,
    /// Messages handed to the next session created on this connection
    pending_messages: StdMutex<VecDeque<Message>>,
    started: AtomicBool,
    stopped: AtomicBool,
    close_calls: AtomicUsize,
    pub should_fail: bool,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure() -> Self {
        MockConnection {
            should_fail: true,
            ..Default::default()
        }
    }

    /// Queue a message for delivery through the next session created on
    /// this connection.
    pub fn queue_message(&self, message: Message) {
        self.pending_messages.lock().unwrap().push_back(message);
    }

    pub fn sessions(&self) -> Vec<Arc<MockSession>> {
        self.sessions.lock().unwrap().clone()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.close_calls.load(Ordering::SeqCst) > 0
    }

    pub fn close_count(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn start(&self) -> Result<(), TransportError> {
        if self.should_fail {
            return Err(TransportError::broker("Mock connection start failure"));
        }
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create_session(
        &self,
        transacted: bool,
        ack_mode: AckMode,
    ) -> Result<Arc<dyn Session>, TransportError> {
        if self.should_fail {
            return Err(TransportError::broker("Mock session creation failure"));
        }
        let session = Arc::new(MockSession {
            transacted,
            ack_mode,
            ..Default::default()
        });
        {
            let mut pending = self.pending_messages.lock().unwrap();
            while let Some(message) = pending.pop_front() {
                session.queue_message(message);
            }
        }
        self.sessions.lock().unwrap().push(session.clone());
        Ok(session)
    }
}

/// Mock session recording consumer/producer creation and transaction calls.
#[derive(Default)]
pub struct MockSession {
    pub transacted: bool,
    pub ack_mode: AckMode,
    consumer_requests: StdMutex<Vec<ConsumerRequest>>,
    /// Messages the next created consumer will deliver
    pending_messages: StdMutex<VecDeque<Message>>,
    sent: Arc<Mutex<Vec<Message>>>,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
    close_calls: AtomicUsize,
    pub fail_consumer_creation: bool,
}

impl MockSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a message for delivery by the next consumer created on this
    /// session.
    pub fn queue_message(&self, message: Message) {
        self.pending_messages.lock().unwrap().push_back(message);
    }

    pub fn consumer_requests(&self) -> Vec<ConsumerRequest> {
        self.consumer_requests.lock().unwrap().clone()
    }

    pub async fn sent_messages(&self) -> Vec<Message> {
        self.sent.lock().await.clone()
    }

    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn rollback_count(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    fn new_consumer(&self) -> Box<dyn Consumer> {
        let consumer = MockConsumer::new();
        let mut pending = self.pending_messages.lock().unwrap();
        let mut queue = consumer.queue.lock().unwrap();
        while let Some(message) = pending.pop_front() {
            queue.push_back(Ok(Some(message)));
        }
        drop(queue);
        Box::new(consumer)
    }
}

#[async_trait]
impl Session for MockSession {
    async fn create_consumer(
        &self,
        destination: &Destination,
        selector: Option<&str>,
        no_local: bool,
    ) -> Result<Box<dyn Consumer>, TransportError> {
        if self.fail_consumer_creation {
            return Err(TransportError::broker("Mock consumer creation failure"));
        }
        self.consumer_requests
            .lock()
            .unwrap()
            .push(ConsumerRequest::Plain {
                destination: destination.clone(),
                selector: selector.map(str::to_string),
                no_local,
            });
        Ok(self.new_consumer())
    }

    async fn create_durable_consumer(
        &self,
        topic: &str,
        subscriber_name: &str,
        selector: Option<&str>,
        no_local: bool,
    ) -> Result<Box<dyn Consumer>, TransportError> {
        if self.fail_consumer_creation {
            return Err(TransportError::broker("Mock consumer creation failure"));
        }
        self.consumer_requests
            .lock()
            .unwrap()
            .push(ConsumerRequest::Durable {
                topic: topic.to_string(),
                subscriber_name: subscriber_name.to_string(),
                selector: selector.map(str::to_string),
                no_local,
            });
        Ok(self.new_consumer())
    }

    async fn create_shared_consumer(
        &self,
        topic: &str,
        subscriber_name: &str,
        selector: Option<&str>,
    ) -> Result<Box<dyn Consumer>, TransportError> {
        if self.fail_consumer_creation {
            return Err(TransportError::broker("Mock consumer creation failure"));
        }
        self.consumer_requests
            .lock()
            .unwrap()
            .push(ConsumerRequest::Shared {
                topic: topic.to_string(),
                subscriber_name: subscriber_name.to_string(),
                selector: selector.map(str::to_string),
            });
        Ok(self.new_consumer())
    }

    async fn create_shared_durable_consumer(
        &self,
        topic: &str,
        subscriber_name: &str,
        selector: Option<&str>,
    ) -> Result<Box<dyn Consumer>, TransportError> {
        if self.fail_consumer_creation {
            return Err(TransportError::broker("Mock consumer creation failure"));
        }
        self.consumer_requests
            .lock()
            .unwrap()
            .push(ConsumerRequest::SharedDurable {
                topic: topic.to_string(),
                subscriber_name: subscriber_name.to_string(),
                selector: selector.map(str::to_string),
            });
        Ok(self.new_consumer())
    }

    async fn create_producer(
        &self,
        _destination: &Destination,
    ) -> Result<Box<dyn ProducerChannel>, TransportError> {
        Ok(Box::new(MockProducerChannel {
            sent: self.sent.clone(),
            close_calls: Arc::new(AtomicUsize::new(0)),
        }))
    }

    async fn commit(&self) -> Result<(), TransportError> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self) -> Result<(), TransportError> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

type ReceiveOutcome = Result<Option<Message>, TransportError>;

/// Mock consumer delivering scripted receive outcomes in order.
#[derive(Default)]
pub struct MockConsumer {
    queue: StdMutex<VecDeque<ReceiveOutcome>>,
    close_calls: AtomicUsize,
}

impl MockConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push_message(&self, message: Message) {
        self.queue.lock().unwrap().push_back(Ok(Some(message)));
    }

    pub async fn push_error(&self, error: TransportError) {
        self.queue.lock().unwrap().push_back(Err(error));
    }

    pub fn is_closed(&self) -> bool {
        self.close_calls.load(Ordering::SeqCst) > 0
    }

    pub fn close_count(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Consumer for MockConsumer {
    async fn receive(&self, timeout: Duration) -> ReceiveOutcome {
        let outcome = self.queue.lock().unwrap().pop_front();
        match outcome {
            Some(outcome) => outcome,
            None => {
                // Nothing scripted: behave like an elapsed receive timeout
                tokio::time::sleep(timeout.min(Duration::from_millis(10))).await;
                Ok(None)
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Mock producer channel recording sent messages into the owning session.
pub struct MockProducerChannel {
    sent: Arc<Mutex<Vec<Message>>>,
    close_calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ProducerChannel for MockProducerChannel {
    async fn send(&self, message: Message) -> Result<(), TransportError> {
        self.sent.lock().await.push(message);
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Mock per-message acknowledge handle.
#[derive(Default)]
pub struct MockAcknowledger {
    acknowledged: AtomicUsize,
    pub should_fail: bool,
}

impl MockAcknowledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acknowledge_count(&self) -> usize {
        self.acknowledged.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Acknowledger for MockAcknowledger {
    async fn acknowledge(&self) -> Result<(), TransportError> {
        if self.should_fail {
            return Err(TransportError::broker("Mock acknowledge failure"));
        }
        self.acknowledged.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
