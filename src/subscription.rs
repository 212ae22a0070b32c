//! Subscription descriptors and consumer resolution
//!
//! A subscription is either a queue subscription or a topic subscription in
//! one of four consumer variants. Durable, shared, and shared-durable
//! variants are keyed by a subscriber name, which must be non-empty — that
//! is enforced at construction and re-checked before any transport call for
//! descriptors deserialized straight from configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::message::Destination;
use crate::transport::{Consumer, Session};

/// Session acknowledgement mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckMode {
    /// Local transaction; acceptance happens at `commit`
    Transacted,
    /// Session acknowledges on successful receipt
    #[default]
    Auto,
    /// Application acknowledges explicitly
    ClientAck,
    /// Lazy acknowledgement, duplicates tolerated
    DupsOkAck,
}

impl AckMode {
    /// Whether sessions created for this mode are transactional.
    pub fn is_transacted(&self) -> bool {
        matches!(self, AckMode::Transacted)
    }
}

/// Topic consumer variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicConsumerKind {
    Default,
    Durable,
    Shared,
    SharedDurable,
}

impl TopicConsumerKind {
    /// Variants keyed by a subscriber name.
    pub fn requires_subscriber_name(&self) -> bool {
        !matches!(self, TopicConsumerKind::Default)
    }
}

/// Queue subscription descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSubscription {
    pub ack_mode: AckMode,
    pub queue_name: String,
    pub selector: Option<String>,
}

/// Topic subscription descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicSubscription {
    pub ack_mode: AckMode,
    pub topic_name: String,
    pub selector: Option<String>,
    #[serde(default)]
    pub no_local: bool,
    #[serde(default = "default_consumer_kind")]
    pub kind: TopicConsumerKind,
    pub subscriber_name: Option<String>,
}

fn default_consumer_kind() -> TopicConsumerKind {
    TopicConsumerKind::Default
}

/// Subscription descriptor, variant over queue and topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Subscription {
    Queue(QueueSubscription),
    Topic(TopicSubscription),
}

impl Subscription {
    /// Queue subscription descriptor.
    pub fn queue(ack_mode: AckMode, queue_name: impl Into<String>) -> Self {
        Subscription::Queue(QueueSubscription {
            ack_mode,
            queue_name: queue_name.into(),
            selector: None,
        })
    }

    /// Topic subscription descriptor in the default variant.
    pub fn topic(ack_mode: AckMode, topic_name: impl Into<String>) -> Self {
        Subscription::Topic(TopicSubscription {
            ack_mode,
            topic_name: topic_name.into(),
            selector: None,
            no_local: false,
            kind: TopicConsumerKind::Default,
            subscriber_name: None,
        })
    }

    /// Topic subscription in a named variant. Fails at construction when a
    /// durable/shared variant lacks a non-empty subscriber name.
    pub fn named_topic(
        ack_mode: AckMode,
        topic_name: impl Into<String>,
        kind: TopicConsumerKind,
        subscriber_name: impl Into<String>,
    ) -> Result<Self> {
        let descriptor = Subscription::Topic(TopicSubscription {
            ack_mode,
            topic_name: topic_name.into(),
            selector: None,
            no_local: false,
            kind,
            subscriber_name: Some(subscriber_name.into()),
        });
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Add a message selector.
    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        match &mut self {
            Subscription::Queue(queue) => queue.selector = Some(selector.into()),
            Subscription::Topic(topic) => topic.selector = Some(selector.into()),
        }
        self
    }

    /// Suppress locally published messages (topic subscriptions).
    pub fn no_local(mut self) -> Self {
        if let Subscription::Topic(topic) = &mut self {
            topic.no_local = true;
        }
        self
    }

    pub fn ack_mode(&self) -> AckMode {
        match self {
            Subscription::Queue(queue) => queue.ack_mode,
            Subscription::Topic(topic) => topic.ack_mode,
        }
    }

    /// Destination this subscription consumes from.
    pub fn destination(&self) -> Destination {
        match self {
            Subscription::Queue(queue) => Destination::Queue(queue.queue_name.clone()),
            Subscription::Topic(topic) => Destination::Topic(topic.topic_name.clone()),
        }
    }

    /// Validate the descriptor shape. Deserialized descriptors go through
    /// this before any transport call is made.
    pub fn validate(&self) -> Result<()> {
        if let Subscription::Topic(topic) = self {
            if topic.kind.requires_subscriber_name() {
                let named = topic
                    .subscriber_name
                    .as_deref()
                    .is_some_and(|name| !name.is_empty());
                if !named {
                    return Err(Error::config(format!(
                        "Subscriber name is required for {:?} consumer kind",
                        topic.kind
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Create a consumer handle for a subscription descriptor.
///
/// Deterministic decision table over destination, consumer variant, and
/// selector presence. Descriptor-shape failures surface before any
/// transport call; transport failures pass through unchanged.
pub async fn resolve_consumer(
    session: &dyn Session,
    subscription: &Subscription,
) -> Result<Box<dyn Consumer>> {
    subscription.validate()?;

    match subscription {
        Subscription::Queue(queue) => {
            let destination = Destination::Queue(queue.queue_name.clone());
            let consumer = session
                .create_consumer(&destination, nonempty(&queue.selector), false)
                .await?;
            Ok(consumer)
        }
        Subscription::Topic(topic) => {
            let selector = nonempty(&topic.selector);
            let consumer = match topic.kind {
                TopicConsumerKind::Default => {
                    let destination = Destination::Topic(topic.topic_name.clone());
                    session
                        .create_consumer(&destination, selector, topic.no_local)
                        .await?
                }
                TopicConsumerKind::Durable => {
                    // validate() guarantees the name is present and non-empty
                    let name = topic.subscriber_name.as_deref().unwrap_or_default();
                    session
                        .create_durable_consumer(&topic.topic_name, name, selector, topic.no_local)
                        .await?
                }
                TopicConsumerKind::Shared => {
                    let name = topic.subscriber_name.as_deref().unwrap_or_default();
                    session
                        .create_shared_consumer(&topic.topic_name, name, selector)
                        .await?
                }
                TopicConsumerKind::SharedDurable => {
                    let name = topic.subscriber_name.as_deref().unwrap_or_default();
                    session
                        .create_shared_durable_consumer(&topic.topic_name, name, selector)
                        .await?
                }
            };
            Ok(consumer)
        }
    }
}

fn nonempty(selector: &Option<String>) -> Option<&str> {
    selector.as_deref().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_mode_transacted() {
        assert!(AckMode::Transacted.is_transacted());
        assert!(!AckMode::Auto.is_transacted());
        assert!(!AckMode::ClientAck.is_transacted());
        assert!(!AckMode::DupsOkAck.is_transacted());
    }

    #[test]
    fn test_named_variants_require_subscriber_name() {
        for kind in [
            TopicConsumerKind::Durable,
            TopicConsumerKind::Shared,
            TopicConsumerKind::SharedDurable,
        ] {
            let err = Subscription::named_topic(AckMode::Auto, "prices", kind, "");
            assert!(err.is_err(), "{kind:?} should reject empty subscriber name");
            assert!(matches!(err.unwrap_err(), Error::Config { .. }));

            let ok = Subscription::named_topic(AckMode::Auto, "prices", kind, "sub-1");
            assert!(ok.is_ok(), "{kind:?} should accept a non-empty name");
        }
    }

    #[test]
    fn test_default_topic_needs_no_subscriber_name() {
        let subscription = Subscription::topic(AckMode::Auto, "prices");
        assert!(subscription.validate().is_ok());
    }

    #[test]
    fn test_validate_catches_deserialized_descriptor() {
        // A descriptor coming from config bypasses the constructors
        let subscription = Subscription::Topic(TopicSubscription {
            ack_mode: AckMode::ClientAck,
            topic_name: "prices".into(),
            selector: None,
            no_local: false,
            kind: TopicConsumerKind::Durable,
            subscriber_name: None,
        });
        assert!(matches!(
            subscription.validate(),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn test_destination_and_builders() {
        let subscription = Subscription::queue(AckMode::ClientAck, "orders")
            .with_selector("kind = 'refund'");
        assert_eq!(
            subscription.destination(),
            Destination::Queue("orders".into())
        );
        assert_eq!(subscription.ack_mode(), AckMode::ClientAck);

        let subscription = Subscription::topic(AckMode::Auto, "prices").no_local();
        match subscription {
            Subscription::Topic(topic) => assert!(topic.no_local),
            _ => panic!("expected topic subscription"),
        }
    }

    #[test]
    fn test_descriptor_deserializes_from_toml() {
        let queue: Subscription = toml::from_str(
            r#"
            ack_mode = "client_ack"
            queue_name = "orders"
            "#,
        )
        .unwrap();
        assert!(matches!(queue, Subscription::Queue(_)));

        let topic: Subscription = toml::from_str(
            r#"
            ack_mode = "auto"
            topic_name = "prices"
            kind = "shared_durable"
            subscriber_name = "billing"
            "#,
        )
        .unwrap();
        match &topic {
            Subscription::Topic(t) => {
                assert_eq!(t.kind, TopicConsumerKind::SharedDurable);
                assert_eq!(t.subscriber_name.as_deref(), Some("billing"));
            }
            _ => panic!("expected topic subscription"),
        }
        assert!(topic.validate().is_ok());
    }
}
