//! Integration tests for the listener lifecycle
//!
//! Exercises attach/detach/stop against the mock transport:
//! - Client-acknowledge queue consumption end to end
//! - Subscription descriptor validation before any transport call
//! - Idempotent stop and teardown ordering

use msgbus::listener::{Listener, Service, StopMode};
use msgbus::message::{Message, Payload, PayloadTarget, WireBody};
use msgbus::subscription::{AckMode, Subscription, TopicConsumerKind, TopicSubscription};
use msgbus::testing::mocks::{ConsumerRequest, MockAcknowledger, MockConnection};
use msgbus::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

#[tokio::test]
async fn test_client_ack_queue_consumption() {
    // Arrange: a client-ack queue subscription with one text message waiting
    let connection = Arc::new(MockConnection::new());
    let acknowledger = Arc::new(MockAcknowledger::new());
    connection.queue_message(
        Message::new(WireBody::Text("hello".into())).with_ack(acknowledger.clone()),
    );
    let listener = Listener::new(connection.clone());

    let received = Arc::new(Mutex::new(Vec::new()));
    let received_clone = received.clone();
    let service = Service::builder("orders")
        .payload_target(PayloadTarget::Text)
        .on_message_with_caller(move |message, payload, caller| {
            let received = received_clone.clone();
            async move {
                caller.acknowledge(&message).await?;
                received.lock().await.push(payload);
                Ok(())
            }
        })
        .build()
        .unwrap();

    // Act
    listener
        .attach(Subscription::queue(AckMode::ClientAck, "orders"), service)
        .await
        .unwrap();
    listener.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    listener.graceful_stop().await.unwrap();

    // Assert: payload decoded as the original string and acknowledged once
    let received = received.lock().await;
    assert_eq!(received.as_slice(), &[Payload::Text("hello".to_string())]);
    assert_eq!(acknowledger.acknowledge_count(), 1);

    // The session was not transactional
    let session = connection.sessions()[0].clone();
    assert!(!session.transacted);
    assert_eq!(session.commit_count(), 0);
}

#[tokio::test]
async fn test_repeat_acknowledge_is_harmless() {
    let acknowledger = Arc::new(MockAcknowledger::new());
    let message = Message::new(WireBody::Text("hello".into())).with_ack(acknowledger.clone());

    let connection = Arc::new(MockConnection::new());
    connection.queue_message(message);
    let listener = Listener::new(connection);

    let service = Service::builder("orders")
        .payload_target(PayloadTarget::Text)
        .on_message_with_caller(|message, _payload, caller| async move {
            caller.acknowledge(&message).await?;
            caller.acknowledge(&message).await?;
            Ok(())
        })
        .build()
        .unwrap();

    listener
        .attach(Subscription::queue(AckMode::ClientAck, "orders"), service)
        .await
        .unwrap();
    listener.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    listener.graceful_stop().await.unwrap();

    assert_eq!(acknowledger.acknowledge_count(), 2);
}

#[tokio::test]
async fn test_durable_topic_without_subscriber_name_creates_no_consumer() {
    let connection = Arc::new(MockConnection::new());
    let listener = Listener::new(connection.clone());

    let descriptor = Subscription::Topic(TopicSubscription {
        ack_mode: AckMode::Auto,
        topic_name: "prices".into(),
        selector: None,
        no_local: false,
        kind: TopicConsumerKind::Durable,
        subscriber_name: None,
    });
    let service = Service::builder("prices")
        .on_message(|_message, _payload| async { Ok(()) })
        .build()
        .unwrap();

    let err = listener.attach(descriptor, service).await;

    assert!(matches!(err, Err(Error::Config { .. })));
    assert_eq!(connection.session_count(), 0);
}

#[tokio::test]
async fn test_named_topic_variants_reach_the_right_session_call() {
    let connection = Arc::new(MockConnection::new());
    let listener = Listener::new(connection.clone());

    let service = |name: &str| {
        Service::builder(name)
            .on_message(|_message, _payload| async { Ok(()) })
            .build()
            .unwrap()
    };

    listener
        .attach(
            Subscription::named_topic(
                AckMode::Auto,
                "prices",
                TopicConsumerKind::SharedDurable,
                "billing",
            )
            .unwrap()
            .with_selector("region = 'eu'"),
            service("prices"),
        )
        .await
        .unwrap();

    let requests = connection.sessions()[0].consumer_requests();
    assert_eq!(
        requests,
        vec![ConsumerRequest::SharedDurable {
            topic: "prices".into(),
            subscriber_name: "billing".into(),
            selector: Some("region = 'eu'".into()),
        }]
    );

    listener.graceful_stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_twice_has_no_further_side_effects() {
    let connection = Arc::new(MockConnection::new());
    let listener = Listener::new(connection.clone());

    let service = Service::builder("orders")
        .on_message(|_message, _payload| async { Ok(()) })
        .build()
        .unwrap();
    listener
        .attach(Subscription::queue(AckMode::Auto, "orders"), service)
        .await
        .unwrap();

    listener.stop(StopMode::Graceful).await.unwrap();
    let closes_after_first = connection.close_count();
    let session_closes_after_first = connection.sessions()[0].close_count();

    listener.stop(StopMode::Graceful).await.unwrap();

    assert_eq!(connection.close_count(), closes_after_first);
    assert_eq!(
        connection.sessions()[0].close_count(),
        session_closes_after_first
    );
}

#[tokio::test]
async fn test_immediate_stop_aborts_in_flight_handlers() {
    let connection = Arc::new(MockConnection::new());
    connection.queue_message(Message::new(WireBody::Text("slow".into())));
    let listener = Listener::new(connection.clone());

    let completed = Arc::new(AtomicUsize::new(0));
    let completed_clone = completed.clone();
    let service = Service::builder("slow")
        .payload_target(PayloadTarget::Text)
        .on_message(move |_message, _payload| {
            let completed = completed_clone.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(30)).await;
                completed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .build()
        .unwrap();

    listener
        .attach(Subscription::queue(AckMode::Auto, "slow"), service)
        .await
        .unwrap();
    listener.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Immediate stop must not wait the 30 seconds out
    tokio::time::timeout(Duration::from_secs(5), listener.immediate_stop())
        .await
        .expect("immediate stop should not wait for handlers")
        .unwrap();
    assert_eq!(completed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_detach_leaves_other_subscriptions_running() {
    let connection = Arc::new(MockConnection::new());
    let listener = Listener::new(connection.clone());

    let service = |name: &str| {
        Service::builder(name)
            .on_message(|_message, _payload| async { Ok(()) })
            .build()
            .unwrap()
    };

    let orders = listener
        .attach(Subscription::queue(AckMode::Auto, "orders"), service("orders"))
        .await
        .unwrap();
    listener
        .attach(
            Subscription::topic(AckMode::Auto, "prices"),
            service("prices"),
        )
        .await
        .unwrap();

    listener.detach(orders, StopMode::Graceful).await.unwrap();

    assert_eq!(listener.attached_count().await, 1);
    assert_eq!(connection.sessions()[0].close_count(), 1);
    assert_eq!(connection.sessions()[1].close_count(), 0);

    listener.graceful_stop().await.unwrap();
}
