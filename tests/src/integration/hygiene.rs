//! # Hygiene
//!
//! Replies the correlator must shrug off, request properties it must
//! enforce, and transport failures it must surface.

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use bus_rpc::{Correlator, CorrelatorConfig, RpcError};
    use shared_bus::{InMemoryBroker, Message, Transport, TransportError};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_malformed_replies_ignored() {
        let broker = InMemoryBroker::new();
        let (server, mut requests) = manual_server(&broker, "service/echo").await;
        let correlator = Arc::new(correlator(&broker, "careful").await);

        let call = {
            let correlator = correlator.clone();
            tokio::spawn(async move { correlator.request(Message::new("service/echo", "x")).await })
        };
        let request = next_request(&mut requests).await;
        let topic = correlator.response_topic().to_string();

        // No correlation data, garbage correlation data, unknown token
        server.publish(Message::new(topic.clone(), "bare")).await.unwrap();
        server
            .publish(Message::new(topic.clone(), "junk").with_correlation_data("not-a-token"))
            .await
            .unwrap();
        server
            .publish(
                Message::new(topic.clone(), "stranger")
                    .with_correlation_data(bus_rpc::CorrelationId::new().to_bytes()),
            )
            .await
            .unwrap();

        assert!(eventually(|| correlator.stats().total_unmatched.load(Ordering::Relaxed) == 3).await);
        assert_eq!(correlator.pending_count(), 1);

        server.publish(reply_to(&request, "genuine")).await.unwrap();
        assert_eq!(call.await.unwrap().unwrap().payload.as_ref(), b"genuine");
    }

    #[tokio::test]
    async fn test_retain_flag_cleared_on_requests() {
        let broker = InMemoryBroker::new();
        let (server, mut requests) = manual_server(&broker, "service/sticky").await;
        let correlator = Arc::new(correlator(&broker, "sticky").await);

        let call = {
            let correlator = correlator.clone();
            tokio::spawn(async move {
                correlator
                    .request(Message::new("service/sticky", "x").with_retain(true))
                    .await
            })
        };
        let request = next_request(&mut requests).await;

        assert!(!request.retain);
        assert!(broker.retained("service/sticky").is_none());
        assert_eq!(broker.stats().retained, 0);

        server.publish(reply_to(&request, "ok")).await.unwrap();
        call.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_publish_on_disconnected_session_fails() {
        let broker = InMemoryBroker::new();
        let session = broker.connect("flaky");
        let correlator = Correlator::new(session.clone(), CorrelatorConfig::new("flaky"))
            .await
            .unwrap();

        session.disconnect();
        let result = correlator.request(Message::new("service/echo", "x")).await;

        assert_eq!(result, Err(RpcError::Publish(TransportError::NotConnected)));
        assert_eq!(correlator.pending_count(), 0);
        assert_eq!(correlator.stats().total_publish_failures.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_invalid_request_topic_fails() {
        let broker = InMemoryBroker::new();
        let correlator = correlator(&broker, "sloppy").await;

        let result = correlator.request(Message::new("service/+", "x")).await;

        assert!(matches!(
            result,
            Err(RpcError::Publish(TransportError::InvalidTopic(_)))
        ));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_startup_fails_on_disconnected_session() {
        let broker = InMemoryBroker::new();
        let session = broker.connect("offline");
        session.disconnect();

        let result = Correlator::new(session, CorrelatorConfig::new("offline")).await;

        assert!(matches!(
            result,
            Err(RpcError::Subscription(TransportError::NotConnected))
        ));
    }

    #[tokio::test]
    async fn test_dropping_correlator_stops_reply_routing() {
        let broker = InMemoryBroker::new();
        let session = broker.connect("short-lived");
        let correlator = Correlator::new(session.clone(), CorrelatorConfig::new("short-lived"))
            .await
            .unwrap();
        let topic = correlator.response_topic().to_string();
        drop(correlator);

        // Still subscribed, but nothing is listening on the topic any more
        let other = broker.connect("other");
        other
            .publish(Message::new(topic, "orphan").with_correlation_data("x"))
            .await
            .unwrap();
        assert_eq!(session.subscriptions().len(), 1);
    }

    #[tokio::test]
    async fn test_one_correlator_per_reply_topic_on_a_session() {
        let broker = InMemoryBroker::new();
        let (server, mut requests) = manual_server(&broker, "service/echo").await;
        let session = broker.connect("twin");
        let first = Arc::new(
            Correlator::new(session.clone(), CorrelatorConfig::new("twin"))
                .await
                .unwrap(),
        );

        let second = Correlator::new(session.clone(), CorrelatorConfig::new("twin")).await;
        assert!(matches!(second, Err(RpcError::ResponseTopicInUse(_))));

        let call = {
            let first = first.clone();
            tokio::spawn(async move { first.request(Message::new("service/echo", "x")).await })
        };
        let request = next_request(&mut requests).await;
        server.publish(reply_to(&request, "still mine")).await.unwrap();
        assert_eq!(call.await.unwrap().unwrap().payload.as_ref(), b"still mine");

        // A distinct client id on the same session is fine
        let other = Correlator::new(session, CorrelatorConfig::new("twin-2")).await;
        assert_eq!(other.unwrap().response_topic(), "responses/twin-2");
    }
}
