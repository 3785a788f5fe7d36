//! # Concurrency
//!
//! Many requests in flight on one correlator, answered in an arbitrary
//! order, and several correlators sharing one broker.

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use futures::future::join_all;
    use rand::seq::SliceRandom;
    use shared_bus::{InMemoryBroker, Message, Transport};
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_hundred_requests_permuted_replies() {
        const REQUESTS: usize = 100;

        let broker = InMemoryBroker::new();
        let (server, mut requests) = manual_server(&broker, "service/work").await;
        let correlator = Arc::new(correlator(&broker, "worker-client").await);

        let callers: Vec<_> = (0..REQUESTS)
            .map(|i| {
                let correlator = correlator.clone();
                tokio::spawn(async move {
                    let reply = correlator
                        .request_timeout(
                            Message::new("service/work", format!("job-{i}")),
                            Duration::from_secs(5),
                        )
                        .await;
                    (i, reply)
                })
            })
            .collect();

        let mut pending = Vec::with_capacity(REQUESTS);
        for _ in 0..REQUESTS {
            pending.push(next_request(&mut requests).await);
        }

        let tokens: HashSet<_> = pending
            .iter()
            .map(|r| r.correlation_data().cloned().unwrap())
            .collect();
        assert_eq!(tokens.len(), REQUESTS, "correlation data must be unique");
        assert_eq!(correlator.pending_count(), REQUESTS);

        pending.shuffle(&mut rand::thread_rng());
        for request in &pending {
            let answer = format!("done:{}", String::from_utf8_lossy(&request.payload));
            server.publish(reply_to(request, answer)).await.unwrap();
        }

        for joined in join_all(callers).await {
            let (i, reply) = joined.unwrap();
            let reply = reply.unwrap();
            assert_eq!(reply.payload.as_ref(), format!("done:job-{i}").as_bytes());
        }
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_correlators_do_not_share_replies() {
        let broker = InMemoryBroker::new();
        let (server, mut requests) = manual_server(&broker, "service/who").await;
        let alice = Arc::new(correlator(&broker, "alice").await);
        let bob = Arc::new(correlator(&broker, "bob").await);

        let alice_call = {
            let alice = alice.clone();
            tokio::spawn(async move { alice.request(Message::new("service/who", "alice")).await })
        };
        let bob_call = {
            let bob = bob.clone();
            tokio::spawn(async move { bob.request(Message::new("service/who", "bob")).await })
        };

        for _ in 0..2 {
            let request = next_request(&mut requests).await;
            let topic = request.response_topic().unwrap().to_string();
            let expected = if request.payload.as_ref() == b"alice" {
                "responses/alice"
            } else {
                "responses/bob"
            };
            assert_eq!(topic, expected);
            server
                .publish(reply_to(&request, format!("hello {}", String::from_utf8_lossy(&request.payload))))
                .await
                .unwrap();
        }

        assert_eq!(alice_call.await.unwrap().unwrap().payload.as_ref(), b"hello alice");
        assert_eq!(bob_call.await.unwrap().unwrap().payload.as_ref(), b"hello bob");
    }

    #[tokio::test]
    async fn test_reply_to_other_client_is_unmatched() {
        let broker = InMemoryBroker::new();
        let (server, mut requests) = manual_server(&broker, "service/x").await;
        let alice = Arc::new(correlator(&broker, "alice").await);
        let bob = correlator(&broker, "bob").await;

        let call = {
            let alice = alice.clone();
            tokio::spawn(async move { alice.request(Message::new("service/x", "q")).await })
        };
        let request = next_request(&mut requests).await;

        // Alice's token on Bob's reply topic
        let mut misrouted = reply_to(&request, "wrong");
        misrouted.topic = bob.response_topic().to_string();
        server.publish(misrouted).await.unwrap();

        assert!(
            eventually(|| bob
                .stats()
                .total_unmatched
                .load(std::sync::atomic::Ordering::Relaxed)
                == 1)
            .await
        );
        assert_eq!(alice.pending_count(), 1);

        server.publish(reply_to(&request, "right")).await.unwrap();
        assert_eq!(call.await.unwrap().unwrap().payload.as_ref(), b"right");
    }
}
