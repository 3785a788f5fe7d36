//! # Cancellation
//!
//! Requests that end without a reply: deadlines, caller cancellation and
//! dropped futures. Replies arriving afterwards must be discarded without
//! reaching anyone.

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use bus_rpc::RpcError;
    use shared_bus::{InMemoryBroker, Message, Transport};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_timeout_without_responder() {
        let broker = InMemoryBroker::new();
        let correlator = correlator(&broker, "lonely").await;

        let started = Instant::now();
        let result = correlator
            .request_timeout(Message::new("service/nobody", "hello?"), Duration::from_millis(10))
            .await;

        assert_eq!(result, Err(RpcError::TimedOut(Duration::from_millis(10))));
        assert!(started.elapsed() >= Duration::from_millis(10));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(correlator.pending_count(), 0);
        assert_eq!(correlator.stats().total_timeouts.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_reply_after_timeout_discarded() {
        let broker = InMemoryBroker::new();
        let (server, mut requests) = manual_server(&broker, "service/slow").await;
        let correlator = correlator(&broker, "impatient").await;

        let result = correlator
            .request_timeout(Message::new("service/slow", "x"), Duration::from_millis(20))
            .await;
        assert!(result.unwrap_err().is_timeout());

        let request = next_request(&mut requests).await;
        server.publish(reply_to(&request, "too late")).await.unwrap();

        assert!(eventually(|| correlator.stats().total_unmatched.load(Ordering::Relaxed) == 1).await);
        assert_eq!(correlator.stats().total_completed.load(Ordering::Relaxed), 0);
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_then_late_reply() {
        let broker = InMemoryBroker::new();
        let (server, mut requests) = manual_server(&broker, "service/slow").await;
        let correlator = Arc::new(correlator(&broker, "fickle").await);
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();

        let call = {
            let correlator = correlator.clone();
            tokio::spawn(async move {
                correlator
                    .request_with_cancel(Message::new("service/slow", "x"), None, async {
                        let _ = cancel_rx.await;
                    })
                    .await
            })
        };

        let request = next_request(&mut requests).await;
        cancel_tx.send(()).unwrap();

        let result = call.await.unwrap();
        assert_eq!(result, Err(RpcError::Cancelled));
        assert_eq!(correlator.pending_count(), 0);

        server.publish(reply_to(&request, "too late")).await.unwrap();
        assert!(eventually(|| correlator.stats().total_unmatched.load(Ordering::Relaxed) == 1).await);
        assert_eq!(correlator.stats().total_cancelled.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_aborted_caller_withdraws_request() {
        let broker = InMemoryBroker::new();
        let (server, mut requests) = manual_server(&broker, "service/slow").await;
        let correlator = Arc::new(correlator(&broker, "quitter").await);

        let call = {
            let correlator = correlator.clone();
            tokio::spawn(async move { correlator.request(Message::new("service/slow", "x")).await })
        };

        let request = next_request(&mut requests).await;
        assert_eq!(correlator.pending_count(), 1);

        call.abort();
        let _ = call.await;
        assert_eq!(correlator.pending_count(), 0);

        server.publish(reply_to(&request, "nobody home")).await.unwrap();
        assert!(eventually(|| correlator.stats().total_unmatched.load(Ordering::Relaxed) == 1).await);
    }

    #[tokio::test]
    async fn test_timeout_does_not_disturb_other_requests() {
        let broker = InMemoryBroker::new();
        let (server, mut requests) = manual_server(&broker, "service/mixed").await;
        let correlator = Arc::new(correlator(&broker, "mixed").await);

        let short = {
            let correlator = correlator.clone();
            tokio::spawn(async move {
                correlator
                    .request_timeout(Message::new("service/mixed", "short"), Duration::from_millis(10))
                    .await
            })
        };
        let long = {
            let correlator = correlator.clone();
            tokio::spawn(async move {
                correlator
                    .request_timeout(Message::new("service/mixed", "long"), Duration::from_secs(5))
                    .await
            })
        };

        let mut seen = Vec::new();
        for _ in 0..2 {
            seen.push(next_request(&mut requests).await);
        }
        assert!(short.await.unwrap().unwrap_err().is_timeout());

        let long_request = seen
            .iter()
            .find(|r| r.payload.as_ref() == b"long")
            .unwrap();
        server.publish(reply_to(long_request, "finally")).await.unwrap();

        assert_eq!(long.await.unwrap().unwrap().payload.as_ref(), b"finally");
        assert_eq!(correlator.pending_count(), 0);
    }
}
