//! rpc-demo: request/response over an in-memory pub/sub broker.
//!
//! Starts a broker, an uppercasing echo responder and a correlator, fires a
//! batch of concurrent requests and reports how each one ended.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use clap::Parser;
use futures::future::join_all;
use tracing::{error, info, Instrument};

use bus_rpc::{Correlator, CorrelatorConfig, FnHandler, RequestHandler, Responder};
use bus_telemetry::{init_logging, service_span, TelemetryConfig};
use shared_bus::{InMemoryBroker, Message, QoS};

/// rpc-demo: request/response over pub/sub
#[derive(Parser, Debug)]
#[command(name = "rpc-demo")]
#[command(about = "Send concurrent requests through an in-memory broker and await the replies")]
struct Args {
    /// Number of concurrent requests
    #[arg(short = 'n', long, default_value = "10")]
    requests: usize,

    /// Per-request deadline in milliseconds
    #[arg(short, long, default_value = "1000")]
    timeout_ms: u64,

    /// Client id of the requesting side
    #[arg(short, long, default_value = "rpc-demo")]
    client_id: String,

    /// Reply topic pattern; `{client_id}` is substituted
    #[arg(long, default_value = bus_rpc::config::DEFAULT_RESPONSE_TOPIC_FMT)]
    response_topic_fmt: String,

    /// Topic the echo responder serves
    #[arg(short, long, default_value = "service/echo")]
    service_topic: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&TelemetryConfig::for_service("rpc-demo")).context("initializing logging")?;
    let span = service_span!("rpc-demo", client_id = %args.client_id);

    run(args).instrument(span).await
}

async fn run(args: Args) -> Result<()> {
    let broker = InMemoryBroker::new();

    // Serving side
    let server = broker.connect(format!("{}-server", args.client_id));
    let upper: Arc<dyn RequestHandler> = Arc::new(FnHandler(|request: &Message| -> Option<Bytes> {
        Some(Bytes::from(
            String::from_utf8_lossy(&request.payload).to_uppercase(),
        ))
    }));
    let responder = Responder::serve(server, &args.service_topic, QoS::AtLeastOnce, upper)
        .await
        .context("starting responder")?;

    // Requesting side
    let client = broker.connect(args.client_id.clone());
    let config = CorrelatorConfig::new(args.client_id.clone())
        .with_response_topic_fmt(args.response_topic_fmt.clone())
        .with_default_timeout(Some(Duration::from_millis(args.timeout_ms)));
    let correlator = Correlator::new(client, config)
        .await
        .context("starting correlator")?;

    info!(
        requests = args.requests,
        response_topic = correlator.response_topic(),
        service_topic = %args.service_topic,
        "Sending requests"
    );

    let started = Instant::now();
    let calls = (0..args.requests).map(|i| {
        let correlator = &correlator;
        let topic = args.service_topic.clone();
        async move {
            let payload = format!("request {i}");
            let result = correlator
                .request(Message::new(topic, payload.clone()).with_qos(QoS::AtLeastOnce))
                .await;
            (payload, result)
        }
    });

    let mut failures = 0usize;
    for (payload, result) in join_all(calls).await {
        match result {
            Ok(reply) => {
                let body = String::from_utf8_lossy(&reply.payload);
                if body == payload.to_uppercase() {
                    info!(request = %payload, reply = %body, "Reply received");
                } else {
                    failures += 1;
                    error!(request = %payload, reply = %body, "Reply does not match request");
                }
            }
            Err(e) => {
                failures += 1;
                error!(request = %payload, error = %e, "Request failed");
            }
        }
    }

    let stats = correlator.stats();
    let broker_stats = broker.stats();
    info!(
        elapsed_ms = started.elapsed().as_millis(),
        completed = stats.total_completed.load(Ordering::Relaxed),
        timeouts = stats.total_timeouts.load(Ordering::Relaxed),
        unmatched = stats.total_unmatched.load(Ordering::Relaxed),
        still_pending = correlator.pending_count(),
        replies_sent = responder.replies_sent(),
        published = broker_stats.published,
        delivered = broker_stats.delivered,
        "Run finished"
    );

    if failures > 0 {
        bail!("{failures} of {} requests failed", args.requests);
    }
    Ok(())
}
