//! `qws` binary.
//!
//! `serve` accepts WebSocket connections and logs every payload, resuming
//! each client session where it left off. `send` connects to an endpoint and
//! emits batches of test messages before closing cooperatively.

mod cli;

use std::{
    collections::HashMap,
    error::Error,
    net::SocketAddr,
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use bytes::Bytes;
use clap::Parser;
use cli::{Cli, Command, SESSION_ARG, SendArgs};
use qws::{Payload, Qws, QwsOptions, handshake, message::ExtraHeaders, transport::websocket};
use serde_json::json;
use tokio::{
    net::{TcpListener, TcpStream},
    signal,
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, error, info, warn};
use url::Url;

/// Next expected sequence number per client session.
///
/// A session is the request path plus the client's `session` query argument.
/// Clients that name no session start from zero on every connection and rely
/// on redelivery instead.
#[derive(Clone, Debug, Default)]
struct Cursors(Arc<Mutex<HashMap<String, u64>>>);

impl Cursors {
    fn session_key(url: &Url) -> Option<String> {
        handshake::query_params(url)
            .remove(SESSION_ARG)
            .map(|session| format!("{}#{session}", url.path()))
    }

    fn advance(&self, key: Option<&str>, idx: Option<u64>) {
        let (Some(key), Some(idx)) = (key, idx) else { return };
        let mut cursors = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        let next = cursors.entry(key.to_owned()).or_default();
        *next = (*next).max(idx.saturating_add(1));
    }

    fn resume_from(&self, key: Option<&str>) -> u64 {
        let Some(key) = key else { return 0 };
        let cursors = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        cursors.get(key).copied().unwrap_or_default()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    if let Some(addr) = cli.metrics_addr {
        install_metrics(addr)?;
    }
    match cli.command {
        Command::Serve { addr } => serve(addr).await,
        Command::Send(args) => send(args).await,
    }
}

#[cfg(feature = "metrics")]
fn install_metrics(addr: SocketAddr) -> Result<(), Box<dyn Error>> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    info!(%addr, "serving metrics");
    Ok(())
}

#[cfg(not(feature = "metrics"))]
fn install_metrics(addr: SocketAddr) -> Result<(), Box<dyn Error>> {
    warn!(%addr, "built without the metrics feature, ignoring --metrics-addr");
    Ok(())
}

#[expect(
    clippy::integer_division_remainder_used,
    reason = "tokio::select! expands to modulus internally"
)]
async fn serve(addr: SocketAddr) -> Result<(), Box<dyn Error>> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");

    let cursors = Cursors::default();
    let shutdown = CancellationToken::new();
    let tracker = TaskTracker::new();
    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracker.spawn(serve_peer(stream, peer, cursors.clone(), shutdown.clone()));
                }
                Err(error) => warn!(%error, "accept failed"),
            },
        }
    }

    info!("shutting down, closing connections");
    shutdown.cancel();
    tracker.close();
    tracker.wait().await;
    Ok(())
}

#[expect(
    clippy::integer_division_remainder_used,
    reason = "tokio::select! expands to modulus internally"
)]
async fn serve_peer(stream: TcpStream, peer: SocketAddr, cursors: Cursors, shutdown: CancellationToken) {
    let (transport, url) = match websocket::accept(stream).await {
        Ok(accepted) => accepted,
        Err(error) => {
            warn!(%peer, %error, "websocket handshake failed");
            return;
        }
    };
    let path = url.path().to_owned();
    let session = Cursors::session_key(&url);
    info!(%peer, %path, ?session, "client connected");

    let resume = (cursors.clone(), session.clone());
    let json_seen = (cursors.clone(), session.clone());
    let bin_seen = (cursors, session);
    let qws = Qws::builder()
        .options(QwsOptions::default().name(path))
        .on_connect(move || {
            let next = resume.0.resume_from(resume.1.as_deref());
            async move { Ok(next) }
        })
        .on_json(move |inbound| {
            info!(idx = ?inbound.headers.idx, body = %inbound.body, "> JSON");
            json_seen.0.advance(json_seen.1.as_deref(), inbound.headers.idx);
            async { Ok(()) }
        })
        .on_bin(move |inbound| {
            info!(
                idx = ?inbound.headers.idx,
                extra = ?inbound.headers.extra,
                body = %String::from_utf8_lossy(&inbound.body),
                "> BIN"
            );
            bin_seen.0.advance(bin_seen.1.as_deref(), inbound.headers.idx);
            async { Ok(()) }
        })
        .on_error(|error| warn!(%error, "connection error"))
        .adopt(transport);

    let handle = qws.handle();
    let join = qws.join();
    tokio::pin!(join);
    let outcome = tokio::select! {
        outcome = &mut join => outcome,
        () = shutdown.cancelled() => {
            if let Err(error) = handle.close() {
                debug!(%error, "connection already finished");
            }
            join.await
        }
    };
    match outcome {
        Ok(()) => info!(%peer, "client disconnected"),
        Err(error) => warn!(%peer, %error, "client connection failed"),
    }
}

/// Session name unique to this sender process.
fn new_session() -> String {
    let started = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    format!("{}-{started}", std::process::id())
}

async fn send(args: SendArgs) -> Result<(), Box<dyn Error>> {
    let options = QwsOptions::default()
        .name("sender")
        .extra_connect_arg(SESSION_ARG, args.session.clone().unwrap_or_else(new_session))
        .reconnect_num_tries(args.reconnect_tries)
        .reconnect_interval(Duration::from_millis(args.reconnect_interval_ms));
    let qws = Qws::builder()
        .options(options)
        .on_ready(|ready_idx| info!(ready_idx, "peer ready"))
        .on_erroneous_disconnect(|reason| warn!(%reason, "connection lost, reconnecting"))
        .on_error(|error| error!(%error, "connection error"))
        .on_close(|| info!("closed"))
        .connect(&args.url)?;

    let body = Bytes::from_static(b"1234567890-1234567890");
    let mut extra = ExtraHeaders::new();
    extra.insert("extraHeaderKey".to_owned(), json!("extraHeaderValue"));

    let mut ticker = tokio::time::interval(Duration::from_millis(args.interval_ms.max(1)));
    for batch in 0..args.count {
        ticker.tick().await;
        info!(batch, "sending messages");
        qws.send_json(&args.route, &json!({ "message": "Hello World", "batch": batch }))?;
        qws.send_bin(&args.route, body.clone())?;
        qws.send(Payload::bin(&args.route, body.clone()).with_extra_headers(extra.clone()))?;
    }

    qws.close()?;
    let stats = qws.stats();
    info!(unacked = stats.unacked_messages, "waiting for acknowledgments");
    qws.join().await?;
    Ok(())
}
