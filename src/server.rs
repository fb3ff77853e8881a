//! HTTP transport and graceful shutdown.
//!
//! The server owns everything network-facing: accepting connections, HTTP/1.1
//! and HTTP/2 framing via hyper, and reading request bodies. Per request it
//! does exactly one thing with the [`Pipeline`]: a single dispatch.
//!
//! The chain is synchronous, so each dispatch runs on tokio's blocking pool,
//! one thread per in-flight request, and never stalls the reactor.
//!
//! # Graceful shutdown
//!
//! On **SIGTERM** or **Ctrl-C** the server:
//! 1. Stops accepting new connections.
//! 2. Lets every in-flight connection run to completion.
//! 3. Returns from [`Server::serve`], which lets `main` exit cleanly.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::context::Context;
use crate::error::Error;
use crate::pipeline::Pipeline;
use crate::request::Request;
use crate::response::ResponseWriter;

/// The HTTP server.
#[derive(Debug)]
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// ```rust
    /// use strand::Server;
    ///
    /// assert!(Server::bind("0.0.0.0:3000").is_ok());
    /// assert!(Server::bind("localhost").is_err());
    /// ```
    pub fn bind(addr: &str) -> Result<Self, Error> {
        let parsed = addr
            .parse()
            .map_err(|source| Error::Addr { addr: addr.to_owned(), source })?;
        Ok(Self { addr: parsed })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Binds, then dispatches every request through `pipeline` until a
    /// shutdown signal arrives and in-flight connections have drained.
    pub async fn serve(self, pipeline: Pipeline) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, "strand listening");
        serve_on(listener, pipeline, shutdown_signal()).await
    }
}

/// Serves `pipeline` on an already-bound listener until `shutdown` resolves,
/// then drains in-flight connections.
pub async fn serve_on<F>(listener: TcpListener, pipeline: Pipeline, shutdown: F) -> Result<(), Error>
where
    F: Future<Output = ()>,
{
    // Shared read-only across connection tasks; no more appends from here.
    let pipeline = Arc::new(pipeline);

    let mut tasks = tokio::task::JoinSet::new();

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            // Shutdown is checked first so a signal stops accepting at once,
            // even with connections queued.
            biased;

            () = &mut shutdown => {
                info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                break;
            }

            res = listener.accept() => {
                let (stream, remote_addr) = match res {
                    Ok(v) => v,
                    Err(e) => {
                        error!("accept error: {e}");
                        continue;
                    }
                };

                let pipeline = Arc::clone(&pipeline);
                let io = TokioIo::new(stream);

                tasks.spawn(async move {
                    // Called once per request on the connection.
                    let svc = service_fn(move |req| dispatch(Arc::clone(&pipeline), req));

                    if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                        .serve_connection(io, svc)
                        .await
                    {
                        error!(peer = %remote_addr, "connection error: {e}");
                    }
                });
            }

            // Reap finished connection tasks so the set stays bounded.
            Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
        }
    }

    while tasks.join_next().await.is_some() {}

    info!("strand stopped");
    Ok(())
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Buffers the body, runs the chain on the blocking pool, and converts the
/// sink into hyper's response. All failures become responses, so hyper
/// never sees an error.
async fn dispatch(
    pipeline: Arc<Pipeline>,
    req: hyper::Request<Incoming>,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("failed to read request body: {e}");
            return Ok(bare(StatusCode::BAD_REQUEST));
        }
    };
    let req = Request::from_parts(parts, body);

    let (ctx, cancel) = Context::background().with_cancel();
    // hyper drops this future when the client goes away; the guard turns
    // that into cancellation visible to handlers.
    let _guard = cancel.drop_guard();

    let method = req.method().clone();
    let path = req.path().to_owned();
    let joined = tokio::task::spawn_blocking(move || pipeline.dispatch_with(&ctx, &req)).await;

    match joined {
        Ok(rw) => Ok(rw.into_response()),
        Err(e) => {
            error!(%method, path = %path, "handler failed without recovery: {e}");
            Ok(bare(StatusCode::INTERNAL_SERVER_ERROR))
        }
    }
}

fn bare(status: StatusCode) -> http::Response<Full<Bytes>> {
    let mut rw = ResponseWriter::new();
    rw.write_header(status);
    rw.into_response()
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or SIGINT. Only Ctrl-C on non-Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
