//! The registrable, dispatchable handler pipeline.

use std::sync::Arc;

use tracing::error;

use crate::chain::{build_chain, Chain, Next};
use crate::context::Context;
use crate::handler::{handler_fn, wrap, BoxedHandler, Handler};
use crate::middleware::{Logger, Recovery, Static};
use crate::request::Request;
use crate::response::ResponseWriter;
use crate::server::Server;

/// An ordered stack of handlers.
///
/// Handlers run in the order they were appended. Each append rebuilds the
/// internal chain, so build the pipeline once at startup and hand it to
/// [`Server::serve`] (or [`Pipeline::run`]); from then on it is only read.
///
/// ```rust
/// use http::StatusCode;
/// use strand::{Context, Next, Pipeline, Request, ResponseWriter};
///
/// let mut app = Pipeline::default();
/// app.append_fn(|ctx: &Context, rw: &mut ResponseWriter, req: &Request, next: Next<'_>| {
///     rw.headers_mut().insert("x-powered-by", "strand".parse().unwrap());
///     next.run(ctx, rw, req);
/// });
/// app.append_fn(|_: &Context, rw: &mut ResponseWriter, _: &Request, _: Next<'_>| {
///     rw.write_header(StatusCode::NO_CONTENT);
/// });
///
/// let rw = app.dispatch(&Request::default());
/// assert_eq!(rw.status(), 204);
/// ```
#[derive(Default)]
pub struct Pipeline {
    handlers: Vec<BoxedHandler>,
    chain: Chain,
}

impl Pipeline {
    /// A pipeline pre-seeded with `handlers`, in order.
    pub fn new(handlers: Vec<BoxedHandler>) -> Self {
        let chain = build_chain(&handlers);
        Self { handlers, chain }
    }

    /// Recovery, then logging, then static files from `./public`.
    pub fn classic() -> Self {
        Self::default()
            .with(Recovery::default())
            .with(Logger::default())
            .with(Static::new("public"))
    }

    /// Appends `handler` to the end of the stack.
    pub fn append(&mut self, handler: impl Handler) {
        self.append_boxed(Arc::new(handler));
    }

    pub fn append_boxed(&mut self, handler: BoxedHandler) {
        self.handlers.push(handler);
        self.chain = build_chain(&self.handlers);
    }

    /// Appends a closure that receives the continuation. See [`handler_fn`].
    pub fn append_fn<F>(&mut self, f: F)
    where
        F: Fn(&Context, &mut ResponseWriter, &Request, Next<'_>) + Send + Sync + 'static,
    {
        self.append(handler_fn(f));
    }

    /// Appends a closure that does not see the continuation; the rest of the
    /// chain always runs after it. See [`wrap`].
    pub fn append_plain<F>(&mut self, f: F)
    where
        F: Fn(&mut ResponseWriter, &Request) + Send + Sync + 'static,
    {
        self.append(wrap(f));
    }

    /// Builder form of [`append`](Pipeline::append).
    pub fn with(mut self, handler: impl Handler) -> Self {
        self.append(handler);
        self
    }

    /// The registered handlers, in order.
    pub fn handlers(&self) -> &[BoxedHandler] {
        &self.handlers
    }

    /// The chain built from [`handlers`](Pipeline::handlers).
    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    /// Runs `req` through the whole chain under a fresh background context
    /// and returns what the handlers wrote.
    pub fn dispatch(&self, req: &Request) -> ResponseWriter {
        self.dispatch_with(&Context::background(), req)
    }

    /// Like [`dispatch`](Pipeline::dispatch) but under a caller-supplied
    /// context.
    pub fn dispatch_with(&self, ctx: &Context, req: &Request) -> ResponseWriter {
        let mut rw = ResponseWriter::new();
        self.chain.head().run(ctx, &mut rw, req);
        rw
    }

    /// Serves this pipeline on `addr` until a shutdown signal arrives.
    ///
    /// A bad address or a failed bind is logged and ends the process.
    pub async fn run(self, addr: &str) {
        let result = match Server::bind(addr) {
            Ok(server) => server.serve(self).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            error!("{e}");
            std::process::exit(1);
        }
    }
}

impl Handler for Pipeline {
    /// A pipeline nested inside another runs its own chain, then continues
    /// the outer one.
    fn serve(&self, ctx: &Context, rw: &mut ResponseWriter, req: &Request, next: Next<'_>) {
        self.chain.head().run(ctx, rw, req);
        next.run(ctx, rw, req);
    }
}
