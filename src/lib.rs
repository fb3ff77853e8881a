//! # strand
//!
//! An ordered middleware chain for HTTP services. Nothing more.
//!
//! ## The contract
//!
//! A [`Pipeline`] is a list of [`Handler`]s. A request enters at the first
//! one; each handler may read the request, write the response, and decide
//! whether the rest of the chain runs by calling its [`Next`]:
//!
//! ```text
//! Recovery ─► Logger ─► Static ─► your handlers ─► (end)
//!    ◄──────────◄─────────◄───────────◄ after-phases unwind in reverse
//! ```
//!
//! - Handlers run in registration order; their after-phases run in reverse.
//! - A handler that does not call `next` ends the chain there.
//! - An empty pipeline is valid and does nothing.
//! - A per-request [`Context`] is passed explicitly to every handler. To
//!   change what downstream handlers see, derive a child and pass it on.
//!
//! No routing, no per-route middleware. Put a router at the end of the
//! chain if you need one.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use http::StatusCode;
//! use strand::{Context, Next, Pipeline, Request, ResponseWriter};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut app = Pipeline::classic();
//!     app.append_fn(|_: &Context, rw: &mut ResponseWriter, req: &Request, _: Next<'_>| {
//!         if req.path() == "/teapot" {
//!             rw.write_header(StatusCode::IM_A_TEAPOT);
//!             return;
//!         }
//!         rw.write_body(b"hello");
//!     });
//!
//!     app.run("0.0.0.0:3000").await;
//! }
//! ```

mod chain;
mod context;
mod error;
mod handler;
mod pipeline;
mod request;
mod response;
mod server;

pub mod middleware;

pub use chain::{build_chain, Chain, Next};
pub use context::{CancelHandle, Context, ContextError};
pub use error::Error;
pub use handler::{handler_fn, wrap, BoxedHandler, Handler, HandlerFn, Wrap};
pub use pipeline::Pipeline;
pub use request::Request;
pub use response::{ContentType, ResponseWriter};
pub use server::{serve_on, Server};
