//! The handler contract and its closure adapters.
//!
//! Every element of a [`Pipeline`](crate::Pipeline) implements [`Handler`].
//! A handler gets the request context, the response sink, the request, and a
//! [`Next`] continuation standing for "the rest of the chain":
//!
//! ```text
//! serve(ctx, rw, req, next)
//!   ├─ before-phase work
//!   ├─ next.run(ctx, rw, req)     ← optional; skipping it ends the chain here
//!   └─ after-phase work
//! ```
//!
//! Calling `next` more than once runs the remainder of the chain again. That
//! is allowed; what downstream handlers make of it is up to them.
//!
//! Handlers are stored as [`BoxedHandler`], an `Arc<dyn Handler>`, so the
//! pipeline's handler list and its built chain share the same instances.

use std::sync::Arc;

use crate::chain::Next;
use crate::context::Context;
use crate::request::Request;
use crate::response::ResponseWriter;

/// A pipeline element.
///
/// Implement this on your own types for configurable middleware; for
/// one-off closures use [`handler_fn`] or [`wrap`].
pub trait Handler: Send + Sync + 'static {
    fn serve(&self, ctx: &Context, rw: &mut ResponseWriter, req: &Request, next: Next<'_>);
}

/// A type-erased handler shared between the handler list and the chain.
pub type BoxedHandler = Arc<dyn Handler>;

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn serve(&self, ctx: &Context, rw: &mut ResponseWriter, req: &Request, next: Next<'_>) {
        (**self).serve(ctx, rw, req, next)
    }
}

// ── Delegating adapter ────────────────────────────────────────────────────────

/// Turns a closure that receives the continuation into a [`Handler`].
///
/// The explicit bound on `F` is what lets closure parameters infer the
/// higher-ranked lifetimes. The same closure passed straight to a generic
/// `impl Handler` parameter would not compile.
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: Fn(&Context, &mut ResponseWriter, &Request, Next<'_>) + Send + Sync + 'static,
{
    HandlerFn(f)
}

/// See [`handler_fn`].
pub struct HandlerFn<F>(F);

impl<F> Handler for HandlerFn<F>
where
    F: Fn(&Context, &mut ResponseWriter, &Request, Next<'_>) + Send + Sync + 'static,
{
    fn serve(&self, ctx: &Context, rw: &mut ResponseWriter, req: &Request, next: Next<'_>) {
        (self.0)(ctx, rw, req, next)
    }
}

// ── Plain adapter ─────────────────────────────────────────────────────────────

/// Turns a plain closure that knows nothing about the chain into a
/// [`Handler`]. The closure runs first, then the rest of the chain runs
/// unconditionally.
pub fn wrap<F>(f: F) -> Wrap<F>
where
    F: Fn(&mut ResponseWriter, &Request) + Send + Sync + 'static,
{
    Wrap(f)
}

/// See [`wrap`].
pub struct Wrap<F>(F);

impl<F> Handler for Wrap<F>
where
    F: Fn(&mut ResponseWriter, &Request) + Send + Sync + 'static,
{
    fn serve(&self, ctx: &Context, rw: &mut ResponseWriter, req: &Request, next: Next<'_>) {
        (self.0)(rw, req);
        next.run(ctx, rw, req);
    }
}
