//! Per-request context.
//!
//! A [`Context`] is created fresh for every dispatch and handed to every
//! handler as an explicit `&Context` argument. It carries three things:
//!
//! - a cancellation signal ([`Context::is_done`], [`Context::err`])
//! - an optional deadline, inherited and only ever tightened by children
//! - typed request-scoped values ([`Context::with_value`], [`Context::value`])
//!
//! Contexts are immutable. A handler that wants downstream handlers to see
//! something different derives a child and passes the child to `next`:
//!
//! ```rust
//! use strand::{handler_fn, Context, Next, Request, ResponseWriter};
//!
//! struct RequestId(u64);
//!
//! let tag = handler_fn(|ctx: &Context, rw: &mut ResponseWriter, req: &Request, next: Next<'_>| {
//!     let ctx = ctx.with_value(RequestId(7));
//!     next.run(&ctx, rw, req);
//! });
//! # let _ = tag;
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

/// Why a context is done.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContextError {
    /// [`CancelHandle::cancel`] was called on this context or an ancestor.
    Canceled,
    /// The deadline of this context or an ancestor has passed.
    DeadlineExceeded,
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Canceled         => f.write_str("context canceled"),
            Self::DeadlineExceeded => f.write_str("context deadline exceeded"),
        }
    }
}

impl std::error::Error for ContextError {}

/// Opaque per-request carrier for cancellation, deadline and values.
///
/// Cloning is one `Arc` increment.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

struct Inner {
    parent: Option<Context>,
    token: CancellationToken,
    deadline: Option<Instant>,
    value: Option<(TypeId, Arc<dyn Any + Send + Sync>)>,
}

impl Context {
    /// The root context: never cancelled, no deadline, no values.
    pub fn background() -> Self {
        Self {
            inner: Arc::new(Inner {
                parent: None,
                token: CancellationToken::new(),
                deadline: None,
                value: None,
            }),
        }
    }

    fn derive(&self, token: CancellationToken, deadline: Option<Instant>) -> Self {
        Self {
            inner: Arc::new(Inner {
                parent: Some(self.clone()),
                token,
                deadline,
                value: None,
            }),
        }
    }

    /// Child context carrying `value`. Shadows any value of the same type
    /// set further up.
    pub fn with_value<T: Send + Sync + 'static>(&self, value: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                parent: Some(self.clone()),
                token: self.inner.token.clone(),
                deadline: self.inner.deadline,
                value: Some((TypeId::of::<T>(), Arc::new(value))),
            }),
        }
    }

    /// Child context that can be cancelled independently of its parent.
    /// Cancelling the parent still cancels the child.
    pub fn with_cancel(&self) -> (Self, CancelHandle) {
        let token = self.inner.token.child_token();
        let handle = CancelHandle(token.clone());
        (self.derive(token, self.inner.deadline), handle)
    }

    /// Child context that is done once `deadline` passes. A deadline later
    /// than the parent's has no effect.
    pub fn with_deadline(&self, deadline: Instant) -> (Self, CancelHandle) {
        let deadline = match self.inner.deadline {
            Some(current) if current <= deadline => current,
            _ => deadline,
        };
        let token = self.inner.token.child_token();
        let handle = CancelHandle(token.clone());
        (self.derive(token, Some(deadline)), handle)
    }

    /// Shorthand for [`with_deadline`](Context::with_deadline)`(now + timeout)`.
    pub fn with_timeout(&self, timeout: Duration) -> (Self, CancelHandle) {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Looks up the nearest value of type `T`.
    pub fn value<T: Send + Sync + 'static>(&self) -> Option<&T> {
        let wanted = TypeId::of::<T>();
        let mut cur = Some(self);
        while let Some(ctx) = cur {
            if let Some((id, value)) = &ctx.inner.value {
                if *id == wanted {
                    return value.downcast_ref::<T>();
                }
            }
            cur = ctx.inner.parent.as_ref();
        }
        None
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// `None` while the context is live, otherwise the reason it is done.
    pub fn err(&self) -> Option<ContextError> {
        if self.inner.token.is_cancelled() {
            return Some(ContextError::Canceled);
        }
        match self.inner.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// The underlying token, for handlers that bridge into async code and
    /// want to `select!` on `cancelled()`.
    pub fn token(&self) -> &CancellationToken {
        &self.inner.token
    }
}

impl Default for Context {
    fn default() -> Self { Self::background() }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("cancelled", &self.inner.token.is_cancelled())
            .field("deadline", &self.inner.deadline)
            .finish_non_exhaustive()
    }
}

/// Cancels the context returned alongside it, and every context derived
/// from that one.
#[derive(Clone, Debug)]
pub struct CancelHandle(CancellationToken);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.cancel();
    }

    /// Cancels the context when the returned guard is dropped.
    pub fn drop_guard(self) -> tokio_util::sync::DropGuard {
        self.0.drop_guard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct User(&'static str);

    #[test]
    fn background_is_live_and_empty() {
        let ctx = Context::background();
        assert!(!ctx.is_done());
        assert_eq!(ctx.err(), None);
        assert!(ctx.value::<User>().is_none());
        assert!(ctx.deadline().is_none());
    }

    #[test]
    fn values_are_inherited_and_shadowed() {
        let root = Context::background().with_value(User("alice")).with_value(42u32);
        assert_eq!(root.value::<User>(), Some(&User("alice")));
        assert_eq!(root.value::<u32>(), Some(&42));

        let child = root.with_value(User("bob"));
        assert_eq!(child.value::<User>(), Some(&User("bob")));
        assert_eq!(root.value::<User>(), Some(&User("alice")));
    }

    #[test]
    fn cancelling_parent_cancels_child_but_not_the_reverse() {
        let (parent, cancel_parent) = Context::background().with_cancel();
        let (child, cancel_child) = parent.with_cancel();

        cancel_child.cancel();
        assert_eq!(child.err(), Some(ContextError::Canceled));
        assert!(!parent.is_done());

        let (other, _keep) = parent.with_cancel();
        cancel_parent.cancel();
        assert!(parent.is_done());
        assert!(other.is_done());
    }

    #[test]
    fn values_keep_the_cancellation_of_their_parent() {
        let (ctx, cancel) = Context::background().with_cancel();
        let tagged = ctx.with_value(User("carol"));
        cancel.cancel();
        assert!(tagged.is_done());
    }

    #[test]
    fn expired_deadline_reports_deadline_exceeded() {
        let (ctx, _cancel) = Context::background().with_timeout(Duration::ZERO);
        assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));
    }

    #[test]
    fn child_deadline_never_extends_parent() {
        let soon = Instant::now() + Duration::from_secs(1);
        let (parent, _a) = Context::background().with_deadline(soon);
        let (child, _b) = parent.with_timeout(Duration::from_secs(3600));
        assert_eq!(child.deadline(), Some(soon));
    }

    #[test]
    fn drop_guard_cancels_on_drop() {
        let (ctx, cancel) = Context::background().with_cancel();
        {
            let _guard = cancel.drop_guard();
            assert!(!ctx.is_done());
        }
        assert!(ctx.is_done());
    }
}
