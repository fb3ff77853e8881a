//! Immutable chain construction and traversal.
//!
//! A [`Chain`] is a singly linked list of nodes, each pairing one handler
//! with the node after it, and always ending in a sentinel:
//!
//! ```text
//! [A] → [B] → [C] → (sentinel)
//! ```
//!
//! Dispatch enters at the head. Each handler receives a [`Next`] pointing at
//! the node after its own; running it recurses one node deeper. The sentinel
//! does nothing and returns, so the call stack unwinds back through every
//! handler that delegated, in reverse order, giving each its after-phase.
//!
//! Chains are never edited. Appending to a pipeline builds a whole new chain
//! and replaces the old one.

use crate::context::Context;
use crate::handler::BoxedHandler;
use crate::request::Request;
use crate::response::ResponseWriter;

enum Node {
    Link { handler: BoxedHandler, next: Box<Node> },
    Sentinel,
}

static SENTINEL: Node = Node::Sentinel;

/// An immutable, built chain of handlers.
pub struct Chain {
    head: Node,
}

/// Builds the chain for `handlers`, preserving their order.
///
/// An empty slice yields a chain that is just the sentinel, which is still
/// safe to dispatch.
pub fn build_chain(handlers: &[BoxedHandler]) -> Chain {
    // Built from the tail so each node can own the one after it.
    let head = handlers.iter().rev().fold(Node::Sentinel, |next, handler| Node::Link {
        handler: handler.clone(),
        next: Box::new(next),
    });
    Chain { head }
}

impl Chain {
    /// The continuation that runs the whole chain.
    pub fn head(&self) -> Next<'_> {
        Next { node: &self.head }
    }

    /// Number of handler nodes, not counting the sentinel.
    pub fn len(&self) -> usize {
        self.handlers().count()
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.head, Node::Sentinel)
    }

    /// The handlers in chain order.
    pub fn handlers(&self) -> impl Iterator<Item = &BoxedHandler> + '_ {
        let mut node = &self.head;
        std::iter::from_fn(move || {
            let current = node;
            match current {
                Node::Link { handler, next } => {
                    node = &**next;
                    Some(handler)
                }
                Node::Sentinel => None,
            }
        })
    }

    /// Number of sentinels reachable from the head. Always one.
    pub fn sentinels(&self) -> usize {
        let mut node = &self.head;
        while let Node::Link { next, .. } = node {
            node = &**next;
        }
        matches!(node, Node::Sentinel) as usize
    }
}

impl Default for Chain {
    fn default() -> Self {
        Chain { head: Node::Sentinel }
    }
}

impl Drop for Chain {
    // The derived drop would recurse once per node through `Box<Node>`.
    fn drop(&mut self) {
        let mut node = std::mem::replace(&mut self.head, Node::Sentinel);
        while let Node::Link { next, .. } = node {
            node = *next;
        }
    }
}

/// The remainder of a chain, handed to each handler.
///
/// `Next` is `Copy`: running it does not consume it, and running it again
/// replays every handler after the current one.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    node: &'a Node,
}

impl Next<'static> {
    /// A continuation that does nothing. Use it to call a handler directly,
    /// outside any chain.
    pub fn end() -> Self {
        Next { node: &SENTINEL }
    }
}

impl Next<'_> {
    /// Runs the rest of the chain with `ctx`, which may be the context the
    /// current handler received or one derived from it.
    pub fn run(self, ctx: &Context, rw: &mut ResponseWriter, req: &Request) {
        match self.node {
            Node::Link { handler, next } => handler.serve(ctx, rw, req, Next { node: next }),
            Node::Sentinel => {}
        }
    }

    /// Whether this continuation is the sentinel, i.e. running it is a no-op.
    pub fn is_end(&self) -> bool {
        matches!(self.node, Node::Sentinel)
    }
}

impl std::fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next").field("is_end", &self.is_end()).finish()
    }
}
