//! Panic recovery.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use http::StatusCode;
use tracing::error;

use crate::chain::Next;
use crate::context::Context;
use crate::handler::Handler;
use crate::request::Request;
use crate::response::ResponseWriter;

/// Catches a panic anywhere after it in the chain and answers `500`.
///
/// The panic is logged as `PANIC: <message>` followed by a backtrace. With
/// `print_stack` set the same text is also written to the response body,
/// which is handy in development and a leak in production.
///
/// The backtrace is the one taken at the panic site. The first `serve` call
/// wraps the process panic hook to record it; the previous hook still runs.
///
/// Recovery only protects handlers appended after it; put it first.
#[derive(Clone, Debug)]
pub struct Recovery {
    /// Write the panic message and backtrace into the response body.
    pub print_stack: bool,
    /// Backtrace text beyond this many bytes is cut off.
    pub stack_size: usize,
}

impl Default for Recovery {
    fn default() -> Self {
        Self { print_stack: true, stack_size: 8 * 1024 }
    }
}

impl Recovery {
    /// Recovery that logs the backtrace but keeps it out of responses.
    pub fn quiet() -> Self {
        Self { print_stack: false, ..Self::default() }
    }
}

thread_local! {
    /// Backtrace of the last panic on this thread, taken while it was still
    /// on the stack.
    static PANIC_TRACE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// Wraps the process panic hook so every panic records its backtrace into
/// [`PANIC_TRACE`] before the previous hook runs.
fn install_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let trace = Backtrace::force_capture();
            PANIC_TRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

fn take_panic_trace() -> Option<Backtrace> {
    PANIC_TRACE.with(|slot| slot.borrow_mut().take())
}

impl Handler for Recovery {
    fn serve(&self, ctx: &Context, rw: &mut ResponseWriter, req: &Request, next: Next<'_>) {
        install_hook();
        take_panic_trace();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| next.run(ctx, rw, req)));
        let Err(payload) = outcome else { return };

        rw.write_header(StatusCode::INTERNAL_SERVER_ERROR);

        // A hook installed by someone else after ours may have skipped it.
        let stack = take_panic_trace().unwrap_or_else(Backtrace::force_capture).to_string();
        let stack = truncate(&stack, self.stack_size);
        let message = panic_message(payload.as_ref());

        error!(method = %req.method(), path = req.path(), "PANIC: {message}\n{stack}");

        if self.print_stack {
            // Writes into the in-memory body cannot fail.
            let _ = write!(rw, "PANIC: {message}\n{stack}");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "Box<dyn Any>"
    }
}

/// Cuts `s` to at most `max` bytes without splitting a character.
fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Pipeline;

    fn panicking(recovery: Recovery) -> Pipeline {
        let mut app = Pipeline::default();
        app.append(recovery);
        app.append_fn(|_: &Context, _: &mut ResponseWriter, _: &Request, _: Next<'_>| {
            panic!("here is a panic!");
        });
        app
    }

    #[test]
    fn panic_becomes_internal_server_error() {
        let rw = panicking(Recovery::default()).dispatch(&Request::default());
        assert_eq!(rw.status(), 500);
        let body = String::from_utf8_lossy(rw.body());
        assert!(body.starts_with("PANIC: here is a panic!\n"), "body was {body:?}");
    }

    #[test]
    fn quiet_recovery_keeps_body_empty() {
        let rw = panicking(Recovery::quiet()).dispatch(&Request::default());
        assert_eq!(rw.status(), 500);
        assert_eq!(rw.size(), 0);
    }

    #[test]
    fn status_already_written_is_kept() {
        let mut app = Pipeline::default();
        app.append(Recovery::quiet());
        app.append_fn(|_: &Context, rw: &mut ResponseWriter, _: &Request, _: Next<'_>| {
            rw.write_header(StatusCode::ACCEPTED);
            panic!("late");
        });
        assert_eq!(app.dispatch(&Request::default()).status(), 202);
    }

    #[test]
    fn no_panic_passes_through() {
        let mut app = Pipeline::default();
        app.append(Recovery::default());
        app.append_plain(|rw: &mut ResponseWriter, _: &Request| rw.write_body(b"fine"));
        let rw = app.dispatch(&Request::default());
        assert_eq!(rw.status(), 200);
        assert_eq!(rw.body(), b"fine");
    }

    #[inline(never)]
    fn deeply_named_failing_handler() {
        panic!("failed deep down");
    }

    #[test]
    fn backtrace_points_at_the_panic_site() {
        let mut app = Pipeline::default();
        app.append(Recovery { stack_size: 64 * 1024, ..Recovery::default() });
        app.append_fn(|_: &Context, _: &mut ResponseWriter, _: &Request, _: Next<'_>| {
            deeply_named_failing_handler();
        });

        let rw = app.dispatch(&Request::default());
        assert_eq!(rw.status(), 500);
        let body = String::from_utf8_lossy(rw.body());
        assert!(body.starts_with("PANIC: failed deep down\n"), "body was {body:?}");
        assert!(body.contains("deeply_named_failing_handler"), "body was {body:?}");
    }

    #[test]
    fn formatted_panic_message_is_reported() {
        let payload: Box<dyn Any + Send> = Box::new(format!("code {}", 7));
        assert_eq!(panic_message(payload.as_ref()), "code 7");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "h");
        assert_eq!(truncate("héllo", 3), "hé");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
