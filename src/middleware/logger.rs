//! Request/response logging.

use std::time::Instant;

use tracing::info;

use crate::chain::Next;
use crate::context::Context;
use crate::handler::Handler;
use crate::request::Request;
use crate::response::{status_text, ResponseWriter};

/// Logs `started` with method and path before the rest of the chain runs,
/// and `completed` with the final status and elapsed time after it returns.
///
/// Events go to whatever `tracing` subscriber the binary installs. A status
/// of `0` in the `completed` event means nothing downstream wrote one.
#[derive(Clone, Debug)]
pub struct Logger {
    name: &'static str,
}

impl Logger {
    /// A logger whose events carry `logger = name`, to tell several apart.
    pub fn named(name: &'static str) -> Self {
        Self { name }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::named("strand")
    }
}

impl Handler for Logger {
    fn serve(&self, ctx: &Context, rw: &mut ResponseWriter, req: &Request, next: Next<'_>) {
        let start = Instant::now();
        info!(logger = self.name, method = %req.method(), path = req.path(), "started");

        next.run(ctx, rw, req);

        let status = rw.status();
        info!(
            logger = self.name,
            status,
            reason = status_text(status),
            elapsed = ?start.elapsed(),
            "completed"
        );
    }
}
