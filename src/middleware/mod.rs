//! Built-in middleware.
//!
//! Each of these is an ordinary [`Handler`](crate::Handler) with its settings
//! held as plain fields, configured at construction:
//!
//! - [`Recovery`] turns a panic further down the chain into a `500`
//! - [`Logger`] logs each request on the way in and its status on the way out
//! - [`Static`] serves files from a directory, falling through on a miss
//!
//! [`Pipeline::classic`](crate::Pipeline::classic) stacks all three in that
//! order.

mod logger;
mod recovery;
mod static_files;

pub use logger::Logger;
pub use recovery::Recovery;
pub use static_files::Static;
