//! Static file serving.

use std::fs;
use std::path::{Component, Path, PathBuf};

use http::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use http::{HeaderValue, Method, StatusCode};
use tracing::debug;

use crate::chain::Next;
use crate::context::Context;
use crate::handler::Handler;
use crate::request::Request;
use crate::response::{ContentType, ResponseWriter};

/// Serves files under a directory for `GET` and `HEAD` requests.
///
/// Paths are percent-decoded before the lookup. Anything it cannot serve
/// (other methods, paths outside the prefix, non-UTF-8 paths, missing files,
/// `..` segments, encoded or not) falls through to the next handler. A file
/// it does serve ends the chain.
///
/// A request for a directory without a trailing slash is redirected to the
/// slashed path; with the slash, the index file inside it is served.
///
/// ```rust
/// use strand::{Pipeline, middleware::Static};
///
/// let app = Pipeline::default().with(Static::new("public").prefix("/assets"));
/// # let _ = app;
/// ```
#[derive(Clone, Debug)]
pub struct Static {
    dir: PathBuf,
    prefix: String,
    index_file: String,
}

impl Static {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), prefix: String::new(), index_file: "index.html".to_owned() }
    }

    /// Only serve URL paths under `prefix`, stripped before the file lookup.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// File served for directory requests. Defaults to `index.html`.
    pub fn index_file(mut self, name: impl Into<String>) -> Self {
        self.index_file = name.into();
        self
    }

    /// Maps a URL path to the file-relative path, or `None` if this handler
    /// should not look at it.
    fn relative<'a>(&self, url_path: &'a str) -> Option<&'a str> {
        let file = if self.prefix.is_empty() {
            url_path
        } else {
            let rest = url_path.strip_prefix(self.prefix.as_str())?;
            if !rest.is_empty() && !rest.starts_with('/') {
                return None;
            }
            rest
        };
        Some(file)
    }

    /// Joins `file` onto the root, refusing anything but plain segments.
    fn resolve(&self, file: &str) -> Option<PathBuf> {
        let rel = Path::new(file.trim_start_matches('/'));
        if rel.components().any(|c| !matches!(c, Component::Normal(_) | Component::CurDir)) {
            return None;
        }
        Some(self.dir.join(rel))
    }
}

impl Handler for Static {
    fn serve(&self, ctx: &Context, rw: &mut ResponseWriter, req: &Request, next: Next<'_>) {
        if req.method() != Method::GET && req.method() != Method::HEAD {
            return next.run(ctx, rw, req);
        }

        let Some(file) = self.relative(req.path()) else {
            return next.run(ctx, rw, req);
        };
        let Ok(file) = urlencoding::decode(file) else {
            return next.run(ctx, rw, req);
        };
        let Some(mut path) = self.resolve(&file) else {
            debug!(path = req.path(), "rejected static path");
            return next.run(ctx, rw, req);
        };
        let Ok(meta) = fs::metadata(&path) else {
            return next.run(ctx, rw, req);
        };

        if meta.is_dir() {
            if !req.path().ends_with('/') {
                let target = format!("{}/", req.path());
                match HeaderValue::from_str(&target) {
                    Ok(location) => {
                        rw.headers_mut().insert(LOCATION, location);
                        rw.write_header(StatusCode::FOUND);
                    }
                    Err(_) => next.run(ctx, rw, req),
                }
                return;
            }
            path.push(&self.index_file);
        }

        let Ok(contents) = fs::read(&path) else {
            return next.run(ctx, rw, req);
        };

        let content_type = path
            .extension()
            .and_then(|e| e.to_str())
            .map(ContentType::from_extension)
            .unwrap_or(ContentType::OctetStream);

        let headers = rw.headers_mut();
        headers.insert(CONTENT_TYPE, content_type.header_value());
        headers.insert(CONTENT_LENGTH, HeaderValue::from(contents.len()));
        rw.write_header(StatusCode::OK);
        if req.method() != Method::HEAD {
            rw.write_body(&contents);
        }
    }
}
