//! The per-request response sink.
//!
//! Handlers never build a response value and return it. They write into a
//! shared [`ResponseWriter`] as the request travels down the chain, and the
//! transport turns whatever was written into the wire response once the chain
//! has finished.

use std::io;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderValue};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;
use tracing::warn;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values, keyed by file extension for static serving.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContentType {
    Css,          // text/css; charset=utf-8
    Csv,          // text/csv
    Html,         // text/html; charset=utf-8
    Ico,          // image/x-icon
    Jpeg,         // image/jpeg
    JavaScript,   // text/javascript; charset=utf-8
    Json,         // application/json
    OctetStream,  // application/octet-stream  (fallback)
    Pdf,          // application/pdf
    Png,          // image/png
    Svg,          // image/svg+xml
    Text,         // text/plain; charset=utf-8
    Wasm,         // application/wasm
    Xml,          // application/xml
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Css         => "text/css; charset=utf-8",
            Self::Csv         => "text/csv",
            Self::Html        => "text/html; charset=utf-8",
            Self::Ico         => "image/x-icon",
            Self::Jpeg        => "image/jpeg",
            Self::JavaScript  => "text/javascript; charset=utf-8",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Pdf         => "application/pdf",
            Self::Png         => "image/png",
            Self::Svg         => "image/svg+xml",
            Self::Text        => "text/plain; charset=utf-8",
            Self::Wasm        => "application/wasm",
            Self::Xml         => "application/xml",
        }
    }

    /// Guesses from a file extension (case-insensitive, without the dot).
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "css"          => Self::Css,
            "csv"          => Self::Csv,
            "htm" | "html" => Self::Html,
            "ico"          => Self::Ico,
            "jpg" | "jpeg" => Self::Jpeg,
            "js" | "mjs"   => Self::JavaScript,
            "json"         => Self::Json,
            "pdf"          => Self::Pdf,
            "png"          => Self::Png,
            "svg"          => Self::Svg,
            "txt"          => Self::Text,
            "wasm"         => Self::Wasm,
            "xml"          => Self::Xml,
            _              => Self::OctetStream,
        }
    }

    pub fn header_value(self) -> HeaderValue {
        HeaderValue::from_static(self.as_str())
    }
}

// ── ResponseWriter ────────────────────────────────────────────────────────────

/// Buffered response that remembers what has been written to it.
///
/// The status is written at most once: either explicitly through
/// [`write_header`](ResponseWriter::write_header) or implicitly as `200 OK`
/// by the first body write. Later `write_header` calls are ignored, the way
/// an HTTP/1.1 status line cannot be taken back once sent.
///
/// ```rust
/// use http::StatusCode;
/// use strand::ResponseWriter;
///
/// let mut rw = ResponseWriter::new();
/// assert_eq!(rw.status(), 0);
///
/// rw.write_header(StatusCode::CREATED);
/// rw.write_body(b"done");
/// rw.write_header(StatusCode::BAD_REQUEST); // ignored
///
/// assert_eq!(rw.status(), 201);
/// assert_eq!(rw.size(), 4);
/// ```
#[derive(Debug, Default)]
pub struct ResponseWriter {
    status: u16,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The status written so far, or `0` if nothing has been written.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Whether the status has been written.
    pub fn written(&self) -> bool {
        self.status != 0
    }

    /// Body bytes written so far.
    pub fn size(&self) -> usize {
        self.body.len()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Headers are still mutable after the status is written; they are only
    /// sent once the chain returns.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn write_header(&mut self, status: StatusCode) {
        if self.written() {
            warn!(
                current = self.status,
                ignored = status.as_u16(),
                "superfluous write_header call"
            );
            return;
        }
        self.status = status.as_u16();
    }

    /// Appends to the body, writing `200 OK` first if no status is set.
    pub fn write_body(&mut self, bytes: &[u8]) {
        if !self.written() {
            self.status = StatusCode::OK.as_u16();
        }
        self.body.extend_from_slice(bytes);
    }

    /// Sets `content-type` and writes `body`.
    pub fn send(&mut self, content_type: ContentType, body: &[u8]) {
        self.headers.insert(CONTENT_TYPE, content_type.header_value());
        self.write_body(body);
    }

    /// Converts the buffered state into the response hyper sends.
    /// A chain that wrote nothing yields an empty `200 OK`.
    pub(crate) fn into_response(self) -> http::Response<Full<Bytes>> {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);
        let mut res = http::Response::new(Full::new(Bytes::from(self.body)));
        *res.status_mut() = status;
        *res.headers_mut() = self.headers;
        res
    }
}

/// Lets handlers use `write!` against the body.
impl io::Write for ResponseWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_body(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Reason phrase for a numeric status, empty when unknown or unset.
pub(crate) fn status_text(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn fresh_writer_reports_zero_status() {
        let rw = ResponseWriter::new();
        assert_eq!(rw.status(), 0);
        assert!(!rw.written());
        assert_eq!(rw.size(), 0);
    }

    #[test]
    fn first_body_write_implies_ok() {
        let mut rw = ResponseWriter::new();
        write!(rw, "hello {}", "world").unwrap();
        assert_eq!(rw.status(), 200);
        assert_eq!(rw.body(), b"hello world");
    }

    #[test]
    fn status_is_written_once() {
        let mut rw = ResponseWriter::new();
        rw.write_header(StatusCode::BAD_REQUEST);
        rw.write_header(StatusCode::INTERNAL_SERVER_ERROR);
        rw.write_body(b"nope");
        assert_eq!(rw.status(), 400);
    }

    #[test]
    fn into_response_defaults_to_ok() {
        let res = ResponseWriter::new().into_response();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[test]
    fn send_sets_content_type() {
        let mut rw = ResponseWriter::new();
        rw.send(ContentType::Json, b"{}");
        let res = rw.into_response();
        assert_eq!(res.headers()[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn content_type_from_extension() {
        assert_eq!(ContentType::from_extension("HTML"), ContentType::Html);
        assert_eq!(ContentType::from_extension("js"), ContentType::JavaScript);
        assert_eq!(ContentType::from_extension("bin"), ContentType::OctetStream);
    }

    #[test]
    fn status_text_known_and_unknown() {
        assert_eq!(status_text(404), "Not Found");
        assert_eq!(status_text(0), "");
    }
}
