//! Wire-level request/response types and the combined output parser.
//!
//! The transport process writes one stream laid out as:
//!
//! ```text
//! HTTP/1.1 200 OK\r\n
//! content-type: text/html\r\n
//! \r\n
//! <body bytes>\n
//! 200
//! ```
//!
//! i.e. the dumped header block, an empty line, the body, and the numeric
//! status appended after a final newline. [`parse_output`] splits that stream
//! without any streaming HTTP parser.

use std::collections::BTreeMap;

/// Marks the end of a header block.
const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Status assumed when the trailer is missing or unparseable.
const DEFAULT_STATUS: u16 = 200;

/// An outgoing request as issued by an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireRequest {
    /// Absolute URL.
    pub url: String,
    /// HTTP method, upper case.
    pub method: String,
    /// Request headers.
    pub headers: BTreeMap<String, String>,
    /// Request body, if any.
    pub body: Option<String>,
    /// Return the response body base64-encoded instead of as text.
    pub want_bytes: bool,
}

impl WireRequest {
    /// A `GET` request for `url`.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_owned(),
            headers: BTreeMap::new(),
            body: None,
            want_bytes: false,
        }
    }

    /// Set the method.
    #[must_use]
    pub fn with_method(mut self, method: impl AsRef<str>) -> Self {
        self.method = method.as_ref().to_ascii_uppercase();
        self
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Request the body as base64-encoded bytes.
    #[must_use]
    pub fn with_bytes(mut self) -> Self {
        self.want_bytes = true;
        self
    }
}

/// A response body. Text and base64 bytes are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireBody {
    /// UTF-8 text (invalid sequences replaced).
    Text(String),
    /// Standard base64 of the raw body bytes.
    Base64(String),
}

impl WireBody {
    /// The body string, whichever encoding it uses.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text(s) | Self::Base64(s) => s,
        }
    }

    /// Whether the body is base64-encoded.
    #[must_use]
    pub fn is_base64(&self) -> bool {
        matches!(self, Self::Base64(_))
    }
}

impl Default for WireBody {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

/// A response as handed back to an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireResponse {
    /// HTTP status, 0 when no response was obtained.
    pub status: u16,
    /// Response headers, names lower-cased.
    pub headers: BTreeMap<String, String>,
    /// Response body.
    pub body: WireBody,
    /// Transport-level failure description, or a note about an HTTP error status.
    pub error: Option<String>,
}

impl WireResponse {
    /// A response describing a failure to obtain any response.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: 0,
            headers: BTreeMap::new(),
            body: WireBody::default(),
            error: Some(message.into()),
        }
    }

    /// Canonical reason phrase for the status code.
    #[must_use]
    pub fn status_text(&self) -> &'static str {
        reason_phrase(self.status)
    }

    /// Whether the status is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Raw pieces recovered from the transport's combined output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedOutput {
    /// Status from the trailer.
    pub status: u16,
    /// Headers of the final response, names lower-cased.
    pub headers: BTreeMap<String, String>,
    /// Raw body bytes.
    pub body: Vec<u8>,
}

/// Split combined transport output into status, headers and body.
///
/// Header blocks of intermediate responses (1xx, or 3xx followed by another
/// status line when redirects are followed) are skipped so the headers belong
/// to the response whose body is returned.
#[must_use]
pub fn parse_output(raw: &[u8]) -> ParsedOutput {
    let mut rest = raw;
    let mut headers = BTreeMap::new();

    while let Some(pos) = find(rest, HEADER_TERMINATOR) {
        let (block, tail) = rest.split_at(pos);
        let after = tail.strip_prefix(HEADER_TERMINATOR).unwrap_or(tail);
        let (status_line, parsed) = parse_header_block(block);

        headers = parsed;
        rest = after;

        if is_intermediate(&status_line) && after.starts_with(b"HTTP/") {
            continue;
        }
        break;
    }

    let (body, trailer) = match rest.iter().rposition(|&b| b == b'\n') {
        Some(newline) => {
            let (body, trailer) = rest.split_at(newline);
            (body, trailer.strip_prefix(b"\n").unwrap_or(trailer))
        },
        None => (&rest[..0], rest),
    };

    let status = String::from_utf8_lossy(trailer)
        .trim()
        .parse::<u16>()
        .unwrap_or(DEFAULT_STATUS);

    ParsedOutput {
        status,
        headers,
        body: body.to_vec(),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Returns the status line and the lower-cased header map of one block.
fn parse_header_block(block: &[u8]) -> (String, BTreeMap<String, String>) {
    let text = String::from_utf8_lossy(block);
    let mut lines = text.split("\r\n");
    let status_line = lines.next().unwrap_or_default().to_owned();

    let mut headers: BTreeMap<String, String> = BTreeMap::new();
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        if name.is_empty() {
            continue;
        }
        let value = value.trim();
        headers
            .entry(name)
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_owned());
    }

    (status_line, headers)
}

fn is_intermediate(status_line: &str) -> bool {
    status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .is_some_and(|code| (100..200).contains(&code) || (300..400).contains(&code))
}

/// Canonical reason phrase for common status codes.
#[must_use]
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        410 => "Gone",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn combined(status_line: &str, headers: &[(&str, &str)], body: &[u8], status: u16) -> Vec<u8> {
        let mut out = format!("{status_line}\r\n");
        for (name, value) in headers {
            out.push_str(&format!("{name}: {value}\r\n"));
        }
        out.push_str("\r\n");
        let mut bytes = out.into_bytes();
        bytes.extend_from_slice(body);
        bytes.extend_from_slice(format!("\n{status}").as_bytes());
        bytes
    }

    #[test]
    fn test_parse_recovers_status_headers_and_body() {
        let raw = combined(
            "HTTP/2 404",
            &[("Content-Type", "text/html; charset=utf-8"), ("X-Cache", "MISS")],
            b"<html>\nnot here\n</html>",
            404,
        );
        let parsed = parse_output(&raw);

        assert_eq!(parsed.status, 404);
        assert_eq!(parsed.headers["content-type"], "text/html; charset=utf-8");
        assert_eq!(parsed.headers["x-cache"], "MISS");
        assert_eq!(parsed.body, b"<html>\nnot here\n</html>");
    }

    #[test]
    fn test_parse_body_ending_in_newline() {
        let raw = combined("HTTP/1.1 200 OK", &[("A", "1")], b"line\n", 200);
        let parsed = parse_output(&raw);
        assert_eq!(parsed.body, b"line\n");
        assert_eq!(parsed.status, 200);
    }

    #[test]
    fn test_parse_empty_body() {
        let raw = combined("HTTP/1.1 204 No Content", &[], b"", 204);
        let parsed = parse_output(&raw);
        assert!(parsed.body.is_empty());
        assert!(parsed.headers.is_empty());
        assert_eq!(parsed.status, 204);
    }

    #[test]
    fn test_parse_body_containing_blank_lines() {
        let raw = combined("HTTP/1.1 200 OK", &[("A", "1")], b"a\r\n\r\nb", 200);
        let parsed = parse_output(&raw);
        assert_eq!(parsed.body, b"a\r\n\r\nb");
        assert_eq!(parsed.headers.len(), 1);
    }

    #[test]
    fn test_parse_binary_body() {
        let body = [0xff_u8, 0x00, 0xd8, b'\n', 0x10];
        let raw = combined("HTTP/1.1 200 OK", &[("Content-Type", "image/png")], &body, 200);
        assert_eq!(parse_output(&raw).body, body);
    }

    #[test]
    fn test_unparseable_trailer_defaults_to_200() {
        let parsed = parse_output(b"HTTP/1.1 200 OK\r\n\r\nbody\nxyz");
        assert_eq!(parsed.status, 200);
        assert_eq!(parsed.body, b"body");
    }

    #[test]
    fn test_duplicate_headers_are_joined() {
        let raw = combined(
            "HTTP/1.1 200 OK",
            &[("Set-Cookie", "a=1"), ("set-cookie", "b=2")],
            b"",
            200,
        );
        assert_eq!(parse_output(&raw).headers["set-cookie"], "a=1, b=2");
    }

    #[test]
    fn test_redirect_hops_are_skipped() {
        let mut raw = b"HTTP/1.1 301 Moved Permanently\r\nLocation: /new\r\n\r\n".to_vec();
        raw.extend(combined("HTTP/1.1 200 OK", &[("X-Final", "yes")], b"done", 200));
        let parsed = parse_output(&raw);

        assert_eq!(parsed.status, 200);
        assert_eq!(parsed.headers.get("location"), None);
        assert_eq!(parsed.headers["x-final"], "yes");
        assert_eq!(parsed.body, b"done");
    }

    #[test]
    fn test_redirect_body_without_followup_is_kept() {
        let raw = combined("HTTP/1.1 302 Found", &[("Location", "/x")], b"HTTP/ is not a hop", 302);
        let parsed = parse_output(&raw);
        assert_eq!(parsed.status, 302);
        assert_eq!(parsed.headers["location"], "/x");
        assert_eq!(parsed.body, b"HTTP/ is not a hop");
    }

    #[test]
    fn test_output_without_header_block() {
        let parsed = parse_output(b"plain\n503");
        assert!(parsed.headers.is_empty());
        assert_eq!(parsed.body, b"plain");
        assert_eq!(parsed.status, 503);
    }

    #[test]
    fn test_request_builder_and_status_text() {
        let req = WireRequest::get("https://example.org")
            .with_method("post")
            .with_header("Referer", "https://example.org/")
            .with_body("q=1")
            .with_bytes();
        assert_eq!(req.method, "POST");
        assert!(req.want_bytes);
        assert_eq!(req.body.as_deref(), Some("q=1"));

        let failure = WireResponse::failure("boom");
        assert_eq!(failure.status, 0);
        assert_eq!(failure.status_text(), "");
        assert!(!failure.is_success());
        assert_eq!(reason_phrase(429), "Too Many Requests");
    }
}
