//! HTTP request parsing and representation.

use std::collections::HashMap;
use std::str::FromStr;
use serde::de::DeserializeOwned;

use crate::context::RequestContext;
use crate::parser::error::Error;
use crate::parser::request_line::{HttpVersion, Method};

/// An inbound HTTP request.
///
/// Besides the wire-level parts, every request carries the [`RequestContext`]
/// it is served under.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// The HTTP method (GET, POST, etc.)
    pub method: Method,
    /// The request path, including the query string
    pub path: String,
    /// The HTTP version
    pub version: HttpVersion,
    /// The HTTP headers
    pub headers: HashMap<String, String>,
    /// The request body
    pub body: Vec<u8>,
    /// Query parameters parsed from the path
    pub query_params: HashMap<String, String>,
    /// Cancellation, deadline and values for this request
    pub context: RequestContext,
}

impl HttpRequest {
    /// Create a request with an empty body and a background context.
    pub fn new(method: Method, path: impl Into<String>, version: HttpVersion, headers: HashMap<String, String>) -> Self {
        let path = path.into();
        let query_params = parse_query(&path);

        Self {
            method,
            path,
            version,
            headers,
            body: Vec::new(),
            query_params,
            context: RequestContext::background(),
        }
    }

    /// Replace the body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Add or replace a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Replace the request context.
    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }

    /// Get a header value, ignoring case.
    pub fn get_header(&self, name: &str) -> Option<&String> {
        self.headers.iter().find_map(|(k, v)| {
            if k.eq_ignore_ascii_case(name) {
                Some(v)
            } else {
                None
            }
        })
    }

    /// Check if a header exists.
    pub fn has_header(&self, name: &str) -> bool {
        self.get_header(name).is_some()
    }

    /// Parse the request body as JSON.
    ///
    /// # Errors
    ///
    /// Fails when the `Content-Type` is not `application/json` or the body
    /// does not deserialize into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        if !self.is_json() {
            return Err(Error::MissingHeader("Content-Type: application/json".to_string()));
        }

        let json = serde_json::from_slice(&self.body)?;
        Ok(json)
    }

    /// Check if the request declares a JSON body.
    pub fn is_json(&self) -> bool {
        self.get_header("Content-Type")
            .is_some_and(|content_type| content_type.starts_with("application/json"))
    }

    /// Get a query parameter value.
    pub fn get_query_param(&self, name: &str) -> Option<&String> {
        self.query_params.get(name)
    }

    /// Check if a query parameter exists.
    pub fn has_query_param(&self, name: &str) -> bool {
        self.query_params.contains_key(name)
    }
}

fn parse_query(path: &str) -> HashMap<String, String> {
    path.split_once('?')
        .map(|(_, query)| query
            .split('&')
            .filter(|s| !s.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((k, v)) => (k.to_string(), v.to_string()),
                None => (pair.to_string(), String::new()),
            })
            .collect())
        .unwrap_or_default()
}

/// Split raw bytes into the head and the body.
///
/// The head ends at the first blank line (`\r\n\r\n`, or `\n\n` for lenient
/// clients). Without a blank line the whole input is the head.
fn split_head(input: &[u8]) -> (&[u8], &[u8]) {
    let crlf = input.windows(4).position(|w| w == b"\r\n\r\n").map(|i| (i, i + 4));
    let lf = input.windows(2).position(|w| w == b"\n\n").map(|i| (i, i + 2));

    let split = match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    };

    match split {
        Some((head_end, body_start)) => (&input[..head_end], &input[body_start..]),
        None => (input, &[]),
    }
}

/// Parse an HTTP request from a byte slice.
///
/// The body is everything after the blank line, truncated to
/// `Content-Length` when that header is present.
///
/// # Errors
///
/// Returns a parser [`Error`] describing the first malformed element.
pub fn parse_request(input: &[u8]) -> Result<HttpRequest, Error> {
    if input.is_empty() {
        return Err(Error::EmptyRequest);
    }

    let (head, body) = split_head(input);
    let head = std::str::from_utf8(head)
        .map_err(|_| Error::MalformedRequestLine("Invalid UTF-8".to_string()))?;

    let mut lines = head.lines();
    let request_line = lines.next().ok_or(Error::EmptyRequest)?;

    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() != 3 {
        return Err(Error::MalformedRequestLine(request_line.to_string()));
    }

    let method = Method::from_str(parts[0])?;

    let path = parts[1];
    if path.is_empty() {
        return Err(Error::InvalidPath);
    }

    let version = HttpVersion::from_str(parts[2])?;

    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }

        let (name, value) = line.split_once(':').ok_or(Error::InvalidHeaderFormat)?;
        headers.insert(name.trim().to_string(), value.trim().to_string());
    }

    if version == HttpVersion::Http11 && !headers.keys().any(|k| k.eq_ignore_ascii_case("Host")) {
        return Err(Error::MissingHeader("Host".to_string()));
    }

    let request = HttpRequest::new(method, path, version, headers);
    let body = match request.get_header("Content-Length") {
        Some(length) => {
            let length: usize = length
                .parse()
                .map_err(|_| Error::InvalidContentLength(length.clone()))?;
            &body[..length.min(body.len())]
        }
        None => body,
    };

    Ok(request.with_body(body))
}
