//! HTTP/1.1 request-head parsing using the [`httparse`] crate

use thiserror::Error;

/// Errors that can occur while parsing a request head
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is incomplete, more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("request head exceeds maximum allowed size of {max_bytes} bytes")]
    HeadTooLarge { max_bytes: usize },
}

/// A parsed HTTP/1.1 request head
///
/// The relay never reads request bodies, so only the method, path, version and
/// headers are kept.
#[derive(Debug, Clone)]
pub struct Request {
    method: String,
    path: String,
    /// HTTP minor version: 0 for HTTP/1.0, 1 for HTTP/1.1
    version: u8,
    headers: Vec<(String, String)>,
}

impl Request {
    /// Maximum number of headers accepted per request
    const MAX_HEADERS: usize = 64;

    /// Parse a request head from a byte slice
    ///
    /// Returns the request and the offset just past the `\r\n\r\n` terminator.
    /// Anything after that offset belongs to whatever protocol follows (for an
    /// upgrade, the first WebSocket frames).
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_req = httparse::Request::new(&mut headers);

        let head_len = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let method = raw_req
            .method
            .ok_or(RequestError::MissingField { field: "method" })?
            .to_owned();

        let raw_path = raw_req
            .path
            .ok_or(RequestError::MissingField { field: "path" })?;
        // Query strings carry nothing the relay routes on.
        let path = match raw_path.find('?') {
            Some(pos) => raw_path[..pos].to_owned(),
            None => raw_path.to_owned(),
        };

        let version = raw_req
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        let headers = raw_req
            .headers
            .iter()
            .filter_map(|h| {
                std::str::from_utf8(h.value)
                    .ok()
                    .map(|v| (h.name.to_owned(), v.trim().to_owned()))
            })
            .collect();

        Ok((
            Self {
                method,
                path,
                version,
                headers,
            },
            head_len,
        ))
    }

    /// Request method, as sent
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Request path without the query string
    pub fn path(&self) -> &str {
        &self.path
    }

    /// HTTP minor version number
    pub fn version(&self) -> u8 {
        self.version
    }

    /// First value of a header, matched case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether a comma-separated header contains `token` (case-insensitive)
    fn header_has_token(&self, name: &str, token: &str) -> bool {
        self.header(name).is_some_and(|value| {
            value
                .split(',')
                .any(|part| part.trim().eq_ignore_ascii_case(token))
        })
    }

    /// The `Sec-WebSocket-Key`, if this is a valid RFC 6455 upgrade request
    ///
    /// Requires `GET`, HTTP/1.1, `Upgrade: websocket`, `Connection: upgrade`
    /// and `Sec-WebSocket-Version: 13`.
    pub fn websocket_key(&self) -> Option<&str> {
        if self.method != "GET" || self.version != 1 {
            return None;
        }
        if !self.header_has_token("upgrade", "websocket")
            || !self.header_has_token("connection", "upgrade")
        {
            return None;
        }
        if self.header("sec-websocket-version") != Some("13") {
            return None;
        }
        self.header("sec-websocket-key").filter(|key| !key.is_empty())
    }
}
