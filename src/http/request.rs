//! Incremental HTTP/1.1 request framing.
//!
//! # Responsibilities
//! - Accumulate bytes until the header section terminator is seen
//! - Await exactly `Content-Length` body bytes (empty body when absent)
//! - Classify the method by request-line prefix (GET / POST only)
//! - Enforce header and body size caps before buffering further
//!
//! # Design Decisions
//! - Scanning resumes where the previous attempt stopped, so repeated partial
//!   reads cost linear time in the header size
//! - Header names are matched case-insensitively; values are kept verbatim

use thiserror::Error;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Errors raised while framing a request. All of them close the connection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// Header section grew past the configured cap.
    #[error("header section exceeds {limit} bytes")]
    HeaderTooLarge { limit: usize },

    /// Declared body is larger than the configured cap.
    #[error("payload of {declared} bytes exceeds {limit} bytes")]
    PayloadTooLarge { declared: usize, limit: usize },

    /// Request line does not start with a method this host serves.
    #[error("unsupported request method")]
    UnsupportedMethod,

    /// Structurally invalid request.
    #[error("malformed request: {0}")]
    Malformed(&'static str),
}

/// Methods this host serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    /// Classify a request line by its prefix.
    fn from_request_line(line: &str) -> Option<Self> {
        if line.starts_with("GET ") {
            Some(Method::Get)
        } else if line.starts_with("POST ") {
            Some(Method::Post)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully framed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    /// Request target exactly as sent, query string included.
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Parse a complete request held in `raw` (no size caps).
    ///
    /// Used by the application layer to re-read the raw text it receives in a
    /// `Message` event.
    pub fn parse(raw: &[u8]) -> Result<Self, ParseError> {
        let mut parser = RequestParser::new(usize::MAX, usize::MAX);
        match parser.parse(raw)? {
            Some((request, _)) => Ok(request),
            None => Err(ParseError::Malformed("incomplete request")),
        }
    }

    /// Case-insensitive header lookup; first occurrence wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The path without any query string.
    pub fn path_only(&self) -> &str {
        self.path.split(&['?', '#'][..]).next().unwrap_or("")
    }
}

/// Stateful request framer for one connection.
#[derive(Debug, Clone)]
pub struct RequestParser {
    max_header_bytes: usize,
    max_body_bytes: usize,
    /// Bytes already searched for the terminator.
    scanned: usize,
    /// End of the header section once found, with the parsed head.
    head: Option<(usize, HttpRequest)>,
}

impl RequestParser {
    pub fn new(max_header_bytes: usize, max_body_bytes: usize) -> Self {
        Self {
            max_header_bytes,
            max_body_bytes,
            scanned: 0,
            head: None,
        }
    }

    /// Try to frame a request from the bytes accumulated so far.
    ///
    /// `buf` must be the same growing buffer on every call until a request is
    /// returned. Returns `Ok(None)` when more data is needed, or the request and
    /// the number of bytes it occupied.
    pub fn parse(&mut self, buf: &[u8]) -> Result<Option<(HttpRequest, usize)>, ParseError> {
        if self.head.is_none() {
            let start = self.scanned.saturating_sub(HEADER_TERMINATOR.len() - 1);
            let found = buf[start..]
                .windows(HEADER_TERMINATOR.len())
                .position(|w| w == HEADER_TERMINATOR)
                .map(|pos| start + pos + HEADER_TERMINATOR.len());

            let header_end = match found {
                Some(end) => end,
                None => {
                    self.scanned = buf.len();
                    if buf.len() > self.max_header_bytes {
                        return Err(ParseError::HeaderTooLarge {
                            limit: self.max_header_bytes,
                        });
                    }
                    return Ok(None);
                }
            };

            if header_end > self.max_header_bytes {
                return Err(ParseError::HeaderTooLarge {
                    limit: self.max_header_bytes,
                });
            }

            let request = parse_head(&buf[..header_end])?;
            self.head = Some((header_end, request));
        }

        let Some((header_end, request)) = self.head.as_ref() else {
            return Ok(None);
        };
        let body_len = content_length(request)?;
        if body_len > self.max_body_bytes {
            return Err(ParseError::PayloadTooLarge {
                declared: body_len,
                limit: self.max_body_bytes,
            });
        }

        let total = header_end + body_len;
        if buf.len() < total {
            return Ok(None);
        }

        let (header_end, mut request) = match self.head.take() {
            Some(head) => head,
            None => return Ok(None),
        };
        request.body = buf[header_end..total].to_vec();
        self.scanned = 0;
        Ok(Some((request, total)))
    }
}

fn parse_head(head: &[u8]) -> Result<HttpRequest, ParseError> {
    let text = std::str::from_utf8(head).map_err(|_| ParseError::Malformed("non-UTF-8 header section"))?;
    let mut lines = text.split("\r\n");

    let request_line = lines.next().ok_or(ParseError::Malformed("missing request line"))?;
    let method = Method::from_request_line(request_line).ok_or(ParseError::UnsupportedMethod)?;
    let path = request_line
        .split(' ')
        .nth(1)
        .filter(|p| !p.is_empty())
        .ok_or(ParseError::Malformed("missing request target"))?
        .to_string();

    let mut headers = Vec::new();
    for line in lines.take_while(|l| !l.is_empty()) {
        let (name, value) = line
            .split_once(':')
            .ok_or(ParseError::Malformed("header line without ':'"))?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    Ok(HttpRequest {
        method,
        path,
        headers,
        body: Vec::new(),
    })
}

fn content_length(request: &HttpRequest) -> Result<usize, ParseError> {
    match request.header("content-length") {
        Some(value) => value
            .parse::<usize>()
            .map_err(|_| ParseError::Malformed("invalid Content-Length")),
        None => Ok(0),
    }
}
