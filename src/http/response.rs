//! Response composition.
//!
//! # Responsibilities
//! - Build status line, headers and body for HTTP/1.1 responses
//! - Always emit an accurate `Content-Length` and `Connection: close`
//!
//! # Design Decisions
//! - Every plain HTTP exchange is one request per connection, so the core
//!   closes after writing and advertises it
//! - The application layer composes its own responses with the same builder
//!   and hands the serialized text back through `Command::Send`

/// Reason phrase for the status codes this host emits.
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        101 => "Switching Protocols",
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// An HTTP response ready to be serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// A plain-text response whose body is the reason phrase.
    pub fn status_text(status: u16) -> Self {
        Self::new(status).text(reason_phrase(status))
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self.header("Content-Type", content_type)
    }

    pub fn text(self, body: impl Into<String>) -> Self {
        self.body("text/plain; charset=utf-8", body.into().into_bytes())
    }

    pub fn json(self, value: &serde_json::Value) -> Self {
        self.body("application/json", value.to_string().into_bytes())
    }

    /// Status line and headers, including `Content-Length` for `content_length` bytes.
    pub fn head_bytes(&self, content_length: u64) -> Vec<u8> {
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, reason_phrase(self.status));
        for (name, value) in &self.headers {
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        head.push_str(&format!("Content-Length: {}\r\nConnection: close\r\n\r\n", content_length));
        head.into_bytes()
    }

    /// Full wire form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.head_bytes(self.body.len() as u64);
        out.extend_from_slice(&self.body);
        out
    }

    /// Wire form as text, for `Command::Send`. Non-UTF-8 body bytes are replaced.
    pub fn into_text(self) -> String {
        String::from_utf8_lossy(&self.to_bytes()).into_owned()
    }
}
