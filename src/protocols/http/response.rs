//! HTTP response framing.

use bytes::{BufMut, Bytes, BytesMut};

/// Version used when the client's own version is unknown.
pub const DEFAULT_VERSION: &str = "HTTP/1.1";

/// Response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    BadRequest,
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::BadRequest => 400,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::BadRequest => "Bad Request",
        }
    }
}

/// A response ready to be framed onto the wire.
///
/// `Content-Length` is derived from the encoded body when the response is
/// built and the body cannot be changed afterwards, so the header always
/// matches the number of bytes sent.
#[derive(Debug, Clone)]
pub struct Response {
    version: String,
    status: Status,
    headers: Vec<(&'static str, String)>,
    body: Bytes,
}

impl Response {
    /// Build a response with a UTF-8 text body.
    pub fn new(version: &str, status: Status, content_type: &str, body: &str) -> Self {
        let body = Bytes::copy_from_slice(body.as_bytes());
        let headers = vec![
            ("Content-Type", content_type.to_string()),
            ("Content-Length", body.len().to_string()),
        ];
        Self {
            version: version.to_string(),
            status,
            headers,
            body,
        }
    }

    /// `200 OK` response.
    pub fn ok(version: &str, content_type: &str, body: &str) -> Self {
        Self::new(version, Status::Ok, content_type, body)
    }

    /// `400 Bad Request` with a one-line plain-text explanation.
    pub fn bad_request(version: &str, message: &str) -> Self {
        let body = format!("Bad Request: {message}\n");
        Self::new(version, Status::BadRequest, "text/plain", &body)
    }

    pub fn status(&self) -> Status {
        self.status
    }

    #[cfg(test)]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[cfg(test)]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Frame the status line, headers, blank line and body.
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(64 + self.body.len());
        buf.put_slice(self.version.as_bytes());
        buf.put_u8(b' ');
        buf.put_slice(self.status.code().to_string().as_bytes());
        buf.put_u8(b' ');
        buf.put_slice(self.status.reason().as_bytes());
        buf.put_slice(b"\r\n");
        for (name, value) in &self.headers {
            buf.put_slice(name.as_bytes());
            buf.put_slice(b": ");
            buf.put_slice(value.as_bytes());
            buf.put_slice(b"\r\n");
        }
        buf.put_slice(b"\r\n");
        buf.put_slice(&self.body);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_ok() {
        let response = Response::ok("HTTP/1.1", "text/plain", "hello\n");
        assert_eq!(
            &response.encode()[..],
            b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 6\r\n\r\nhello\n"
        );
    }

    #[test]
    fn test_uses_given_version() {
        let response = Response::ok("HTTP/1.0", "text/html", "");
        assert!(response.encode().starts_with(b"HTTP/1.0 200 OK\r\n"));
    }

    #[test]
    fn test_content_length_counts_bytes() {
        // 5 characters, 10 bytes
        let body = "d\u{e9}\u{1f3b2}\u{fc}\n";
        assert_eq!(body.chars().count(), 5);
        let response = Response::ok("HTTP/1.1", "text/plain", body);
        assert_eq!(response.header("content-length"), Some("10"));
        assert_eq!(response.body().len(), 10);

        let encoded = response.encode();
        let split = encoded
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .unwrap();
        assert_eq!(encoded.len() - (split + 4), 10);
    }

    #[test]
    fn test_bad_request() {
        let response = Response::bad_request(DEFAULT_VERSION, "nope");
        assert_eq!(response.status().code(), 400);
        assert_eq!(response.body(), b"Bad Request: nope\n");
        assert!(response
            .encode()
            .starts_with(b"HTTP/1.1 400 Bad Request\r\nContent-Type: text/plain\r\n"));
    }
}
