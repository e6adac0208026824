//! Minimal HTTP/1.x over raw TCP.
//!
//! One request per connection:
//!
//! ```text
//! accept -> single bounded read -> parse request line -> handler
//!        -> frame response -> write -> close
//! ```
//!
//! Only the request line is interpreted. The response carries exactly two
//! headers, `Content-Type` and `Content-Length`:
//!
//! ```text
//! Request:  GET /?rolls=2&sides=6 HTTP/1.1\r\n\r\n
//! Response: HTTP/1.1 200 OK\r\n
//!           Content-Type: text/plain\r\n
//!           Content-Length: <body bytes>\r\n
//!           \r\n
//!           <body>
//! ```
//!
//! ## Limitations
//!
//! A connection gets a single read of at most `read_buffer_size` bytes.
//! Requests that span several packets or exceed the buffer are truncated;
//! the request line is usually in the first packet, which is all that is
//! parsed. No keep-alive, chunked encoding or request bodies.

pub mod connection;
pub mod parser;
pub mod response;

pub use connection::{handle_connection, ConnectionSettings, Outcome};
pub use parser::Request;
