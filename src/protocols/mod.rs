//! Protocol implementations.
//!
//! - `http`: single-request HTTP/1.x over raw TCP (parser, response
//!   framing, per-connection cycle)

pub mod http;
