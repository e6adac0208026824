//! Echo handler: the body is the request line as received.

use super::{Handler, HandlerError, Reply};
use crate::protocols::http::Request;

#[derive(Debug, Clone, Copy, Default)]
pub struct Echo;

impl Handler for Echo {
    fn handle(&self, request: &Request) -> Result<Reply, HandlerError> {
        Ok(Reply::text(format!("{}\n", request.raw_line)))
    }
}
