//! Body handlers.
//!
//! A handler turns a parsed request into a response body. The connection
//! pipeline owns everything else (reading, framing, closing), so new
//! behaviors only need to implement [`Handler`].
//!
//! - `echo`: replies with the request line
//! - `dice`: rolls dice described by the `rolls` and `sides` query parameters

pub mod dice;
pub mod echo;

pub use dice::{DiceFormat, DiceRoll};
pub use echo::Echo;

use crate::config::{Config, HandlerKind};
use crate::protocols::http::Request;
use std::fmt;
use std::sync::Arc;

/// Body produced by a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub content_type: &'static str,
    pub body: String,
}

impl Reply {
    pub fn text(body: String) -> Self {
        Self {
            content_type: "text/plain",
            body,
        }
    }

    pub fn html(body: String) -> Self {
        Self {
            content_type: "text/html",
            body,
        }
    }
}

/// Handler input errors, answered with a client error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// Query parameter is not a number.
    InvalidNumber { param: &'static str, value: String },
    /// Query parameter is a number outside the accepted range.
    OutOfRange {
        param: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerError::InvalidNumber { param, value } => {
                write!(
                    f,
                    "{param} must be an integer between 0 and {}, got {value:?}",
                    u32::MAX
                )
            }
            HandlerError::OutOfRange {
                param,
                value,
                min,
                max,
            } => write!(f, "{param} must be between {min} and {max}, got {value}"),
        }
    }
}

impl std::error::Error for HandlerError {}

/// Produces a response body from a parsed request.
pub trait Handler: Send + Sync {
    fn handle(&self, request: &Request) -> Result<Reply, HandlerError>;
}

/// Build the handler selected by the configuration.
pub fn from_config(config: &Config) -> Arc<dyn Handler> {
    match config.handler {
        HandlerKind::Echo => Arc::new(Echo),
        HandlerKind::Dice => Arc::new(DiceRoll::new(DiceFormat::Text, config.max_rolls)),
        HandlerKind::DiceHtml => Arc::new(DiceRoll::new(DiceFormat::Html, config.max_rolls)),
    }
}
