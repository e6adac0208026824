//! Dice-roll handler.
//!
//! Reads `rolls` (default 1) and `sides` (default 6) from the query string
//! and rolls that many dice. The body starts with a summary of the parsed
//! request, followed by one `Roll: N` entry per die:
//!
//! ```text
//! Request Line: GET /?rolls=2&sides=6 HTTP/1.1
//! HTTP Method: GET
//! Path: /
//! Parameters: {"rolls": "2", "sides": "6"}
//! Roll: 4
//! Roll: 1
//! ```
//!
//! The HTML format renders the summary as paragraphs and the rolls as a
//! `<ul>` list.

use super::{Handler, HandlerError, Reply};
use crate::protocols::http::Request;
use rand::Rng;
use std::fmt::Write;

const DEFAULT_ROLLS: &str = "1";
const DEFAULT_SIDES: &str = "6";

/// Output format for the dice body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiceFormat {
    Text,
    Html,
}

#[derive(Debug, Clone)]
pub struct DiceRoll {
    format: DiceFormat,
    max_rolls: u32,
}

impl DiceRoll {
    pub fn new(format: DiceFormat, max_rolls: u32) -> Self {
        Self { format, max_rolls }
    }

    /// Roll using the given random source.
    pub fn roll_with<R: Rng>(
        &self,
        request: &Request,
        rng: &mut R,
    ) -> Result<Reply, HandlerError> {
        let params = &request.query_params;
        let rolls = parse_param("rolls", params.get("rolls").unwrap_or(DEFAULT_ROLLS))?;
        let sides = parse_param("sides", params.get("sides").unwrap_or(DEFAULT_SIDES))?;

        if rolls > self.max_rolls {
            return Err(HandlerError::OutOfRange {
                param: "rolls",
                value: rolls,
                min: 0,
                max: self.max_rolls,
            });
        }
        if sides == 0 {
            return Err(HandlerError::OutOfRange {
                param: "sides",
                value: sides,
                min: 1,
                max: u32::MAX,
            });
        }

        let results: Vec<u32> = (0..rolls).map(|_| rng.gen_range(1..=sides)).collect();

        Ok(match self.format {
            DiceFormat::Text => Reply::text(render_text(request, &results)),
            DiceFormat::Html => Reply::html(render_html(request, &results)),
        })
    }
}

impl Handler for DiceRoll {
    fn handle(&self, request: &Request) -> Result<Reply, HandlerError> {
        self.roll_with(request, &mut rand::thread_rng())
    }
}

fn parse_param(param: &'static str, value: &str) -> Result<u32, HandlerError> {
    value.parse().map_err(|_| HandlerError::InvalidNumber {
        param,
        value: value.to_string(),
    })
}

fn render_text(request: &Request, results: &[u32]) -> String {
    let mut body = format!(
        "Request Line: {}\nHTTP Method: {}\nPath: {}\nParameters: {}\n",
        request.raw_line, request.method, request.path, request.query_params
    );
    for roll in results {
        // Writing to a String cannot fail.
        let _ = writeln!(body, "Roll: {roll}");
    }
    body
}

fn render_html(request: &Request, results: &[u32]) -> String {
    let mut body = String::from("<html><body>\n");
    let _ = writeln!(
        body,
        "<p>Request Line: {}</p>",
        escape_html(&request.raw_line)
    );
    let _ = writeln!(body, "<p>HTTP Method: {}</p>", escape_html(&request.method));
    let _ = writeln!(body, "<p>Path: {}</p>", escape_html(&request.path));
    let _ = writeln!(
        body,
        "<p>Parameters: {}</p>",
        escape_html(&request.query_params.to_string())
    );
    body.push_str("<ul>\n");
    for roll in results {
        let _ = writeln!(body, "<li>Roll: {roll}</li>");
    }
    body.push_str("</ul>\n</body></html>\n");
    body
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
