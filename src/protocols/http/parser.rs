//! HTTP request line parser.
//!
//! Only the first line of the request is interpreted. Headers and any body
//! that arrive with it are ignored.

use std::fmt;

/// Ordered query parameters.
///
/// Insertion order is preserved. Inserting an existing key replaces its
/// value in place (last write wins).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw query string (the part after `?`).
    ///
    /// Segments are split on `&`, then on the first `=`. A segment without
    /// `=` maps the whole segment to an empty value. Empty segments are
    /// skipped. Values are not percent-decoded.
    pub fn parse(query: &str) -> Self {
        let mut params = Self::new();
        for segment in query.split('&').filter(|s| !s.is_empty()) {
            match segment.split_once('=') {
                Some((key, value)) => params.insert(key, value),
                None => params.insert(segment, ""),
            }
        }
        params
    }

    pub fn insert(&mut self, key: &str, value: &str) {
        match self.pairs.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.to_string(),
            None => self.pairs.push((key.to_string(), value.to_string())),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Renders as `{"rolls": "3", "sides": "10"}`, with `"` and `\` escaped.
impl fmt::Display for QueryParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (key, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key:?}: {value:?}")?;
        }
        f.write_str("}")
    }
}

/// A parsed request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub http_version: String,
    pub query_params: QueryParams,
    /// Verbatim first line of the decoded input.
    pub raw_line: String,
}

/// Request parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// No request line at all.
    Empty,
    /// Request line is not exactly `METHOD SP target SP VERSION`.
    MalformedRequestLine(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Empty => write!(f, "empty request"),
            ParseError::MalformedRequestLine(line) => {
                write!(f, "malformed request line: {line:?}")
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Parse decoded request text into a [`Request`].
pub fn parse(text: &str) -> Result<Request, ParseError> {
    let raw_line = match text.lines().next() {
        Some(line) => line,
        None => return Err(ParseError::Empty),
    };

    let tokens: Vec<&str> = raw_line.split(' ').collect();
    let (method, target, version) = match tokens.as_slice() {
        [method, target, version]
            if !method.is_empty() && !target.is_empty() && !version.is_empty() =>
        {
            (*method, *target, *version)
        }
        _ if raw_line.is_empty() => return Err(ParseError::Empty),
        _ => return Err(ParseError::MalformedRequestLine(raw_line.to_string())),
    };

    let (path, query) = target.split_once('?').unwrap_or((target, ""));

    Ok(Request {
        method: method.to_string(),
        path: path.to_string(),
        http_version: version.to_string(),
        query_params: QueryParams::parse(query),
        raw_line: raw_line.to_string(),
    })
}
