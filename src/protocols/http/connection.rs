//! Per-connection request/response cycle.

use super::parser;
use super::response::{Response, DEFAULT_VERSION};
use crate::handlers::Handler;
use bytes::BytesMut;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tracing::{debug, trace, warn};

/// Browsers request this alongside every page; it is not answered.
const FAVICON_PROBE: &str = "favicon.ico";

/// Per-connection I/O limits.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    /// Ceiling for the single read of a request.
    pub read_buffer_size: usize,
    /// `None` blocks until the client sends data or disconnects.
    pub read_timeout: Option<Duration>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            read_buffer_size: 1024,
            read_timeout: None,
        }
    }
}

/// How a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A response was written.
    Responded(u16),
    /// The client closed without sending anything.
    Empty,
    /// Favicon request, closed unanswered.
    FaviconProbe,
    /// The client sent nothing before the read timeout.
    TimedOut,
    /// Server shutdown arrived while waiting for the request.
    Interrupted,
}

/// Serve one request on `stream`, then close it.
///
/// At most one response is written. The stream is shut down on every path
/// that reaches the end of the cycle; I/O errors are returned to the caller
/// and the stream is dropped.
///
/// `stop` flipping to `true` while the request is still awaited closes the
/// connection unanswered. A response already being written is finished.
pub async fn handle_connection<S>(
    mut stream: S,
    handler: &dyn Handler,
    settings: &ConnectionSettings,
    mut stop: watch::Receiver<bool>,
) -> Result<Outcome, Box<dyn std::error::Error + Send + Sync>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let read = tokio::select! {
        read = read_request(&mut stream, settings) => read?,
        _ = stopped(&mut stop) => Read::Interrupted,
    };

    let outcome = match read {
        Read::Empty => {
            trace!("Connection closed by client before sending data");
            Outcome::Empty
        }
        Read::TimedOut => {
            debug!("Read timed out, closing");
            Outcome::TimedOut
        }
        Read::Interrupted => {
            debug!("Shutting down, closing idle connection");
            Outcome::Interrupted
        }
        Read::Text(text) if text.contains(FAVICON_PROBE) => {
            trace!("Skipping favicon request");
            Outcome::FaviconProbe
        }
        Read::Text(text) => {
            let response = respond(&text, handler);
            stream.write_all(&response.encode()).await?;
            stream.flush().await?;
            Outcome::Responded(response.status().code())
        }
    };

    stream.shutdown().await?;
    Ok(outcome)
}

/// Result of the single bounded read.
enum Read {
    Empty,
    TimedOut,
    Interrupted,
    Text(String),
}

/// Resolves once `stop` reads `true`; never, if the sender is gone.
async fn stopped(stop: &mut watch::Receiver<bool>) {
    let result = stop.wait_for(|stopping| *stopping).await.map(|_| ());
    if result.is_err() {
        std::future::pending::<()>().await;
    }
}

async fn read_request<S>(stream: &mut S, settings: &ConnectionSettings) -> std::io::Result<Read>
where
    S: AsyncRead + Unpin,
{
    let mut buffer = BytesMut::with_capacity(settings.read_buffer_size);
    buffer.resize(settings.read_buffer_size, 0);

    let n = match settings.read_timeout {
        Some(timeout) => match tokio::time::timeout(timeout, stream.read(&mut buffer[..])).await {
            Ok(result) => result?,
            Err(_) => return Ok(Read::TimedOut),
        },
        None => stream.read(&mut buffer[..]).await?,
    };

    if n == 0 {
        return Ok(Read::Empty);
    }
    buffer.truncate(n);
    trace!(bytes = n, "Read request");

    Ok(Read::Text(String::from_utf8_lossy(&buffer).into_owned()))
}

/// Build the response for decoded request text.
pub fn respond(text: &str, handler: &dyn Handler) -> Response {
    let request = match parser::parse(text) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Rejecting request");
            return Response::bad_request(DEFAULT_VERSION, &e.to_string());
        }
    };

    debug!(method = %request.method, path = %request.path, "Handling request");

    match handler.handle(&request) {
        Ok(reply) => Response::ok(&request.http_version, reply.content_type, &reply.body),
        Err(e) => {
            warn!(error = %e, "Handler rejected request");
            Response::bad_request(&request.http_version, &e.to_string())
        }
    }
}
