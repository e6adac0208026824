//! TCP listener and accept loop.
//!
//! Accepts connections and hands each one to the HTTP request/response
//! cycle, either inline (sequential) or on its own task bounded by a
//! semaphore (concurrent).

use crate::config::{Config, ServeMode};
use crate::handlers::{self, Handler};
use crate::protocols::http::{handle_connection, ConnectionSettings, Outcome};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};

/// Server instance
pub struct Server {
    listener: TcpListener,
    handler: Arc<dyn Handler>,
    settings: ConnectionSettings,
    mode: ServeMode,
    max_connections: usize,
    connection_limit: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
}

impl Server {
    /// Bind the listening socket described by `config`.
    pub async fn bind(config: &Config) -> io::Result<Self> {
        let handler = handlers::from_config(config);
        Self::bind_with_handler(config, handler).await
    }

    /// Bind with an explicit handler instead of the configured one.
    pub async fn bind_with_handler(
        config: &Config,
        handler: Arc<dyn Handler>,
    ) -> io::Result<Self> {
        let addr = resolve(&config.host, config.port).await?;
        let listener = listen(addr, config.backlog)?;
        let (tx, _rx) = watch::channel(false);

        Ok(Server {
            listener,
            handler,
            settings: ConnectionSettings {
                read_buffer_size: config.read_buffer_size,
                read_timeout: config.read_timeout_ms.map(Duration::from_millis),
            },
            mode: config.mode,
            max_connections: config.max_connections,
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
            shutdown: tx,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Stop accepting connections and make `serve` return.
    ///
    /// Connections still waiting for their request are closed without a
    /// response; responses already being written are finished.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Accept connections until shut down.
    ///
    /// Accept errors and per-connection failures are logged; they never end
    /// the loop.
    pub async fn serve(&self) -> io::Result<()> {
        let mut stop = self.shutdown.subscribe();
        info!(address = %self.local_addr()?, mode = ?self.mode, "Server listening");

        loop {
            let stopping = *stop.borrow_and_update();
            if stopping {
                break;
            }

            // Wait for a connection slot
            let permit = match self.mode {
                ServeMode::Concurrent => tokio::select! {
                    permit = self.connection_limit.clone().acquire_owned() => {
                        Some(permit.map_err(|e| io::Error::new(io::ErrorKind::Other, e))?)
                    }
                    _ = stop.changed() => continue,
                },
                ServeMode::Sequential => None,
            };

            let accepted = tokio::select! {
                accepted = self.listener.accept() => accepted,
                _ = stop.changed() => continue,
            };

            let (stream, addr) = match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                    continue;
                }
            };
            debug!(peer = %addr, "New connection");

            match permit {
                Some(permit) => {
                    let handler = Arc::clone(&self.handler);
                    let settings = self.settings;
                    let stop = stop.clone();
                    tokio::spawn(async move {
                        serve_connection(stream, addr, handler.as_ref(), &settings, stop).await;
                        drop(permit);
                    });
                }
                None => {
                    let stop = stop.clone();
                    serve_connection(stream, addr, self.handler.as_ref(), &self.settings, stop)
                        .await
                }
            }
        }

        // Every permit back means every spawned connection has finished.
        let _all = self
            .connection_limit
            .acquire_many(self.max_connections as u32)
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        info!("Server stopped");
        Ok(())
    }
}

async fn serve_connection(
    stream: TcpStream,
    addr: SocketAddr,
    handler: &dyn Handler,
    settings: &ConnectionSettings,
    stop: watch::Receiver<bool>,
) {
    match handle_connection(stream, handler, settings, stop).await {
        Ok(Outcome::Responded(status)) => debug!(peer = %addr, status, "Response sent"),
        Ok(outcome) => debug!(peer = %addr, ?outcome, "Closed without response"),
        Err(e) => warn!(peer = %addr, error = %e, "Connection error"),
    }
}

async fn resolve(host: &str, port: u16) -> io::Result<SocketAddr> {
    tokio::net::lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("{host}:{port} did not resolve to an address"),
            )
        })
}

/// Create a non-blocking listening socket with an explicit backlog.
fn listen(addr: SocketAddr, backlog: u32) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog.min(i32::MAX as u32) as i32)?;
    TcpListener::from_std(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HandlerKind;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::task::JoinHandle;

    fn test_config(mode: ServeMode, handler: HandlerKind) -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            backlog: 128,
            mode,
            max_connections: 8,
            read_buffer_size: 1024,
            read_timeout_ms: None,
            handler,
            max_rolls: 1000,
            log_level: "info".to_string(),
        }
    }

    async fn start(config: Config) -> (SocketAddr, Arc<Server>, JoinHandle<io::Result<()>>) {
        let server = Arc::new(Server::bind(&config).await.unwrap());
        let addr = server.local_addr().unwrap();
        let serving = Arc::clone(&server);
        let task = tokio::spawn(async move { serving.serve().await });
        (addr, server, task)
    }

    async fn send(addr: SocketAddr, request: &[u8]) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request).await.unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        String::from_utf8(response).unwrap()
    }

    fn split_response(response: &str) -> (&str, &str) {
        response.split_once("\r\n\r\n").unwrap()
    }

    #[tokio::test]
    async fn test_echo_end_to_end() {
        let (addr, handle, task) = start(test_config(ServeMode::Sequential, HandlerKind::Echo)).await;

        let response = send(addr, b"GET /echo HTTP/1.1\r\n\r\n").await;
        assert_eq!(
            response,
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 19\r\n\r\nGET /echo HTTP/1.1\n"
        );

        handle.shutdown();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_sequential_connections_are_independent() {
        let (addr, handle, task) = start(test_config(ServeMode::Sequential, HandlerKind::Dice)).await;

        for (rolls, sides) in [(2u32, 6u32), (5, 20)] {
            let request = format!("GET /?rolls={rolls}&sides={sides} HTTP/1.1\r\n\r\n");
            let response = send(addr, request.as_bytes()).await;
            let (head, body) = split_response(&response);

            assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
            assert!(head.contains(&format!("Content-Length: {}", body.len())));
            let values: Vec<u32> = body
                .lines()
                .filter_map(|l| l.strip_prefix("Roll: "))
                .map(|n| n.parse().unwrap())
                .collect();
            assert_eq!(values.len(), rolls as usize);
            assert!(values.iter().all(|n| (1..=sides).contains(n)));
        }

        handle.shutdown();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_empty_connection_gets_no_response() {
        let (addr, handle, task) = start(test_config(ServeMode::Sequential, HandlerKind::Echo)).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.shutdown().await.unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        assert!(response.is_empty());

        // The loop keeps serving afterwards.
        let response = send(addr, b"GET /after HTTP/1.0\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.0 200 OK\r\n"));

        handle.shutdown();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_favicon_gets_no_response() {
        let (addr, handle, task) = start(test_config(ServeMode::Concurrent, HandlerKind::Dice)).await;

        let response = send(addr, b"GET /favicon.ico HTTP/1.1\r\n\r\n").await;
        assert!(response.is_empty());

        handle.shutdown();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_malformed_request_does_not_stop_server() {
        let (addr, handle, task) = start(test_config(ServeMode::Sequential, HandlerKind::Echo)).await;

        let response = send(addr, b"NONSENSE\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));

        let response = send(addr, b"GET /ok HTTP/1.1\r\n\r\n").await;
        assert!(response.ends_with("\r\n\r\nGET /ok HTTP/1.1\n"));

        handle.shutdown();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_mode_serves_past_stalled_client() {
        let (addr, handle, task) = start(test_config(ServeMode::Concurrent, HandlerKind::Echo)).await;

        // Connected but silent.
        let mut stalled = TcpStream::connect(addr).await.unwrap();

        let response = tokio::time::timeout(
            Duration::from_secs(5),
            send(addr, b"GET /fast HTTP/1.1\r\n\r\n"),
        )
        .await
        .expect("second client was blocked by the first");
        assert!(response.ends_with("GET /fast HTTP/1.1\n"));

        // The stalled client is still connected; shutdown must not wait on it.
        handle.shutdown();
        tokio::time::timeout(Duration::from_secs(3), task)
            .await
            .expect("serve did not return after shutdown")
            .unwrap()
            .unwrap();

        let mut response = Vec::new();
        stalled.read_to_end(&mut response).await.unwrap();
        assert!(response.is_empty());
    }

    async fn assert_shutdown_with_idle_client(mode: ServeMode) {
        let (addr, handle, task) = start(test_config(mode, HandlerKind::Echo)).await;

        let _idle = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        handle.shutdown();
        tokio::time::timeout(Duration::from_secs(3), task)
            .await
            .unwrap_or_else(|_| panic!("{mode:?}: serve did not return after shutdown"))
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_with_idle_client_concurrent() {
        assert_shutdown_with_idle_client(ServeMode::Concurrent).await;
    }

    #[tokio::test]
    async fn test_shutdown_with_idle_client_sequential() {
        assert_shutdown_with_idle_client(ServeMode::Sequential).await;
    }

    #[tokio::test]
    async fn test_read_timeout_drops_silent_client() {
        let mut config = test_config(ServeMode::Sequential, HandlerKind::Echo);
        config.read_timeout_ms = Some(50);
        let (addr, handle, task) = start(config).await;

        let mut stalled = TcpStream::connect(addr).await.unwrap();
        let mut response = Vec::new();
        tokio::time::timeout(Duration::from_secs(5), stalled.read_to_end(&mut response))
            .await
            .expect("silent client was not dropped")
            .unwrap();
        assert!(response.is_empty());

        handle.shutdown();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_before_serve() {
        let server = Server::bind(&test_config(ServeMode::Concurrent, HandlerKind::Echo))
            .await
            .unwrap();
        server.shutdown();
        server.serve().await.unwrap();
    }
}
