//! A minimal listener that serves one handler.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::signal;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use log::{debug, error, info, warn};

use crate::context::RequestContext;
use crate::parser::parse_request;
use crate::server::config::ServerConfig;
use crate::server::error::Error;
use crate::server::handler::HandlerFn;
use crate::server::response::{HttpResponse, StatusCode};

/// An HTTP listener for a single [`HandlerFn`].
pub struct HttpServer {
    /// The server configuration.
    pub config: ServerConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Bind, accept connections and serve `handler` until Ctrl+C.
    ///
    /// On shutdown every outstanding request context is cancelled and active
    /// connections get up to 30 seconds to finish.
    pub async fn serve(&self, handler: HandlerFn) -> Result<(), Error> {
        let listener = TcpListener::bind(self.config.addr).await?;
        info!("Server listening on http://{addr}", addr = self.config.addr);

        let (root, cancel) = RequestContext::with_cancel();
        let semaphore = Arc::new(Semaphore::new(self.config.max_connections));
        let config = Arc::new(self.config.clone());
        let mut tasks = JoinSet::new();

        let shutdown = signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                result = &mut shutdown => {
                    if let Err(e) = result {
                        error!("Error waiting for Ctrl+C: {e}");
                    }
                    info!("Shutting down server...");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((socket, addr)) => {
                        Self::spawn_connection(socket, addr, &semaphore, &handler, &config, &root, &mut tasks).await;
                    }
                    Err(e) => {
                        error!("Error accepting connection: {e}");
                        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
                    }
                },
            }

            // Reap finished connections so the set does not grow unbounded.
            while let Some(joined) = tasks.try_join_next() {
                if let Err(e) = joined {
                    error!("Connection task failed: {e}");
                }
            }
        }

        cancel.cancel();
        Self::drain(&mut tasks).await;
        Ok(())
    }

    async fn spawn_connection(
        mut socket: TcpStream,
        addr: SocketAddr,
        semaphore: &Arc<Semaphore>,
        handler: &HandlerFn,
        config: &Arc<ServerConfig>,
        root: &RequestContext,
        tasks: &mut JoinSet<()>,
    ) {
        let Ok(permit) = semaphore.clone().try_acquire_owned() else {
            warn!("Connection limit reached, rejecting connection from {addr}");
            let response = HttpResponse::new(StatusCode::ServiceUnavailable)
                .with_content_type("text/plain")
                .with_body_string("Server is at capacity, please try again later");
            if let Err(e) = socket.write_all(&response.to_bytes()).await {
                debug!("Failed to send capacity response to {addr}: {e}");
            }
            return;
        };

        let handler = handler.clone();
        let config = config.clone();
        let root = root.clone();
        tasks.spawn(async move {
            let _permit = permit;
            if let Err(e) = Self::handle_connection(&mut socket, &handler, &config, &root).await {
                debug!("Connection from {addr} ended with error: {e}");
            }
        });
    }

    async fn drain(tasks: &mut JoinSet<()>) {
        info!("Waiting for {len} active connections to complete...", len = tasks.len());
        let drained = tokio::time::timeout(tokio::time::Duration::from_secs(30), async {
            while let Some(res) = tasks.join_next().await {
                if let Err(e) = res {
                    error!("Task failed during shutdown: {e}");
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!("Shutdown timeout elapsed, aborting {len} connections", len = tasks.len());
            tasks.abort_all();
        }
        info!("Server shutdown complete");
    }

    /// Serve a single request read from `socket`.
    ///
    /// The request is given a context derived from `root`, with the
    /// configured timeout as its deadline. Parse failures are answered with
    /// `400` and handler failures with `500`; both are also returned.
    ///
    /// The request is taken from a single read of at most
    /// `read_buffer_size` bytes. A body that arrives in later segments is
    /// not waited for and is parsed as truncated.
    pub async fn handle_connection(
        socket: &mut (impl AsyncRead + AsyncWrite + Unpin),
        handler: &HandlerFn,
        config: &ServerConfig,
        root: &RequestContext,
    ) -> Result<(), Error> {
        let mut buf = vec![0; config.read_buffer_size];

        let n = socket.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }

        let request = match parse_request(&buf[..n]) {
            Ok(req) => req,
            Err(e) => {
                let response = HttpResponse::new(StatusCode::BadRequest)
                    .with_content_type("text/plain")
                    .with_body_string(format!("Error parsing request: {e}"));
                socket.write_all(&response.to_bytes()).await?;
                return Err(Error::ParseError(e));
            }
        };

        let context = match config.request_timeout {
            Some(timeout) => root.clone().with_timeout(timeout),
            None => root.clone(),
        };
        debug!("{method} {path}", method = request.method, path = request.path);

        let response = match handler(request.with_context(context)).await {
            Ok(response) => response,
            Err(e) => {
                let response = HttpResponse::new(StatusCode::InternalServerError)
                    .with_content_type("text/plain")
                    .with_body_string(format!("Internal server error: {e}"));
                socket.write_all(&response.to_bytes()).await?;
                return Err(e);
            }
        };

        socket.write_all(&response.to_bytes()).await?;
        socket.flush().await?;
        Ok(())
    }
}
