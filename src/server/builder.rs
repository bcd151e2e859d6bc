// ────────────────────────────────
// src/server/builder.rs
// ────────────────────────────────
use crate::server::listener::bind_tcp;
use hyper::{server::conn::Http, Body, Request, Response};
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower::Service;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("No request handler configured")]
    MissingHandler,

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
}

/// Builder so `main.rs` can inject its handler.
pub struct ServerBuilder<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    addr: SocketAddr,
    handler: Option<H>,
    max_buf_size: Option<usize>,
}

impl<H> ServerBuilder<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            handler: None,
            max_buf_size: None,
        }
    }

    pub fn with_handler(mut self, handler: H) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Caps the per-connection read buffer, which bounds request headers.
    /// Must be at least 8192 bytes.
    pub fn with_max_buf_size(mut self, max_buf_size: usize) -> Self {
        self.max_buf_size = Some(max_buf_size);
        self
    }

    /// Binds the listener and serves until `signal` resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let addr = self.addr;
        let listener = bind_tcp(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        self.serve_listener(listener, signal).await
    }

    /// Serves an already bound listener until `signal` resolves.
    pub async fn serve_listener<F>(self, listener: TcpListener, signal: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let handler = self.handler.ok_or(ServerError::MissingHandler)?;
        let local_addr = listener.local_addr().unwrap_or(self.addr);
        tracing::info!("HTTP server listening on {}", local_addr);

        tokio::pin!(signal);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(err) => {
                            tracing::warn!(%err, "accept error");
                            continue;
                        }
                    };
                    let svc = handler.clone();
                    let mut http = Http::new();
                    if let Some(max_buf_size) = self.max_buf_size {
                        http.max_buf_size(max_buf_size);
                    }

                    // one task per connection
                    tokio::spawn(async move {
                        if let Err(err) = http.serve_connection(stream, svc).await {
                            tracing::warn!(%peer, %err, "connection error");
                        }
                    });
                }
                _ = &mut signal => {
                    tracing::info!("HTTP server on {} shutting down", local_addr);
                    return Ok(());
                }
            }
        }
    }
}
