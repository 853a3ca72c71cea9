//! Stub server accept loop.

use super::router::route_request;
use crate::stub::HttpStub;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

pub struct StubServer {
    listener: TcpListener,
    stub: Arc<HttpStub>,
}

impl StubServer {
    /// Bind the listening socket. Port 0 picks a free port.
    pub async fn bind(addr: SocketAddr, stub: Arc<HttpStub>) -> Result<Self, anyhow::Error> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, stub })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, anyhow::Error> {
        Ok(self.listener.local_addr()?)
    }

    pub fn stub(&self) -> &Arc<HttpStub> {
        &self.stub
    }

    /// Serve until the process ends
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        self.run_until(shutdown_rx).await
    }

    /// Serve until a shutdown signal arrives or its sender is dropped
    pub async fn run_until(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), anyhow::Error> {
        info!("Covenant stub listening on http://{}", self.local_addr()?);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, remote) = match accepted {
                        Ok(connection) => connection,
                        Err(e) => {
                            error!("Stub accept error: {}", e);
                            continue;
                        }
                    };
                    let io = TokioIo::new(stream);
                    let stub = Arc::clone(&self.stub);

                    tokio::spawn(async move {
                        let service = service_fn(move |req| {
                            let stub = Arc::clone(&stub);
                            async move { route_request(req, stub).await }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            debug!("Stub connection error from {}: {}", remote, e);
                        }
                    });
                }
                _ = shutdown.recv() => {
                    info!("Covenant stub shutting down");
                    return Ok(());
                }
            }
        }
    }
}
