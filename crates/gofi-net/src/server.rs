//! UDP discovery listener and HTTP inform endpoint, dispatching into a
//! [`Manager`] (§4.H).

use crate::manager::Manager;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use gofi_core::discovery;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

const DISCOVERY_ADDR: &str = "0.0.0.0:10001";
const DISCOVERY_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("bind failed: {0}")]
    BindFailed(SocketAddr),
}

/// A running controller server: one UDP discovery socket, one HTTP listener,
/// both shutdown together via `close`.
pub struct Server {
    manager: Arc<Manager>,
    http_listen_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    pub fn new(manager: Arc<Manager>, http_listen_addr: SocketAddr) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            manager,
            http_listen_addr,
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn close(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Bind and run both servers; returns once `close()` is called or a
    /// listener fails to bind.
    pub async fn run(&self) -> Result<(), ServerError> {
        let socket = UdpSocket::bind(DISCOVERY_ADDR)
            .await
            .map_err(|_| ServerError::BindFailed(DISCOVERY_ADDR.parse().unwrap()))?;
        info!("discovery listener bound on {DISCOVERY_ADDR}");

        let discovery_handle = self.spawn_discovery_loop(socket);
        let (http_handle, bound_rx) = self.spawn_http_server();

        match bound_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(addr)) => {
                discovery_handle.abort();
                return Err(ServerError::BindFailed(addr));
            }
            Err(_) => {
                discovery_handle.abort();
                return Err(ServerError::BindFailed(self.http_listen_addr));
            }
        }

        let mut shutdown_rx = self.shutdown_rx.clone();
        let _ = shutdown_rx.changed().await;

        discovery_handle.abort();
        http_handle.abort();
        Ok(())
    }

    fn spawn_discovery_loop(&self, socket: UdpSocket) -> tokio::task::JoinHandle<()> {
        let manager = self.manager.clone();
        let (tx, mut rx) = tokio::sync::mpsc::channel(DISCOVERY_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            while let Some(disc) = rx.recv().await {
                manager.handle_discovery(&disc).await;
            }
        });

        tokio::spawn(async move {
            let mut buf = vec![0u8; 8192];
            loop {
                let (n, remote_addr) = match socket.recv_from(&mut buf).await {
                    Ok(v) => v,
                    Err(e) => {
                        error!("discovery socket read error: {e}");
                        break;
                    }
                };

                match discovery::decode(remote_addr, &buf[..n]) {
                    Ok(disc) => {
                        debug!(%remote_addr, "decoded discovery packet");
                        // Backpressure policy: drop the newest packet and log,
                        // rather than block or grow unboundedly (§5).
                        if tx.try_send(disc).is_err() {
                            warn!(%remote_addr, "discovery channel full, dropping packet");
                        }
                    }
                    Err(err) => {
                        warn!(%remote_addr, %err, "failed to decode discovery packet");
                    }
                }
            }
        })
    }

    fn spawn_http_server(
        &self,
    ) -> (
        tokio::task::JoinHandle<()>,
        tokio::sync::oneshot::Receiver<Result<(), SocketAddr>>,
    ) {
        let manager = self.manager.clone();
        let addr = self.http_listen_addr;
        let (bound_tx, bound_rx) = tokio::sync::oneshot::channel();

        let handle = tokio::spawn(async move {
            let app = Router::new()
                .route("/", get(liveness))
                .route("/inform", post(inform_handler))
                .with_state(manager);

            let listener = match tokio::net::TcpListener::bind(addr).await {
                Ok(l) => l,
                Err(e) => {
                    error!("failed to bind HTTP listener on {addr}: {e}");
                    let _ = bound_tx.send(Err(addr));
                    return;
                }
            };
            info!("HTTP inform listener bound on {addr}");
            let _ = bound_tx.send(Ok(()));

            if let Err(e) = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            {
                error!("HTTP server error: {e}");
            }
        });

        (handle, bound_rx)
    }
}

async fn liveness() -> &'static str {
    "hello world\n"
}

async fn inform_handler(
    State(manager): State<Arc<Manager>>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    body: Bytes,
) -> Response {
    match manager.handle_inform(remote_addr, &body) {
        Ok(reply) => {
            let mut response = reply.into_response();
            let headers = response.headers_mut();
            headers.insert(
                "Content-Type",
                HeaderValue::from_static("application/x-binary"),
            );
            headers.insert("User-Agent", HeaderValue::from_static("Unifi Controller"));
            headers.insert("Connection", HeaderValue::from_static("close"));
            response
        }
        Err(err) => {
            warn!(%remote_addr, %err, "HandleInform failed");
            let status = if is_client_error(&err) {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            status.into_response()
        }
    }
}

/// Envelope decode/unknown-AP failures are client errors (4xx); everything
/// downstream of a successful decode (crypto, JSON, config generation) is a
/// server error (5xx), per §4.H / §7.
fn is_client_error(err: &crate::manager::ManagerError) -> bool {
    matches!(
        err,
        crate::manager::ManagerError::Inform(_) | crate::manager::ManagerError::UnknownAp(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_vs_server_error_classification() {
        use crate::manager::ManagerError;
        use gofi_core::types::Mac;

        assert!(is_client_error(&ManagerError::UnknownAp(Mac([0; 6]))));
        assert!(!is_client_error(&ManagerError::DuplicateAction(Mac(
            [0; 6]
        ))));
    }
}
