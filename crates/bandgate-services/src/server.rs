//! Accept loop — one handler task per connection.

use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinSet;

use crate::handler::ConnectionHandler;
use crate::state::{ConnectionId, ServerState};

pub struct Server {
    listener: TcpListener,
    state: ServerState,
    shutdown: broadcast::Receiver<()>,
    next_id: u64,
}

impl Server {
    pub fn new(
        listener: TcpListener,
        state: ServerState,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            listener,
            state,
            shutdown,
            next_id: 1,
        }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        let mut handlers = JoinSet::new();

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!(in_flight = handlers.len(), "server shutting down");
                    break;
                }

                Some(joined) = handlers.join_next() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            tracing::error!(error = %e, "connection handler panicked");
                        }
                    }
                }

                accepted = self.listener.accept() => {
                    let (stream, addr) = match accepted {
                        Ok(a) => a,
                        Err(e) => {
                            tracing::warn!(error = %e, "accept failed");
                            continue;
                        }
                    };

                    let id = ConnectionId(self.next_id);
                    self.next_id += 1;
                    tracing::debug!(conn = %id, peer = %addr, "connection accepted");

                    let handler = ConnectionHandler::new(self.state.clone(), id, addr.ip());
                    handlers.spawn(handler.run(stream));
                }
            }
        }

        // Aborted handlers drop their admissions, returning the bandwidth.
        handlers.shutdown().await;
        Ok(())
    }
}
