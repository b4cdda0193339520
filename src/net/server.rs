//! Core HTTP server implementation.
//!
//! This module owns the networking side of the server:
//! - binding the listening socket,
//! - accepting TCP connections and queueing them for the worker pool,
//! - running the rate limiter's window reset.
//!
//! HTTP semantics live elsewhere. Reading and answering requests on an
//! accepted socket is done by [`Connection`](crate::net::connection::Connection),
//! which uses the [`http::parser`](crate::http::parser) to read requests and
//! the [`Dispatcher`](crate::handler::dispatcher::Dispatcher) to answer them.
//!
//! ## Concurrency
//!
//! The accept loop runs in its own task and never waits on a request. Each
//! accepted stream goes onto an unbounded queue drained by
//! `max_connections` worker tasks, one connection per worker at a time.
//! When every worker is busy, new connections wait in the queue rather
//! than being refused, so the queue can grow without bound under sustained
//! overload.

use std::io;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_std::channel::{self, Receiver};
use async_std::net::{TcpListener, TcpStream};
use async_std::task;
use futures::FutureExt;

use crate::config::ServerConfig;
use crate::handler::codec::Codec;
use crate::handler::dispatcher::Dispatcher;
use crate::handler::router::RouteTable;
use crate::net::connection::Connection;
use crate::net::rate_limit::{RATE_WINDOW, RateLimiter};

/// Pause after a failed accept, so descriptor exhaustion does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// State shared by every connection. Only the rate limiter is mutable.
pub struct Shared {
    pub config: ServerConfig,
    pub dispatcher: Arc<Dispatcher>,
    pub limiter: Arc<RateLimiter>,
}

pub struct Server {
    listener: TcpListener,
    shared: Arc<Shared>,
}

impl Server {
    /// Binds the configured address and freezes the route table.
    pub async fn bind(
        config: ServerConfig,
        routes: RouteTable,
        codec: Arc<dyn Codec>,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind((config.address, config.port)).await?;
        log::info!(
            "listening on {} with {} endpoints",
            listener.local_addr()?,
            routes.len()
        );

        let dispatcher = Arc::new(Dispatcher::new(routes, codec, &config.base_path));
        let limiter = Arc::new(RateLimiter::new(config.max_requests_per_minute));

        Ok(Self {
            listener,
            shared: Arc::new(Shared {
                config,
                dispatcher,
                limiter,
            }),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn rate_limiter(&self) -> Arc<RateLimiter> {
        Arc::clone(&self.shared.limiter)
    }

    /// Accepts connections until the listener fails for good.
    pub async fn run(self) -> io::Result<()> {
        let workers = self.shared.config.max_connections.max(1);
        let (queue, incoming) = channel::unbounded::<(TcpStream, SocketAddr)>();

        for id in 0..workers {
            task::spawn(Self::worker(id, incoming.clone(), Arc::clone(&self.shared)));
        }
        let reset = self.shared.limiter.spawn_reset_timer(RATE_WINDOW);
        log::info!("{workers} workers ready, accept queue is unbounded");

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    log::error!("failed to accept connection: {err}");
                    task::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };

            if queue.send((stream, peer)).await.is_err() {
                break;
            }
            log::debug!("{peer}: queued, {} waiting", queue.len());
        }

        reset.cancel().await;
        Ok(())
    }

    async fn worker(id: usize, incoming: Receiver<(TcpStream, SocketAddr)>, shared: Arc<Shared>) {
        while let Ok((stream, peer)) = incoming.recv().await {
            log::debug!("worker {id} takes {peer}");
            let conn = Connection::new(stream, peer, Arc::clone(&shared));
            // A panic drops this connection only; the worker stays in the pool.
            if AssertUnwindSafe(conn.run()).catch_unwind().await.is_err() {
                log::error!("worker {id}: connection from {peer} panicked, dropped");
            }
        }
    }
}
