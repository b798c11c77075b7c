use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::announce::{self, ServiceAdvertisement, ServiceAnnouncer};
use crate::error::{RaopError, Result};
use crate::protocol::response::SERVER_AGENT;
use crate::protocol::{ParserLimits, Router};
use crate::transport::pool::{DEFAULT_READER_CAPACITY, ReaderPool};
use crate::transport::tcp;

/// Server-level configuration used by the connection glue.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `Server` header value on success responses.
    pub server_agent: String,
    /// Line and body bounds for a single request.
    pub limits: ParserLimits,
    /// Size of each pooled read buffer.
    pub reader_capacity: usize,
    /// Socket read/write timeout per connection. `None` blocks forever.
    pub io_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_agent: SERVER_AGENT.to_string(),
            limits: ParserLimits::default(),
            reader_capacity: DEFAULT_READER_CAPACITY,
            io_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// High-level RAOP receiver.
///
/// Owns the route table, the reader pool and the listener thread.
/// Delegates per-connection handling to [`transport::tcp`](crate::transport::tcp).
pub struct Server {
    router: Arc<Router>,
    pool: Arc<ReaderPool>,
    running: Arc<AtomicBool>,
    bind_addr: String,
    local_addr: Option<SocketAddr>,
    config: Arc<ServerConfig>,
}

impl Server {
    pub fn new(bind_addr: &str) -> Self {
        Self::with_config(bind_addr, ServerConfig::default())
    }

    /// Receiver serving [`Router::raop`] with custom configuration.
    pub fn with_config(bind_addr: &str, config: ServerConfig) -> Self {
        let router = Router::raop().with_server_agent(&config.server_agent);
        Self::with_router(bind_addr, router, config)
    }

    /// Receiver serving a caller-built route table.
    pub fn with_router(bind_addr: &str, router: Router, config: ServerConfig) -> Self {
        Self {
            router: Arc::new(router),
            pool: Arc::new(ReaderPool::default()),
            running: Arc::new(AtomicBool::new(false)),
            bind_addr: bind_addr.to_string(),
            local_addr: None,
            config: Arc::new(config),
        }
    }

    pub fn start(&mut self) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            return Err(RaopError::AlreadyRunning);
        }

        let listener = TcpListener::bind(&self.bind_addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);

        self.running.store(true, Ordering::SeqCst);

        let running = self.running.clone();
        let router = self.router.clone();
        let pool = self.pool.clone();
        let config = self.config.clone();

        tracing::info!(addr = %local_addr, "RAOP server listening");

        thread::spawn(move || {
            tcp::accept_loop(listener, router, pool, config, running);
        });

        Ok(())
    }

    /// Publish `advertisement`, then start listening.
    ///
    /// If registration fails the server is not started. If the listener
    /// cannot bind, the advertisement is withdrawn again.
    pub fn start_advertised(
        &mut self,
        announcer: &mut dyn ServiceAnnouncer,
        advertisement: &ServiceAdvertisement,
    ) -> Result<()> {
        announce::announce(announcer, advertisement)?;
        if let Err(e) = self.start() {
            if let Err(de) = announcer.deregister() {
                tracing::warn!(error = %de, "failed to withdraw advertisement");
            }
            return Err(e);
        }
        Ok(())
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        tracing::info!("server stopping");
    }

    /// Stop listening and withdraw the advertisement.
    pub fn stop_advertised(&mut self, announcer: &mut dyn ServiceAnnouncer) -> Result<()> {
        self.stop();
        announcer.deregister()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Address the listener is bound to. Useful when binding port 0.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.local_addr.ok_or(RaopError::NotStarted)
    }

    pub fn router(&self) -> Arc<Router> {
        self.router.clone()
    }

    /// Returns the server's configuration.
    pub fn config(&self) -> Arc<ServerConfig> {
        self.config.clone()
    }
}
