use std::io::Write;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::protocol::{RaopRequest, Router};
use crate::server::ServerConfig;
use crate::transport::pool::ReaderPool;

/// Non-blocking TCP accept loop.
///
/// Checks the `running` flag between accepts with a 50ms poll interval
/// so that [`crate::server::Server::stop`] can terminate it promptly.
pub fn accept_loop(
    listener: TcpListener,
    router: Arc<Router>,
    pool: Arc<ReaderPool>,
    config: Arc<ServerConfig>,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _)) => {
                if stream.set_nonblocking(false).is_err() {
                    continue;
                }
                let r = router.clone();
                let p = pool.clone();
                let c = config.clone();
                thread::spawn(move || {
                    Connection::handle(stream, &r, &p, &c);
                });
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    tracing::warn!(error = %e, "TCP accept error");
                }
            }
        }
    }
    tracing::debug!("accept loop exited");
}

/// A single sender connection: one request, one response, then close.
struct Connection {
    stream: TcpStream,
    peer_addr: SocketAddr,
}

impl Connection {
    /// Entry point: run the exchange and drop the socket.
    pub fn handle(stream: TcpStream, router: &Router, pool: &ReaderPool, config: &ServerConfig) {
        let peer_addr = match stream.peer_addr() {
            Ok(addr) => addr,
            Err(_) => return,
        };

        tracing::info!(%peer_addr, "client connected");

        if let Err(e) = stream
            .set_read_timeout(config.io_timeout)
            .and_then(|_| stream.set_write_timeout(config.io_timeout))
        {
            tracing::warn!(%peer_addr, error = %e, "failed to set socket timeouts");
            return;
        }

        let conn = Connection { stream, peer_addr };
        let reason = conn.exchange(router, pool, config);

        tracing::info!(%peer_addr, reason, "client disconnected");
    }

    /// Read-parse-dispatch-write. Returns the reason for closing.
    ///
    /// Nothing is written back when the request cannot be parsed.
    fn exchange(&self, router: &Router, pool: &ReaderPool, config: &ServerConfig) -> &'static str {
        let parsed = {
            let mut reader = pool.acquire(&self.stream, config.reader_capacity);
            RaopRequest::read_from(&mut reader, &config.limits)
        };

        let request = match parsed {
            Ok(request) => request,
            Err(e) if e.is_no_request() => return "closed without request",
            Err(e) => {
                tracing::warn!(peer = %self.peer_addr, error = %e, "parse error");
                return "parse error";
            }
        };

        tracing::debug!(
            peer = %self.peer_addr,
            verb = %request.verb,
            resource = %request.resource,
            version = %request.version,
            body_len = request.body.len(),
            "request"
        );

        let response = router.dispatch(&request);

        tracing::debug!(
            peer = %self.peer_addr,
            status = response.status_line(),
            body_len = response.body.as_ref().map_or(0, Vec::len),
            "response"
        );

        let mut writer = &self.stream;
        if writer
            .write_all(&response.serialize())
            .and_then(|_| writer.flush())
            .is_err()
        {
            return "write error";
        }
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            tracing::debug!(
                peer = %self.peer_addr,
                error = %e,
                "shutdown after response failed"
            );
        }

        "exchange complete"
    }
}
