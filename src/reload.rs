//! Live reload over WebSocket.
//!
//! Browsers opened through the dev server connect to `[serve.reload_port]`
//! (the script is injected by [`crate::serve`]). Whenever the output tree
//! settles after a change, every connected client receives `reload`.

use crate::log;
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::{
    net::{IpAddr, SocketAddr, TcpListener, TcpStream},
    path::Path,
    sync::{
        Arc,
        mpsc::{self, Receiver, RecvTimeoutError},
    },
    thread,
    time::{Duration, Instant},
};
use tungstenite::{Message, WebSocket};

/// Quiet period on the output tree before clients are told to reload.
const QUIET_MS: u64 = 300;

/// Upper bound on a blocked send to a stalled client.
const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Text frame sent to clients.
pub const RELOAD_MESSAGE: &str = "reload";

/// Accepts reload clients and broadcasts to them.
pub struct ReloadNotifier {
    addr: SocketAddr,
    clients: Mutex<Vec<WebSocket<TcpStream>>>,
}

impl ReloadNotifier {
    /// Bind the reload socket and start accepting clients in the background.
    pub fn bind(interface: IpAddr, port: u16) -> Result<Arc<Self>> {
        let listener = TcpListener::bind((interface, port))
            .with_context(|| format!("Failed to bind reload socket on {interface}:{port}"))?;
        let addr = listener.local_addr()?;

        let notifier = Arc::new(Self {
            addr,
            clients: Mutex::new(Vec::new()),
        });

        let acceptor = Arc::clone(&notifier);
        thread::spawn(move || acceptor.accept_loop(&listener));

        log!("reload"; "ws://{}", addr);
        Ok(notifier)
    }

    #[cfg(test)]
    const fn addr(&self) -> SocketAddr {
        self.addr
    }

    #[cfg(test)]
    fn client_count(&self) -> usize {
        self.clients.lock().len()
    }

    /// Send `reload` to every client, dropping the ones that fail.
    /// Returns the number of clients reached.
    pub fn broadcast(&self) -> usize {
        let mut clients = self.clients.lock();
        clients.retain_mut(|ws| ws.send(Message::text(RELOAD_MESSAGE)).is_ok());
        clients.len()
    }

    /// Watch `dest` and broadcast once changes settle. The returned watcher
    /// must be kept alive.
    pub fn watch(self: &Arc<Self>, dest: &Path) -> Result<RecommendedWatcher> {
        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(tx).context("Failed to create reload watcher")?;
        watcher
            .watch(dest, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", dest.display()))?;

        let notifier = Arc::clone(self);
        thread::spawn(move || notifier.debounce_loop(&rx));
        Ok(watcher)
    }

    fn accept_loop(&self, listener: &TcpListener) {
        for stream in listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    log!("reload"; "accept error: {e}");
                    continue;
                }
            };
            let _ = stream.set_write_timeout(Some(WRITE_TIMEOUT));

            match tungstenite::accept(stream) {
                Ok(ws) => self.clients.lock().push(ws),
                Err(e) => log!("reload"; "handshake failed: {e}"),
            }
        }
    }

    fn debounce_loop(&self, rx: &Receiver<notify::Result<Event>>) {
        let quiet = Duration::from_millis(QUIET_MS);
        let mut last_change: Option<Instant> = None;

        loop {
            let timeout = if last_change.is_some() { quiet } else { Duration::from_secs(60) };
            match rx.recv_timeout(timeout) {
                Ok(Ok(event)) if !matches!(event.kind, EventKind::Access(_)) => {
                    last_change = Some(Instant::now());
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => log!("reload"; "watch error: {e}"),
                Err(RecvTimeoutError::Timeout) => {
                    if last_change.is_some_and(|t| t.elapsed() >= quiet) {
                        last_change = None;
                        let reached = self.broadcast();
                        if reached > 0 {
                            log!("reload"; "{reached} client(s)");
                        }
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn localhost() -> IpAddr {
        "127.0.0.1".parse().unwrap()
    }

    fn wait_for(cond: impl Fn() -> bool) -> bool {
        let start = Instant::now();
        while !cond() {
            if start.elapsed() > Duration::from_secs(5) {
                return false;
            }
            thread::sleep(Duration::from_millis(20));
        }
        true
    }

    fn connect(notifier: &ReloadNotifier) -> WebSocket<tungstenite::stream::MaybeTlsStream<TcpStream>> {
        let url = format!("ws://{}", notifier.addr());
        let (socket, _) = tungstenite::connect(url).unwrap();
        socket
    }

    #[test]
    fn test_broadcast_without_clients() {
        let notifier = ReloadNotifier::bind(localhost(), 0).unwrap();
        assert_eq!(notifier.broadcast(), 0);
    }

    #[test]
    fn test_client_receives_reload() {
        let notifier = ReloadNotifier::bind(localhost(), 0).unwrap();
        let mut client = connect(&notifier);
        assert!(wait_for(|| notifier.client_count() == 1));

        assert_eq!(notifier.broadcast(), 1);
        let msg = client.read().unwrap();
        assert_eq!(msg.to_text().unwrap(), RELOAD_MESSAGE);
    }

    #[test]
    fn test_output_change_triggers_reload() {
        let dir = TempDir::new().unwrap();
        let notifier = ReloadNotifier::bind(localhost(), 0).unwrap();
        let _watcher = notifier.watch(dir.path()).unwrap();
        let mut client = connect(&notifier);
        assert!(wait_for(|| notifier.client_count() == 1));

        fs::write(dir.path().join("index.html"), "<p>new</p>").unwrap();
        let msg = client.read().unwrap();
        assert_eq!(msg.to_text().unwrap(), RELOAD_MESSAGE);
    }
}
