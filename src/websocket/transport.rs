use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::backoff::{ExponentialBackoff, ReconnectConfig};
use super::connector::{Connector, Outbound, Socket, SocketEvent, NORMAL_CLOSURE};
use super::dispatcher::Dispatcher;
use super::keepalive::{KeepAlive, DEFAULT_KEEP_ALIVE_INTERVAL};
use crate::error::{Error, Result};
use crate::types::ClientFrame;

/// Lifecycle state of the live connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closing,
}

/// Observable status of the live connection
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Reconnect attempts scheduled since the last successful open
    pub reconnect_attempts: u32,
    /// A reconnect timer is running
    pub reconnect_pending: bool,
    /// Last connection error, if any
    pub error: Option<String>,
    /// Reconnection gave up; stays set until the next `connect()`
    pub gave_up: bool,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Permanently disconnected until the caller connects again
    pub fn is_terminal(&self) -> bool {
        self.gave_up
    }
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            reconnect_attempts: 0,
            reconnect_pending: false,
            error: None,
            gave_up: false,
        }
    }
}

/// Transport settings
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub url: String,
    pub reconnect: ReconnectConfig,
    pub keep_alive_interval: Duration,
}

impl TransportConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect: ReconnectConfig::default(),
            keep_alive_interval: DEFAULT_KEEP_ALIVE_INTERVAL,
        }
    }
}

enum Command {
    /// Skip the rest of a pending reconnect delay
    ConnectNow,
    Disconnect,
}

/// How an open connection (or a connection attempt) ended
enum CloseOutcome {
    /// `disconnect()` was called
    ClientInitiated,
    /// Peer closed with the normal closure code
    Clean,
    /// Anything else; eligible for reconnect
    Unclean(String),
}

struct Shared {
    config: TransportConfig,
    connector: Arc<dyn Connector>,
    dispatcher: Arc<Dispatcher>,
    status: watch::Sender<ConnectionStatus>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Outbound>>>,
}

impl Shared {
    fn update(&self, f: impl FnOnce(&mut ConnectionStatus)) {
        self.status.send_modify(f);
    }

    fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }
}

struct Driver {
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

/// Reconnecting WebSocket transport
///
/// Owns at most one socket at a time. A background driver task opens the
/// socket, sends the handshake, pumps inbound frames into the
/// [`Dispatcher`], emits keep-alive pings and runs the reconnect timer. On an
/// unclean close it retries after `min(initial * multiplier^attempt, max)`
/// until `max_attempts` reconnects have been scheduled, then gives up and
/// reports a terminal [`Error::ReconnectFailed`] in the status.
pub struct Transport {
    shared: Arc<Shared>,
    driver: Mutex<Option<Driver>>,
}

impl Transport {
    pub fn new(
        config: TransportConfig,
        connector: Arc<dyn Connector>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::default());
        Self {
            shared: Arc::new(Shared {
                config,
                connector,
                dispatcher,
                status,
                outbound: Mutex::new(None),
            }),
            driver: Mutex::new(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.shared.config.url
    }

    pub fn status(&self) -> ConnectionStatus {
        self.shared.status.borrow().clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Receiver notified on every status change
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status.subscribe()
    }

    /// Open the connection
    ///
    /// No-op while the connection is open or being opened. While a reconnect
    /// is pending, the remaining delay is skipped; the attempt counter is
    /// kept. Must be called from within a tokio runtime.
    pub fn connect(&self) {
        let mut driver = self.driver.lock();

        if let Some(running) = driver.as_ref().filter(|d| !d.task.is_finished()) {
            let status = self.status();
            match status.state {
                ConnectionState::Disconnected if status.reconnect_pending => {
                    if running.commands.send(Command::ConnectNow).is_ok() {
                        debug!("Reconnect pending, connecting now");
                        return;
                    }
                }
                // the driver has finished its work and is about to exit
                ConnectionState::Disconnected => {}
                state => {
                    debug!(?state, "connect() ignored");
                    return;
                }
            }
        }

        if let Some(stale) = driver.take() {
            stale.task.abort();
        }

        self.shared.update(|s| {
            *s = ConnectionStatus {
                state: ConnectionState::Connecting,
                ..ConnectionStatus::default()
            }
        });

        let (commands, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(drive(Arc::clone(&self.shared), receiver));
        *driver = Some(Driver { commands, task });
    }

    /// Close the connection with the normal closure code and cancel any
    /// pending reconnect
    ///
    /// Returns once the driver has stopped.
    pub async fn disconnect(&self) {
        let driver = self.driver.lock().take();
        let Some(driver) = driver else {
            return;
        };

        let _ = driver.commands.send(Command::Disconnect);
        if let Err(e) = driver.task.await {
            warn!("WebSocket driver ended abnormally: {}", e);
            self.shared.update(|s| {
                s.state = ConnectionState::Disconnected;
                s.reconnect_pending = false;
            });
        }
    }

    /// Send a frame on the open connection
    ///
    /// Frames are not buffered: when the connection is not open the frame is
    /// dropped and [`Error::NotConnected`] is returned.
    pub fn send(&self, frame: &ClientFrame) -> Result<()> {
        let sender = match self.shared.state() {
            ConnectionState::Open => self.shared.outbound.lock().clone(),
            _ => None,
        };
        let Some(sender) = sender else {
            warn!("Cannot send message - WebSocket not connected");
            return Err(Error::NotConnected);
        };

        sender
            .send(Outbound::Text(frame.to_json()?))
            .map_err(|_| Error::NotConnected)
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.get_mut().take() {
            driver.task.abort();
        }
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("url", &self.shared.config.url)
            .field("status", &*self.shared.status.borrow())
            .finish()
    }
}

/// `client_<9 base36 chars>_<epoch ms>`, fresh for every connection attempt
pub(crate) fn generate_client_id() -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!(
        "client_{}_{}",
        suffix,
        chrono::Utc::now().timestamp_millis()
    )
}

async fn drive(shared: Arc<Shared>, mut commands: mpsc::UnboundedReceiver<Command>) {
    let mut backoff = ExponentialBackoff::new(shared.config.reconnect.clone());

    loop {
        shared.update(|s| {
            s.state = ConnectionState::Connecting;
            s.reconnect_pending = false;
        });
        let client_id = generate_client_id();
        debug!(url = %shared.config.url, %client_id, "Connecting");

        let attempt = {
            let connecting = shared.connector.connect(&shared.config.url);
            tokio::pin!(connecting);
            loop {
                tokio::select! {
                    result = &mut connecting => break Some(result),
                    command = commands.recv() => match command {
                        Some(Command::ConnectNow) => continue,
                        Some(Command::Disconnect) | None => break None,
                    },
                }
            }
        };

        let outcome = match attempt {
            None => CloseOutcome::ClientInitiated,
            Some(Ok(socket)) => {
                backoff.reset();
                run_open(&shared, socket, &mut commands, client_id).await
            }
            Some(Err(e)) => {
                warn!("WebSocket connection failed: {}", e);
                CloseOutcome::Unclean(e.to_string())
            }
        };

        let reason = match outcome {
            CloseOutcome::ClientInitiated => {
                info!("WebSocket disconnected by client");
                shared.update(|s| {
                    s.state = ConnectionState::Disconnected;
                    s.reconnect_pending = false;
                });
                return;
            }
            CloseOutcome::Clean => {
                info!("WebSocket closed normally by server");
                shared.update(|s| {
                    s.state = ConnectionState::Disconnected;
                    s.reconnect_pending = false;
                });
                return;
            }
            CloseOutcome::Unclean(reason) => reason,
        };

        let Some(delay) = backoff.next_delay() else {
            let failure = Error::ReconnectFailed {
                attempts: backoff.attempt(),
                last_error: reason,
            };
            error!("{}", failure);
            shared.update(|s| {
                s.state = ConnectionState::Disconnected;
                s.reconnect_pending = false;
                s.error = Some(failure.to_string());
                s.gave_up = true;
            });
            return;
        };

        info!(
            "Reconnecting... Attempt {}/{} in {:?}",
            backoff.attempt(),
            backoff.max_attempts(),
            delay
        );
        shared.update(|s| {
            s.state = ConnectionState::Disconnected;
            s.reconnect_attempts = backoff.attempt();
            s.reconnect_pending = true;
            s.error = Some(reason);
        });

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        let cancelled = loop {
            tokio::select! {
                _ = &mut sleep => break false,
                command = commands.recv() => match command {
                    Some(Command::ConnectNow) => break false,
                    Some(Command::Disconnect) | None => break true,
                },
            }
        };
        if cancelled {
            debug!("Pending reconnect cancelled");
            shared.update(|s| {
                s.state = ConnectionState::Disconnected;
                s.reconnect_pending = false;
            });
            return;
        }
    }
}

async fn run_open(
    shared: &Shared,
    socket: Socket,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    client_id: String,
) -> CloseOutcome {
    let Socket {
        outbound,
        mut inbound,
    } = socket;

    *shared.outbound.lock() = Some(outbound.clone());
    shared.update(|s| {
        s.state = ConnectionState::Open;
        s.reconnect_attempts = 0;
        s.reconnect_pending = false;
        s.error = None;
        s.gave_up = false;
    });
    info!(url = %shared.config.url, "WebSocket connected");

    match ClientFrame::handshake(client_id).to_json() {
        Ok(handshake) => {
            let _ = outbound.send(Outbound::Text(handshake));
        }
        Err(e) => warn!("Failed to encode handshake: {}", e),
    }

    let mut keep_alive = KeepAlive::start(shared.config.keep_alive_interval);

    let outcome = loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::ConnectNow) => continue,
                Some(Command::Disconnect) | None => {
                    shared.update(|s| s.state = ConnectionState::Closing);
                    let _ = outbound.send(Outbound::Close {
                        code: NORMAL_CLOSURE,
                        reason: "Client disconnect".to_string(),
                    });
                    break CloseOutcome::ClientInitiated;
                }
            },
            ping = keep_alive.tick() => match ping.to_json() {
                Ok(text) => {
                    debug!("Sending keep-alive ping");
                    let _ = outbound.send(Outbound::Text(text));
                }
                Err(e) => warn!("Failed to encode ping: {}", e),
            },
            event = inbound.next() => match event {
                Some(Ok(SocketEvent::Text(text))) => {
                    let _ = shared.dispatcher.on_frame(&text);
                }
                Some(Ok(SocketEvent::Closed { code, reason })) => {
                    info!("WebSocket disconnected: {} {}", code, reason);
                    if code == NORMAL_CLOSURE {
                        break CloseOutcome::Clean;
                    }
                    break CloseOutcome::Unclean(format!("closed with code {}: {}", code, reason));
                }
                Some(Err(e)) => {
                    warn!("WebSocket error: {}", e);
                    break CloseOutcome::Unclean(e.to_string());
                }
                None => break CloseOutcome::Unclean("connection lost".to_string()),
            },
        }
    };

    *shared.outbound.lock() = None;
    outcome
}
