use async_trait::async_trait;
use futures_util::{SinkExt, Stream, StreamExt};
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Close code sent by [`Transport::disconnect`](super::Transport::disconnect)
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code reported when the peer vanished without a close frame
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Close code reported for a close frame that carried no status
pub const NO_STATUS_RECEIVED: u16 = 1005;

/// Something that arrived on an open socket
#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    Text(String),
    Closed { code: u16, reason: String },
}

/// Something to write to an open socket
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text(String),
    Close { code: u16, reason: String },
}

/// An open socket, split into a write queue and a read stream
pub struct Socket {
    pub outbound: mpsc::UnboundedSender<Outbound>,
    pub inbound: Pin<Box<dyn Stream<Item = Result<SocketEvent>> + Send>>,
}

/// Opens sockets for the [`Transport`](super::Transport)
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<Socket>;
}

/// Production connector backed by `tokio-tungstenite`
#[derive(Debug, Clone, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<Socket> {
        let (ws_stream, _) = connect_async(url).await?;
        let (mut write, read) = ws_stream.split();

        let (outbound, mut queue) = mpsc::unbounded_channel::<Outbound>();
        tokio::spawn(async move {
            while let Some(item) = queue.recv().await {
                let (message, closing) = match item {
                    Outbound::Text(text) => (Message::Text(text), false),
                    Outbound::Close { code, reason } => (
                        Message::Close(Some(CloseFrame {
                            code: CloseCode::from(code),
                            reason: reason.into(),
                        })),
                        true,
                    ),
                };
                if let Err(e) = write.send(message).await {
                    debug!("WebSocket write failed: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        let inbound = read.filter_map(|msg| async move {
            match msg {
                Ok(Message::Text(text)) => {
                    // Skip empty or whitespace-only messages
                    let trimmed = text.trim();
                    if trimmed.is_empty() {
                        return None;
                    }

                    // Skip PING/PONG messages sent as text (some servers do this)
                    if trimmed.eq_ignore_ascii_case("ping") || trimmed.eq_ignore_ascii_case("pong")
                    {
                        return None;
                    }

                    Some(Ok(SocketEvent::Text(text)))
                }
                Ok(Message::Close(frame)) => Some(Ok(match frame {
                    Some(frame) => SocketEvent::Closed {
                        code: u16::from(frame.code),
                        reason: frame.reason.into_owned(),
                    },
                    None => SocketEvent::Closed {
                        code: NO_STATUS_RECEIVED,
                        reason: String::new(),
                    },
                })),
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    // Ignore ping/pong frames (handled automatically)
                    None
                }
                Ok(Message::Binary(data)) => {
                    warn!("Ignoring unexpected binary message ({} bytes)", data.len());
                    None
                }
                Ok(Message::Frame(_)) => None,
                Err(e) => Some(Err(Error::WebSocket(e.to_string()))),
            }
        });

        Ok(Socket {
            outbound,
            inbound: Box::pin(inbound),
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory connector for driving a transport from tests.

    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    /// Server side of an accepted in-memory socket
    pub(crate) struct ServerEnd {
        pub to_client: mpsc::UnboundedSender<Result<SocketEvent>>,
        pub from_client: mpsc::UnboundedReceiver<Outbound>,
    }

    impl ServerEnd {
        pub(crate) fn send_text(&self, text: &str) {
            let _ = self.to_client.send(Ok(SocketEvent::Text(text.to_string())));
        }

        pub(crate) fn close(&self, code: u16) {
            let _ = self.to_client.send(Ok(SocketEvent::Closed {
                code,
                reason: String::new(),
            }));
        }

        pub(crate) async fn next_text(&mut self) -> serde_json::Value {
            match self.from_client.recv().await {
                Some(Outbound::Text(text)) => serde_json::from_str(&text).unwrap(),
                other => panic!("expected a text frame, got {:?}", other),
            }
        }
    }

    /// Accepts or refuses connections according to a script
    ///
    /// Once the script runs out every further attempt is refused.
    pub(crate) struct ScriptedConnector {
        script: Mutex<VecDeque<bool>>,
        accepted: mpsc::UnboundedSender<ServerEnd>,
        attempts: AtomicUsize,
        attempt_times: Mutex<Vec<Instant>>,
    }

    impl ScriptedConnector {
        pub(crate) fn new(
            script: impl IntoIterator<Item = bool>,
        ) -> (std::sync::Arc<Self>, mpsc::UnboundedReceiver<ServerEnd>) {
            let (accepted, servers) = mpsc::unbounded_channel();
            let connector = Self {
                script: Mutex::new(script.into_iter().collect()),
                accepted,
                attempts: AtomicUsize::new(0),
                attempt_times: Mutex::new(Vec::new()),
            };
            (std::sync::Arc::new(connector), servers)
        }

        pub(crate) fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }

        pub(crate) fn attempt_times(&self) -> Vec<Instant> {
            self.attempt_times.lock().clone()
        }
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        async fn connect(&self, _url: &str) -> Result<Socket> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            self.attempt_times.lock().push(Instant::now());

            let accept = self.script.lock().pop_front().unwrap_or(false);
            if !accept {
                return Err(Error::WebSocket("connection refused".to_string()));
            }

            let (to_client, client_rx) = mpsc::unbounded_channel();
            let (outbound, from_client) = mpsc::unbounded_channel();
            let _ = self.accepted.send(ServerEnd {
                to_client,
                from_client,
            });

            let inbound = futures_util::stream::unfold(client_rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            });
            Ok(Socket {
                outbound,
                inbound: Box::pin(inbound),
            })
        }
    }
}
