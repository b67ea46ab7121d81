//! Live WebSocket connection.
//!
//! - [`Transport`]: owns the socket, reconnects with exponential backoff after
//!   unclean closes and sends keep-alive pings while open
//! - [`Dispatcher`]: parses inbound frames, updates the
//!   [`LiveStore`](crate::store::LiveStore) and notifies subscribers
//! - [`Connector`]: opens sockets; [`TungsteniteConnector`] is the production
//!   implementation
//!
//! # Connection Management
//!
//! A close with code 1000 (from either side) ends the session. Any other close,
//! a transport error or a failed attempt schedules a reconnect after 1, 2, 4,
//! 8 and 16 seconds by default; after the fifth failed reconnect the transport
//! stays disconnected and reports the failure in its [`ConnectionStatus`].

mod backoff;
mod connector;
mod dispatcher;
mod keepalive;
mod transport;

#[cfg(test)]
pub(crate) use connector::testing;

pub use backoff::ReconnectConfig;
pub use connector::{
    Connector, Outbound, Socket, SocketEvent, TungsteniteConnector, ABNORMAL_CLOSURE,
    NORMAL_CLOSURE, NO_STATUS_RECEIVED,
};
pub use dispatcher::{Dispatcher, Handler, Subscription};
pub use keepalive::DEFAULT_KEEP_ALIVE_INTERVAL;
pub use transport::{ConnectionState, ConnectionStatus, Transport, TransportConfig};

// Re-export commonly used types for convenience
pub use crate::types::{ClientFrame, MessageKind, RawFrame, ServerMessage};
