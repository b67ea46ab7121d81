//! # chapter-live
//!
//! Client-side real-time sync for the chapter organizer backend.
//!
//! This library provides:
//! - A reconnecting WebSocket transport with handshake, keep-alive and
//!   exponential backoff
//! - Typed dispatch of server frames to subscribers
//! - A live state store holding counters, notifications and member activity
//! - Optimistic local mutations reconciled against the REST API
//! - RSVP and monitoring REST bindings
//! - Periodic system monitoring with metric history, trends and alerts
//!
//! ## Features
//!
//! - **Explicit session context**: [`LiveSession`] owns every piece; nothing
//!   is global
//! - **Single writer**: only the dispatcher mutates the live snapshot
//! - **Ordered reconciliation**: changes to the same item reach the server in
//!   the order they were made
//! - **Proper Error Handling**: No panics, one [`Error`] type
//!

// Public modules
pub mod client;
pub mod config;
pub mod error;
pub mod inbox;
pub mod monitor;
pub mod reconcile;
pub mod rsvp;
pub mod session;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod websocket;

// Internal modules
mod http;

// Re-export commonly used types
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use types::{
    Activity, ActivityKind, EventUpdate, HealthState, LiveMetrics, LiveSnapshot, Notification,
    Rsvp, RsvpCounts, RsvpStatus,
};

// Re-export clients
pub use client::{MonitoringApi, RsvpApi};

// Re-export live state
pub use inbox::NotificationInbox;
pub use monitor::{Monitor, MonitorState, SystemAlerts};
pub use session::LiveSession;
pub use store::LiveStore;

// Re-export reconciliation
pub use reconcile::{BatchOutcome, OptimisticTarget, Reconciler};
pub use rsvp::{RsvpBook, RsvpSelection};

// Re-export websocket transport
pub use websocket::{ConnectionState, ConnectionStatus, Dispatcher, Transport};
