//! Session context wiring the live connection, store and REST bindings.
//!
//! Create one [`LiveSession`] when the user's session starts, hand clones of
//! its parts to whatever needs them and call [`LiveSession::shutdown`] on
//! teardown.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::info;

use crate::client::{MonitoringApi, RsvpApi};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::inbox::NotificationInbox;
use crate::monitor::Monitor;
use crate::rsvp::RsvpBook;
use crate::store::LiveStore;
use crate::types::{EventId, EventUpdate, UserId};
use crate::websocket::{
    ConnectionStatus, Connector, Dispatcher, MessageKind, ServerMessage, Subscription, Transport,
    TransportConfig, TungsteniteConnector,
};

/// Everything a signed-in user's session needs for live updates
pub struct LiveSession {
    config: ClientConfig,
    store: LiveStore,
    dispatcher: Arc<Dispatcher>,
    transport: Transport,
    inbox: Arc<NotificationInbox>,
    rsvp_api: RsvpApi,
    monitoring_api: MonitoringApi,
    monitor: Monitor,
}

impl LiveSession {
    /// Build a session over real WebSockets
    ///
    /// Nothing is connected until [`connect`](Self::connect) is called.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_connector(config, Arc::new(TungsteniteConnector))
    }

    pub fn with_connector(config: ClientConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        config.validate()?;

        let store = LiveStore::new();
        let dispatcher = Arc::new(Dispatcher::new(store.clone()));
        let transport = Transport::new(
            TransportConfig {
                url: config.ws_url.clone(),
                reconnect: config.reconnect(),
                keep_alive_interval: config.keep_alive_interval(),
            },
            connector,
            Arc::clone(&dispatcher),
        );
        let timeout = config.request_timeout();
        let monitoring_api = MonitoringApi::with_timeout(config.api_base_url.clone(), timeout);

        Ok(Self {
            inbox: Arc::new(NotificationInbox::new(store.clone())),
            rsvp_api: RsvpApi::with_timeout(config.api_base_url.clone(), timeout),
            monitor: Monitor::new(Arc::new(monitoring_api.clone()), config.monitor()),
            monitoring_api,
            config,
            store,
            dispatcher,
            transport,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &LiveStore {
        &self.store
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn inbox(&self) -> &Arc<NotificationInbox> {
        &self.inbox
    }

    pub fn rsvp_api(&self) -> &RsvpApi {
        &self.rsvp_api
    }

    pub fn monitoring_api(&self) -> &MonitoringApi {
        &self.monitoring_api
    }

    /// Monitoring state; polling starts with [`Monitor::start`]
    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// RSVP state for one event, as seen by `user_id`
    pub fn rsvp_book(&self, event_id: EventId, user_id: Option<UserId>) -> RsvpBook {
        RsvpBook::new(self.rsvp_api.clone(), event_id, user_id)
    }

    /// Open the live connection
    pub fn connect(&self) {
        info!(url = %self.config.ws_url, "Starting live session");
        self.transport.connect();
    }

    pub fn status(&self) -> ConnectionStatus {
        self.transport.status()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.transport.watch_status()
    }

    pub fn subscribe<F>(&self, kind: impl Into<MessageKind>, handler: F) -> Subscription
    where
        F: Fn(&ServerMessage) + Send + Sync + 'static,
    {
        self.dispatcher.subscribe(kind, handler)
    }

    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.dispatcher.unsubscribe(subscription)
    }

    pub fn event_updates(&self) -> broadcast::Receiver<EventUpdate> {
        self.dispatcher.event_updates()
    }

    /// Close the connection, cancel any pending reconnect and stop monitoring
    pub async fn shutdown(&self) {
        self.monitor.stop();
        self.transport.disconnect().await;
        info!("Live session closed");
    }
}

impl std::fmt::Debug for LiveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveSession")
            .field("config", &self.config)
            .field("transport", &self.transport)
            .field("monitor", &self.monitor)
            .finish_non_exhaustive()
    }
}
