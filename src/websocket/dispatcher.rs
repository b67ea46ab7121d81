use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::Result;
use crate::store::LiveStore;
use crate::types::{Activity, EventUpdate, MessageKind, Notification, ServerMessage};

/// Callback invoked for every dispatched message of a subscribed kind
pub type Handler = Arc<dyn Fn(&ServerMessage) + Send + Sync>;

/// Capacity of the `EVENT_UPDATE` broadcast channel
const EVENT_UPDATE_CAPACITY: usize = 64;

/// Handle returned by [`Dispatcher::subscribe`], used to unsubscribe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    kind: MessageKind,
    id: u64,
}

impl Subscription {
    pub fn kind(&self) -> &MessageKind {
        &self.kind
    }
}

/// Routes inbound frames to the live store and to subscribers
///
/// Built-in handling runs first (store updates, `EVENT_UPDATE` re-emission),
/// then every subscriber registered for the message's exact kind, in
/// subscription order. The subscriber list is copied before handlers run, so
/// a handler may subscribe or unsubscribe; the change applies from the next
/// dispatch on.
pub struct Dispatcher {
    store: LiveStore,
    registry: RwLock<HashMap<MessageKind, Vec<(u64, Handler)>>>,
    next_id: AtomicU64,
    event_updates: broadcast::Sender<EventUpdate>,
}

impl Dispatcher {
    pub fn new(store: LiveStore) -> Self {
        let (event_updates, _) = broadcast::channel(EVENT_UPDATE_CAPACITY);
        Self {
            store,
            registry: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            event_updates,
        }
    }

    pub fn store(&self) -> &LiveStore {
        &self.store
    }

    /// Register `handler` for messages of `kind`
    ///
    /// `kind` may be a [`MessageKind`] or a wire name such as `"EVENT_UPDATE"`;
    /// unknown names subscribe to that literal application-defined type.
    pub fn subscribe<F>(&self, kind: impl Into<MessageKind>, handler: F) -> Subscription
    where
        F: Fn(&ServerMessage) + Send + Sync + 'static,
    {
        let kind = kind.into();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry
            .write()
            .entry(kind.clone())
            .or_default()
            .push((id, Arc::new(handler)));
        debug!(%kind, id, "Subscribed");
        Subscription { kind, id }
    }

    /// Remove a subscription; returns `false` if it was already removed
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        let mut registry = self.registry.write();
        let Some(handlers) = registry.get_mut(&subscription.kind) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(id, _)| *id != subscription.id);
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            registry.remove(&subscription.kind);
        }
        removed
    }

    pub fn subscriber_count(&self, kind: &MessageKind) -> usize {
        self.registry.read().get(kind).map_or(0, Vec::len)
    }

    /// Receiver for `EVENT_UPDATE` payloads
    pub fn event_updates(&self) -> broadcast::Receiver<EventUpdate> {
        self.event_updates.subscribe()
    }

    /// Parse and dispatch one text frame
    ///
    /// Malformed frames are logged and dropped; the error is returned for
    /// callers that want to count them.
    pub fn on_frame(&self, raw: &str) -> Result<MessageKind> {
        match ServerMessage::parse(raw) {
            Ok(message) => {
                let kind = message.kind();
                self.dispatch(message);
                Ok(kind)
            }
            Err(e) => {
                warn!(
                    "Dropping malformed WebSocket frame ({}): {}",
                    e,
                    raw.chars().take(200).collect::<String>()
                );
                Err(e)
            }
        }
    }

    /// Dispatch an already parsed message
    pub fn dispatch(&self, message: ServerMessage) {
        let kind = message.kind();
        debug!(%kind, "Dispatching message");

        self.apply_builtin(&message);

        let handlers: Vec<Handler> = self
            .registry
            .read()
            .get(&kind)
            .map(|handlers| handlers.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        for handler in handlers {
            handler(&message);
        }
    }

    fn apply_builtin(&self, message: &ServerMessage) {
        match message {
            ServerMessage::LiveDataUpdate(update) => self.store.merge(update),
            ServerMessage::NewNotification(payload) => self
                .store
                .push_notification(Notification::received(payload.clone(), Utc::now())),
            ServerMessage::MemberActivity(payload) => self
                .store
                .push_activity(Activity::received(payload.clone(), Utc::now())),
            ServerMessage::SystemStatus(status) => self.store.set_health(status),
            ServerMessage::EventUpdate(update) => {
                // No receivers is fine: nobody is listening for domain events yet
                let _ = self.event_updates.send(update.clone());
            }
            ServerMessage::Custom { kind, .. } => {
                debug!(kind = kind.as_str(), "No built-in handler");
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("kinds", &self.registry.read().len())
            .finish_non_exhaustive()
    }
}
