//! Read tracking for live notifications.

use std::collections::HashSet;

use parking_lot::RwLock;

use crate::store::LiveStore;
use crate::types::Notification;

/// Which notifications of a [`LiveStore`] the user has seen
///
/// Read state lives here rather than in the snapshot, so the dispatcher
/// stays the snapshot's only writer. Ids that have dropped off the bounded
/// notification list are forgotten on the next [`mark_all_as_read`].
///
/// [`mark_all_as_read`]: NotificationInbox::mark_all_as_read
#[derive(Debug)]
pub struct NotificationInbox {
    store: LiveStore,
    read: RwLock<HashSet<u64>>,
}

impl NotificationInbox {
    pub fn new(store: LiveStore) -> Self {
        Self {
            store,
            read: RwLock::new(HashSet::new()),
        }
    }

    pub fn mark_as_read(&self, id: u64) {
        self.read.write().insert(id);
    }

    pub fn mark_all_as_read(&self) {
        let ids: HashSet<u64> = self
            .store
            .read(|s| s.notifications.iter().map(|n| n.id).collect());
        *self.read.write() = ids;
    }

    pub fn is_read(&self, id: u64) -> bool {
        self.read.read().contains(&id)
    }

    pub fn unread_count(&self) -> usize {
        let read = self.read.read();
        self.store
            .read(|s| s.notifications.iter().filter(|n| !read.contains(&n.id)).count())
    }

    /// Unread notifications, newest first
    pub fn unread(&self) -> Vec<Notification> {
        let read = self.read.read();
        self.store.read(|s| {
            s.notifications
                .iter()
                .filter(|n| !read.contains(&n.id))
                .cloned()
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NotificationPayload;
    use chrono::Utc;
    use serde_json::json;

    fn push(store: &LiveStore, id: u64) {
        let payload: NotificationPayload =
            serde_json::from_value(json!({"id": id, "title": format!("n{}", id)})).unwrap();
        store.push_notification(Notification::received(payload, Utc::now()));
    }

    #[test]
    fn test_read_tracking() {
        let store = LiveStore::new();
        let inbox = NotificationInbox::new(store.clone());
        push(&store, 1);
        push(&store, 2);
        assert_eq!(inbox.unread_count(), 2);

        inbox.mark_as_read(1);
        assert!(inbox.is_read(1));
        assert_eq!(inbox.unread_count(), 1);
        assert_eq!(inbox.unread()[0].id, 2);

        inbox.mark_all_as_read();
        assert_eq!(inbox.unread_count(), 0);

        push(&store, 3);
        assert_eq!(inbox.unread_count(), 1);
    }

    #[test]
    fn test_marking_unknown_id_is_harmless() {
        let store = LiveStore::new();
        let inbox = NotificationInbox::new(store.clone());
        inbox.mark_as_read(42);
        push(&store, 7);
        assert_eq!(inbox.unread_count(), 1);
    }
}
