//! Live state store.
//!
//! [`LiveStore`] holds the session-wide [`LiveSnapshot`]. Readers get clones or
//! closure access; every write goes through the crate-private mutators, which
//! only the [`Dispatcher`](crate::websocket::Dispatcher) calls. Each write bumps
//! a revision counter observers can wait on.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;

use crate::types::{Activity, LiveDataUpdate, LiveMetrics, LiveSnapshot, Notification, SystemStatus};

/// Shared handle to the live snapshot
#[derive(Clone)]
pub struct LiveStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    snapshot: RwLock<LiveSnapshot>,
    revision: watch::Sender<u64>,
}

impl LiveStore {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(StoreInner {
                snapshot: RwLock::new(LiveSnapshot::default()),
                revision,
            }),
        }
    }

    /// Copy of the current snapshot
    pub fn snapshot(&self) -> LiveSnapshot {
        self.inner.snapshot.read().clone()
    }

    /// Read the snapshot in place without cloning it
    pub fn read<R>(&self, f: impl FnOnce(&LiveSnapshot) -> R) -> R {
        f(&self.inner.snapshot.read())
    }

    pub fn metrics(&self) -> LiveMetrics {
        self.read(LiveSnapshot::metrics)
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.read(|s| s.notifications.clone())
    }

    pub fn activities(&self) -> Vec<Activity> {
        self.read(|s| s.activities.clone())
    }

    /// Number of writes applied so far
    pub fn revision(&self) -> u64 {
        *self.inner.revision.borrow()
    }

    /// Receiver that is notified after every write
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    /// Shallow merge of the scalar counters present in `update`
    pub(crate) fn merge(&self, update: &LiveDataUpdate) {
        self.write(|s| {
            if let Some(active_users) = update.active_users {
                s.active_users = active_users;
            }
            if let Some(ongoing_events) = update.ongoing_events {
                s.ongoing_events = ongoing_events;
            }
            if let Some(health) = update.system_health {
                s.system_health = clamp_health(health);
            }
        });
    }

    pub(crate) fn push_notification(&self, notification: Notification) {
        self.write(|s| {
            s.notifications.insert(0, notification);
            s.notifications.truncate(LiveSnapshot::MAX_NOTIFICATIONS);
        });
    }

    pub(crate) fn push_activity(&self, activity: Activity) {
        self.write(|s| {
            s.activities.insert(0, activity);
            s.activities.truncate(LiveSnapshot::MAX_ACTIVITIES);
        });
    }

    /// Replace the health score from a `SYSTEM_STATUS` payload
    ///
    /// Only a missing value means full health. A reported 0 is a real outage
    /// and is kept as 0 rather than being treated like an absent field.
    pub(crate) fn set_health(&self, status: &SystemStatus) {
        let health = status
            .health
            .map(clamp_health)
            .unwrap_or(LiveSnapshot::FULL_HEALTH);
        self.write(|s| s.system_health = health);
    }

    fn write(&self, f: impl FnOnce(&mut LiveSnapshot)) {
        {
            let mut snapshot = self.inner.snapshot.write();
            f(&mut snapshot);
        }
        self.inner.revision.send_modify(|rev| *rev += 1);
    }
}

impl Default for LiveStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LiveStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveStore")
            .field("revision", &self.revision())
            .finish_non_exhaustive()
    }
}

fn clamp_health(health: u32) -> u8 {
    health.min(u32::from(LiveSnapshot::FULL_HEALTH)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActivityPayload, NotificationPayload};
    use chrono::Utc;

    fn notification(id: u64) -> Notification {
        Notification::received(
            NotificationPayload {
                id: Some(id.into()),
                title: Some(format!("n{}", id)),
                ..Default::default()
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_merge_only_overwrites_given_keys() {
        let store = LiveStore::new();
        store.merge(&LiveDataUpdate {
            active_users: Some(5),
            ongoing_events: Some(2),
            system_health: None,
        });
        store.merge(&LiveDataUpdate {
            ongoing_events: Some(3),
            ..Default::default()
        });

        let metrics = store.metrics();
        assert_eq!(metrics.active_users, 5);
        assert_eq!(metrics.ongoing_events, 3);
        assert_eq!(metrics.system_health, 100);
    }

    #[test]
    fn test_merge_leaves_lists_alone() {
        let store = LiveStore::new();
        store.push_notification(notification(1));
        store.merge(&LiveDataUpdate::default());
        assert_eq!(store.notifications().len(), 1);
    }

    #[test]
    fn test_notifications_bounded_newest_first() {
        let store = LiveStore::new();
        for id in 1..=60 {
            store.push_notification(notification(id));
            assert!(store.notifications().len() <= LiveSnapshot::MAX_NOTIFICATIONS);
        }

        let ids: Vec<u64> = store.notifications().iter().map(|n| n.id).collect();
        assert_eq!(ids.len(), 50);
        assert_eq!(ids[0], 60);
        assert_eq!(ids[49], 11);
        assert!(ids.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_activities_bounded() {
        let store = LiveStore::new();
        for i in 0..25 {
            store.push_activity(Activity::received(
                ActivityPayload {
                    kind: Some("login".into()),
                    message: Some(i.to_string()),
                    ..Default::default()
                },
                Utc::now(),
            ));
        }
        let activities = store.activities();
        assert_eq!(activities.len(), LiveSnapshot::MAX_ACTIVITIES);
        assert_eq!(activities[0].message.as_deref(), Some("24"));
    }

    #[test]
    fn test_health_defaults_and_clamps() {
        let store = LiveStore::new();
        store.set_health(&SystemStatus { health: Some(42) });
        assert_eq!(store.metrics().system_health, 42);
        store.set_health(&SystemStatus { health: Some(250) });
        assert_eq!(store.metrics().system_health, 100);
        store.set_health(&SystemStatus { health: Some(0) });
        assert_eq!(store.metrics().system_health, 0);
        store.set_health(&SystemStatus { health: None });
        assert_eq!(store.metrics().system_health, 100);
    }

    #[test]
    fn test_revision_bumps_on_write() {
        let store = LiveStore::new();
        let changes = store.changes();
        assert_eq!(store.revision(), 0);
        store.set_health(&SystemStatus { health: Some(90) });
        assert_eq!(store.revision(), 1);
        assert!(changes.has_changed().unwrap());
    }
}
