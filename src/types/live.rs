use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Partial update of the scalar live counters (`LIVE_DATA_UPDATE`)
///
/// Absent keys leave the corresponding snapshot field untouched. List-valued
/// keys sent by the server are ignored; lists only grow through their own
/// message types.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveDataUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_users: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ongoing_events: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_health: Option<u32>,
}

/// Payload of a `NEW_NOTIFICATION` frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A notification as held in the live snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: u64,
    pub title: Option<String>,
    pub message: Option<String>,
    pub kind: Option<String>,
    pub extra: Map<String, Value>,
    pub received_at: DateTime<Utc>,
}

impl Notification {
    /// Stamp a payload with its arrival time
    ///
    /// Numeric ids from the server are kept; anything else is replaced by the
    /// arrival time in epoch milliseconds.
    pub fn received(payload: NotificationPayload, received_at: DateTime<Utc>) -> Self {
        let id = payload
            .id
            .as_ref()
            .and_then(Value::as_u64)
            .unwrap_or_else(|| received_at.timestamp_millis().max(0) as u64);

        Self {
            id,
            title: payload.title,
            message: payload.message,
            kind: payload.kind,
            extra: payload.extra,
            received_at,
        }
    }
}

/// Payload of a `MEMBER_ACTIVITY` frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityPayload {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Well-known member activity types
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityKind {
    MemberJoined,
    MemberUpdated,
    EventCreated,
    EventUpdated,
    ChapterCreated,
    Login,
    Logout,
    Other(String),
}

impl ActivityKind {
    pub fn as_str(&self) -> &str {
        match self {
            ActivityKind::MemberJoined => "member_joined",
            ActivityKind::MemberUpdated => "member_updated",
            ActivityKind::EventCreated => "event_created",
            ActivityKind::EventUpdated => "event_updated",
            ActivityKind::ChapterCreated => "chapter_created",
            ActivityKind::Login => "login",
            ActivityKind::Logout => "logout",
            ActivityKind::Other(kind) => kind,
        }
    }
}

impl From<String> for ActivityKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "member_joined" => ActivityKind::MemberJoined,
            "member_updated" => ActivityKind::MemberUpdated,
            "event_created" => ActivityKind::EventCreated,
            "event_updated" => ActivityKind::EventUpdated,
            "chapter_created" => ActivityKind::ChapterCreated,
            "login" => ActivityKind::Login,
            "logout" => ActivityKind::Logout,
            _ => ActivityKind::Other(kind),
        }
    }
}

impl From<ActivityKind> for String {
    fn from(kind: ActivityKind) -> Self {
        kind.as_str().to_string()
    }
}

/// A member activity as held in the live snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub kind: ActivityKind,
    pub message: Option<String>,
    pub extra: Map<String, Value>,
    pub received_at: DateTime<Utc>,
}

impl Activity {
    pub fn received(payload: ActivityPayload, received_at: DateTime<Utc>) -> Self {
        Self {
            kind: ActivityKind::from(payload.kind.unwrap_or_default()),
            message: payload.message,
            extra: payload.extra,
            received_at,
        }
    }
}

/// Payload of a `SYSTEM_STATUS` frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    /// Health score; a status without one reports full health
    #[serde(default)]
    pub health: Option<u32>,
}

/// Payload of an `EVENT_UPDATE` frame, re-emitted to domain consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventUpdate {
    #[serde(default)]
    pub event_id: Option<i64>,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

/// Session-wide live state fed by the WebSocket connection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveSnapshot {
    pub active_users: u64,
    pub ongoing_events: u64,
    /// Newest first, bounded by [`LiveSnapshot::MAX_NOTIFICATIONS`]
    pub notifications: Vec<Notification>,
    /// Newest first, bounded by [`LiveSnapshot::MAX_ACTIVITIES`]
    pub activities: Vec<Activity>,
    /// 0..=100
    pub system_health: u8,
}

impl LiveSnapshot {
    pub const MAX_NOTIFICATIONS: usize = 50;
    pub const MAX_ACTIVITIES: usize = 20;
    pub const FULL_HEALTH: u8 = 100;
    pub const HEALTHY_THRESHOLD: u8 = 80;

    pub fn metrics(&self) -> LiveMetrics {
        LiveMetrics {
            active_users: self.active_users,
            ongoing_events: self.ongoing_events,
            system_health: self.system_health,
        }
    }
}

impl Default for LiveSnapshot {
    fn default() -> Self {
        Self {
            active_users: 0,
            ongoing_events: 0,
            notifications: Vec::new(),
            activities: Vec::new(),
            system_health: Self::FULL_HEALTH,
        }
    }
}

/// Scalar counters of a [`LiveSnapshot`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveMetrics {
    pub active_users: u64,
    pub ongoing_events: u64,
    pub system_health: u8,
}

impl LiveMetrics {
    pub fn is_healthy(&self) -> bool {
        self.system_health >= LiveSnapshot::HEALTHY_THRESHOLD
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_notification_keeps_numeric_id() {
        let payload: NotificationPayload =
            serde_json::from_value(json!({"id": 1, "title": "Hi", "icon": "user-plus"})).unwrap();
        let at = Utc::now();
        let n = Notification::received(payload, at);
        assert_eq!(n.id, 1);
        assert_eq!(n.title.as_deref(), Some("Hi"));
        assert_eq!(n.extra.get("icon"), Some(&json!("user-plus")));
    }

    #[test]
    fn test_notification_without_id_uses_arrival_time() {
        let payload: NotificationPayload =
            serde_json::from_value(json!({"id": "abc", "message": "New event"})).unwrap();
        let at = Utc::now();
        let n = Notification::received(payload, at);
        assert_eq!(n.id, at.timestamp_millis() as u64);
    }

    #[test]
    fn test_activity_kind_parsing() {
        assert_eq!(ActivityKind::from("login".to_string()), ActivityKind::Login);
        assert_eq!(
            ActivityKind::from("rsvp_changed".to_string()),
            ActivityKind::Other("rsvp_changed".into())
        );

        let payload: ActivityPayload =
            serde_json::from_value(json!({"type": "member_joined", "memberName": "Ana"})).unwrap();
        let activity = Activity::received(payload, Utc::now());
        assert_eq!(activity.kind, ActivityKind::MemberJoined);
        assert_eq!(activity.extra.get("memberName"), Some(&json!("Ana")));
    }

    #[test]
    fn test_live_data_update_ignores_lists() {
        let update: LiveDataUpdate = serde_json::from_value(json!({
            "activeUsers": 12,
            "newNotifications": [{"title": "x"}],
        }))
        .unwrap();
        assert_eq!(update.active_users, Some(12));
        assert_eq!(update.ongoing_events, None);
    }

    #[test]
    fn test_metrics_health_threshold() {
        let mut snapshot = LiveSnapshot::default();
        assert!(snapshot.metrics().is_healthy());
        snapshot.system_health = 79;
        assert!(!snapshot.metrics().is_healthy());
    }
}
