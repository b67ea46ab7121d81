use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::types::{ActivityPayload, EventUpdate, LiveDataUpdate, NotificationPayload, SystemStatus};

/// Wire names of the frame types this client understands
pub mod wire {
    pub const HANDSHAKE: &str = "HANDSHAKE";
    pub const PING: &str = "PING";
    pub const LIVE_DATA_UPDATE: &str = "LIVE_DATA_UPDATE";
    pub const NEW_NOTIFICATION: &str = "NEW_NOTIFICATION";
    pub const MEMBER_ACTIVITY: &str = "MEMBER_ACTIVITY";
    pub const SYSTEM_STATUS: &str = "SYSTEM_STATUS";
    pub const EVENT_UPDATE: &str = "EVENT_UPDATE";
}

/// An untyped frame as it appears on the wire: `{"type": ..., "payload": ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFrame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

/// Kind of a server-to-client message, used to key subscriptions
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageKind {
    LiveDataUpdate,
    NewNotification,
    MemberActivity,
    SystemStatus,
    EventUpdate,
    /// Application-defined type with no built-in handler
    Custom(String),
}

impl MessageKind {
    pub fn as_str(&self) -> &str {
        match self {
            MessageKind::LiveDataUpdate => wire::LIVE_DATA_UPDATE,
            MessageKind::NewNotification => wire::NEW_NOTIFICATION,
            MessageKind::MemberActivity => wire::MEMBER_ACTIVITY,
            MessageKind::SystemStatus => wire::SYSTEM_STATUS,
            MessageKind::EventUpdate => wire::EVENT_UPDATE,
            MessageKind::Custom(kind) => kind,
        }
    }
}

impl From<&str> for MessageKind {
    fn from(kind: &str) -> Self {
        match kind {
            wire::LIVE_DATA_UPDATE => MessageKind::LiveDataUpdate,
            wire::NEW_NOTIFICATION => MessageKind::NewNotification,
            wire::MEMBER_ACTIVITY => MessageKind::MemberActivity,
            wire::SYSTEM_STATUS => MessageKind::SystemStatus,
            wire::EVENT_UPDATE => MessageKind::EventUpdate,
            other => MessageKind::Custom(other.to_string()),
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed server-to-client message
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    LiveDataUpdate(LiveDataUpdate),
    NewNotification(NotificationPayload),
    MemberActivity(ActivityPayload),
    SystemStatus(SystemStatus),
    EventUpdate(EventUpdate),
    Custom { kind: String, payload: Value },
}

impl ServerMessage {
    /// Parse a text frame into a typed message
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the text is not a `{type, payload}` object and
    /// [`Error::Frame`] if a known type carries a payload of the wrong shape.
    pub fn parse(text: &str) -> Result<Self> {
        let frame: RawFrame = serde_json::from_str(text)?;
        Self::from_raw(frame)
    }

    pub fn from_raw(frame: RawFrame) -> Result<Self> {
        let RawFrame { kind, payload } = frame;
        let typed = |e: serde_json::Error| Error::Frame(format!("{} payload: {}", kind, e));

        let message = match MessageKind::from(kind.as_str()) {
            MessageKind::LiveDataUpdate => {
                ServerMessage::LiveDataUpdate(serde_json::from_value(payload).map_err(typed)?)
            }
            MessageKind::NewNotification => {
                ServerMessage::NewNotification(serde_json::from_value(payload).map_err(typed)?)
            }
            MessageKind::MemberActivity => {
                ServerMessage::MemberActivity(serde_json::from_value(payload).map_err(typed)?)
            }
            MessageKind::SystemStatus => {
                ServerMessage::SystemStatus(serde_json::from_value(payload).map_err(typed)?)
            }
            MessageKind::EventUpdate => {
                ServerMessage::EventUpdate(serde_json::from_value(payload).map_err(typed)?)
            }
            MessageKind::Custom(kind) => ServerMessage::Custom { kind, payload },
        };
        Ok(message)
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            ServerMessage::LiveDataUpdate(_) => MessageKind::LiveDataUpdate,
            ServerMessage::NewNotification(_) => MessageKind::NewNotification,
            ServerMessage::MemberActivity(_) => MessageKind::MemberActivity,
            ServerMessage::SystemStatus(_) => MessageKind::SystemStatus,
            ServerMessage::EventUpdate(_) => MessageKind::EventUpdate,
            ServerMessage::Custom { kind, .. } => MessageKind::Custom(kind.clone()),
        }
    }
}

/// Frames sent from the client to the server
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientFrame {
    Handshake(HandshakePayload),
    Ping(PingPayload),
}

impl ClientFrame {
    pub fn handshake(client_id: impl Into<String>) -> Self {
        ClientFrame::Handshake(HandshakePayload {
            client_id: client_id.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        })
    }

    pub fn ping() -> Self {
        ClientFrame::Ping(PingPayload {
            timestamp: chrono::Utc::now().timestamp_millis(),
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakePayload {
    pub client_id: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingPayload {
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_known_kinds() {
        let msg = ServerMessage::parse(r#"{"type":"NEW_NOTIFICATION","payload":{"id":1,"title":"Hi"}}"#)
            .unwrap();
        match msg {
            ServerMessage::NewNotification(n) => assert_eq!(n.title.as_deref(), Some("Hi")),
            other => panic!("unexpected message {:?}", other),
        }

        let msg = ServerMessage::parse(r#"{"type":"SYSTEM_STATUS","payload":{"health":72}}"#).unwrap();
        assert_eq!(msg.kind(), MessageKind::SystemStatus);
    }

    #[test]
    fn test_parse_unknown_kind_keeps_payload() {
        let msg = ServerMessage::parse(r#"{"type":"CHAPTER_RENAMED","payload":{"id":7}}"#).unwrap();
        assert_eq!(
            msg,
            ServerMessage::Custom {
                kind: "CHAPTER_RENAMED".to_string(),
                payload: json!({"id": 7}),
            }
        );
        assert_eq!(msg.kind(), MessageKind::Custom("CHAPTER_RENAMED".into()));
    }

    #[test]
    fn test_missing_payload_defaults_to_null() {
        let msg = ServerMessage::parse(r#"{"type":"RESYNC"}"#).unwrap();
        assert_eq!(
            msg,
            ServerMessage::Custom {
                kind: "RESYNC".to_string(),
                payload: Value::Null,
            }
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(ServerMessage::parse("not json"), Err(Error::Json(_))));
        assert!(matches!(ServerMessage::parse(r#"{"payload":{}}"#), Err(Error::Json(_))));
        assert!(matches!(
            ServerMessage::parse(r#"{"type":"SYSTEM_STATUS","payload":"down"}"#),
            Err(Error::Frame(_))
        ));
    }

    #[test]
    fn test_client_frame_wire_shape() {
        let frame = ClientFrame::Handshake(HandshakePayload {
            client_id: "client_abc".to_string(),
            timestamp: 1700000000000,
        });
        let value: Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"type": "HANDSHAKE", "payload": {"clientId": "client_abc", "timestamp": 1700000000000i64}})
        );

        let value: Value = serde_json::from_str(&ClientFrame::ping().to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "PING");
        assert!(value["payload"]["timestamp"].is_i64());
    }

    #[test]
    fn test_message_kind_round_trips_wire_name() {
        assert_eq!(MessageKind::from("MEMBER_ACTIVITY"), MessageKind::MemberActivity);
        assert_eq!(MessageKind::EventUpdate.as_str(), "EVENT_UPDATE");
        assert_eq!(MessageKind::from("x").to_string(), "x");
    }
}
