use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of an event
pub type EventId = i64;

/// Identifier of a member
pub type UserId = i64;

/// RSVP status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RsvpStatus {
    Attending,
    NotAttending,
    Maybe,
    Waitlist,
    Pending,
}

impl RsvpStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RsvpStatus::Attending => "ATTENDING",
            RsvpStatus::NotAttending => "NOT_ATTENDING",
            RsvpStatus::Maybe => "MAYBE",
            RsvpStatus::Waitlist => "WAITLIST",
            RsvpStatus::Pending => "PENDING",
        }
    }
}

/// A member's RSVP to an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rsvp {
    /// Server-assigned id; `None` while an optimistic create is in flight
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub event_id: Option<EventId>,
    pub user_id: UserId,
    pub status: RsvpStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Rsvp {
    /// Local placeholder used before the server has assigned an id
    pub fn provisional(event_id: EventId, user_id: UserId, status: RsvpStatus) -> Self {
        Self {
            id: None,
            event_id: Some(event_id),
            user_id,
            status,
            created_at: Some(Utc::now()),
        }
    }

    pub fn with_status(&self, status: RsvpStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }
}

/// Body of `POST /events/{eventId}/rsvps`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRsvpRequest {
    pub user_id: UserId,
    pub status: RsvpStatus,
}

/// Body of `PUT /events/{eventId}/rsvps/{userId}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateRsvpRequest {
    pub status: RsvpStatus,
}

/// One item of a bulk status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RsvpUpdate {
    pub user_id: UserId,
    pub status: RsvpStatus,
}

impl RsvpUpdate {
    pub fn new(user_id: UserId, status: RsvpStatus) -> Self {
        Self { user_id, status }
    }
}

/// RSVP tallies by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RsvpCounts {
    pub attending: usize,
    pub not_attending: usize,
    pub maybe: usize,
    pub waitlist: usize,
    pub pending: usize,
}

impl RsvpCounts {
    pub fn tally<'a>(rsvps: impl IntoIterator<Item = &'a Rsvp>) -> Self {
        let mut counts = Self::default();
        for rsvp in rsvps {
            match rsvp.status {
                RsvpStatus::Attending => counts.attending += 1,
                RsvpStatus::NotAttending => counts.not_attending += 1,
                RsvpStatus::Maybe => counts.maybe += 1,
                RsvpStatus::Waitlist => counts.waitlist += 1,
                RsvpStatus::Pending => counts.pending += 1,
            }
        }
        counts
    }

    pub fn get(&self, status: RsvpStatus) -> usize {
        match status {
            RsvpStatus::Attending => self.attending,
            RsvpStatus::NotAttending => self.not_attending,
            RsvpStatus::Maybe => self.maybe,
            RsvpStatus::Waitlist => self.waitlist,
            RsvpStatus::Pending => self.pending,
        }
    }
}

/// Capacity summary of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityInfo {
    pub is_full: bool,
    /// Attending share of capacity, capped at 100
    pub percentage: u8,
    /// Seats left; `None` when the event has no capacity limit
    pub remaining: Option<u32>,
    pub waitlist_count: usize,
}
