use std::time::Duration;

use crate::error::Result;
use crate::http::HttpClient;
use crate::types::{CreateRsvpRequest, EventId, Rsvp, RsvpStatus, UpdateRsvpRequest, UserId};

/// Client for the event RSVP endpoints
///
/// All paths live under `/events/{eventId}/rsvps`.
#[derive(Debug, Clone)]
pub struct RsvpApi {
    http_client: HttpClient,
}

impl RsvpApi {
    /// Create a new RsvpApi
    ///
    /// # Arguments
    /// * `host` - The backend base URL (e.g., "http://localhost:8080")
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            http_client: HttpClient::new(host),
        }
    }

    pub fn with_timeout(host: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http_client: HttpClient::with_timeout(host, timeout),
        }
    }

    /// List every RSVP of an event
    pub async fn list(&self, event_id: EventId) -> Result<Vec<Rsvp>> {
        let path = format!("/events/{}/rsvps", event_id);
        self.http_client.get(&path, None).await
    }

    /// Get one member's RSVP
    pub async fn get(&self, event_id: EventId, user_id: UserId) -> Result<Rsvp> {
        let path = format!("/events/{}/rsvps/{}", event_id, user_id);
        self.http_client.get(&path, None).await
    }

    /// Create an RSVP for a member who has none yet
    pub async fn create(&self, event_id: EventId, user_id: UserId, status: RsvpStatus) -> Result<Rsvp> {
        let path = format!("/events/{}/rsvps", event_id);
        self.http_client
            .post(&path, &CreateRsvpRequest { user_id, status })
            .await
    }

    /// Change an existing RSVP's status
    pub async fn update(&self, event_id: EventId, user_id: UserId, status: RsvpStatus) -> Result<Rsvp> {
        let path = format!("/events/{}/rsvps/{}", event_id, user_id);
        self.http_client
            .put(&path, &UpdateRsvpRequest { status })
            .await
    }

    /// Withdraw a member's RSVP
    pub async fn delete(&self, event_id: EventId, user_id: UserId) -> Result<()> {
        let path = format!("/events/{}/rsvps/{}", event_id, user_id);
        self.http_client.delete(&path).await
    }
}
