use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::client::RsvpApi;
use crate::error::{Error, Result};
use crate::reconcile::{BatchOutcome, OptimisticTarget, Reconciler};
use crate::types::{CapacityInfo, EventId, Rsvp, RsvpCounts, RsvpStatus, RsvpUpdate, UserId};

/// The RSVPs of one event, keyed by member
///
/// Order is preserved: replacing a member's RSVP keeps its position and new
/// RSVPs are appended.
#[derive(Debug, Default)]
pub struct RsvpList {
    rsvps: RwLock<Vec<Rsvp>>,
}

impl RsvpList {
    pub fn new(rsvps: Vec<Rsvp>) -> Self {
        Self {
            rsvps: RwLock::new(rsvps),
        }
    }

    pub fn all(&self) -> Vec<Rsvp> {
        self.rsvps.read().clone()
    }

    pub fn len(&self) -> usize {
        self.rsvps.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rsvps.read().is_empty()
    }

    pub fn find(&self, user_id: UserId) -> Option<Rsvp> {
        self.rsvps
            .read()
            .iter()
            .find(|r| r.user_id == user_id)
            .cloned()
    }

    pub fn find_by_id(&self, rsvp_id: i64) -> Option<Rsvp> {
        self.rsvps
            .read()
            .iter()
            .find(|r| r.id == Some(rsvp_id))
            .cloned()
    }

    fn replace_all(&self, rsvps: Vec<Rsvp>) {
        *self.rsvps.write() = rsvps;
    }

    fn read<R>(&self, f: impl FnOnce(&[Rsvp]) -> R) -> R {
        f(&self.rsvps.read())
    }
}

impl OptimisticTarget for RsvpList {
    type Key = UserId;
    type Value = Rsvp;

    fn current(&self, user_id: &UserId) -> Option<Rsvp> {
        self.find(*user_id)
    }

    fn apply(&self, user_id: &UserId, value: Option<Rsvp>) {
        let mut rsvps = self.rsvps.write();
        let position = rsvps.iter().position(|r| r.user_id == *user_id);
        match (value, position) {
            (Some(rsvp), Some(i)) => rsvps[i] = rsvp,
            (Some(rsvp), None) => rsvps.push(rsvp),
            (None, Some(i)) => {
                rsvps.remove(i);
            }
            (None, None) => {}
        }
    }
}

/// RSVP state of one event as seen by one member
///
/// Status changes are applied locally first and reconciled with the backend;
/// changes for the same member are sent one at a time in the order they were
/// made.
#[derive(Clone)]
pub struct RsvpBook {
    api: RsvpApi,
    event_id: EventId,
    current_user: Option<UserId>,
    reconciler: Reconciler<RsvpList>,
}

impl RsvpBook {
    pub fn new(api: RsvpApi, event_id: EventId, current_user: Option<UserId>) -> Self {
        Self::with_rsvps(api, event_id, current_user, Vec::new())
    }

    /// Start from an already fetched list
    pub fn with_rsvps(
        api: RsvpApi,
        event_id: EventId,
        current_user: Option<UserId>,
        rsvps: Vec<Rsvp>,
    ) -> Self {
        Self {
            api,
            event_id,
            current_user,
            reconciler: Reconciler::new(RsvpList::new(rsvps)),
        }
    }

    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    pub fn current_user(&self) -> Option<UserId> {
        self.current_user
    }

    pub fn list(&self) -> &Arc<RsvpList> {
        self.reconciler.target()
    }

    pub fn rsvps(&self) -> Vec<Rsvp> {
        self.list().all()
    }

    /// Whether any change is waiting on the backend
    pub fn is_syncing(&self) -> bool {
        self.reconciler.pending_count() > 0
    }

    /// Replace the local list with the backend's
    pub async fn load(&self) -> Result<()> {
        let rsvps = self.api.list(self.event_id).await?;
        debug!(event_id = self.event_id, count = rsvps.len(), "Loaded RSVPs");
        self.list().replace_all(rsvps);
        Ok(())
    }

    /// Set the current member's status
    ///
    /// The change is visible in [`list`](Self::list) as soon as this returns;
    /// the future resolves with the server's record.
    pub fn update_rsvp(
        &self,
        status: RsvpStatus,
    ) -> impl Future<Output = Result<Rsvp>> + Send + 'static {
        let mutation = self
            .require_user()
            .map(|user_id| self.set_status(user_id, status));
        async move { mutation?.await }
    }

    /// Withdraw the current member's RSVP; a no-op if there is none
    pub fn remove_rsvp(&self) -> impl Future<Output = Result<()>> + Send + 'static {
        let mutation = self.require_user().map(|user_id| {
            if self.list().find(user_id).is_none() {
                return None;
            }
            let api = self.api.clone();
            let event_id = self.event_id;
            Some(self.reconciler.mutate(user_id, None, move |_| async move {
                api.delete(event_id, user_id).await?;
                Ok(None)
            }))
        });

        async move {
            if let Some(mutation) = mutation? {
                mutation.await?;
            }
            Ok(())
        }
    }

    /// Set any member's status
    ///
    /// Members without an RSVP get one created; everyone else is updated in
    /// place.
    pub fn set_status(
        &self,
        user_id: UserId,
        status: RsvpStatus,
    ) -> impl Future<Output = Result<Rsvp>> + Send + 'static {
        let mutation = self.reconciler.mutate_with(
            user_id,
            self.optimistic(user_id, status),
            self.remote(user_id, status),
        );
        async move {
            mutation
                .await?
                .ok_or_else(|| Error::InvalidParameter(format!("no RSVP for user {}", user_id)))
        }
    }

    /// Move a waitlisted RSVP to attending
    pub fn promote_from_waitlist(
        &self,
        rsvp_id: i64,
    ) -> impl Future<Output = Result<Rsvp>> + Send + 'static {
        let mutation = self
            .list()
            .find_by_id(rsvp_id)
            .ok_or_else(|| Error::InvalidParameter(format!("unknown RSVP {}", rsvp_id)))
            .map(|rsvp| {
                info!(rsvp_id, user_id = rsvp.user_id, "Promoting from waitlist");
                self.set_status(rsvp.user_id, RsvpStatus::Attending)
            });
        async move { mutation?.await }
    }

    /// Apply several status changes at once
    ///
    /// Every change is applied optimistically before this returns; each one
    /// commits or rolls back on its own.
    pub fn bulk_update(
        &self,
        updates: Vec<RsvpUpdate>,
    ) -> impl Future<Output = BatchOutcome<UserId, Rsvp>> + Send + 'static {
        let items: Vec<_> = updates
            .into_iter()
            .map(|update| {
                (
                    update.user_id,
                    self.optimistic(update.user_id, update.status),
                    self.remote(update.user_id, update.status),
                )
            })
            .collect();
        self.reconciler.mutate_all(items)
    }

    /// Promote every waitlisted member, earliest first
    pub fn promote_all_waitlist(
        &self,
    ) -> impl Future<Output = BatchOutcome<UserId, Rsvp>> + Send + 'static {
        let updates = self
            .waitlist()
            .into_iter()
            .map(|r| RsvpUpdate::new(r.user_id, RsvpStatus::Attending))
            .collect();
        self.bulk_update(updates)
    }

    pub fn counts(&self) -> RsvpCounts {
        self.list().read(|rsvps| RsvpCounts::tally(rsvps))
    }

    /// Attending plus waitlisted members
    pub fn total_attending(&self) -> usize {
        let counts = self.counts();
        counts.attending + counts.waitlist
    }

    pub fn current_user_rsvp(&self) -> Option<Rsvp> {
        self.current_user.and_then(|user_id| self.list().find(user_id))
    }

    pub fn has_user_rsvped(&self) -> bool {
        self.current_user_rsvp().is_some()
    }

    pub fn by_status(&self, status: RsvpStatus) -> Vec<Rsvp> {
        self.list().read(|rsvps| {
            rsvps
                .iter()
                .filter(|r| r.status == status)
                .cloned()
                .collect()
        })
    }

    /// 1-based place in the waitlist by signup time, 0 if not waitlisted
    pub fn waitlist_position(&self, user_id: UserId) -> usize {
        self.waitlist()
            .iter()
            .position(|r| r.user_id == user_id)
            .map_or(0, |i| i + 1)
    }

    /// Whether the current member can take a seat
    ///
    /// `capacity` of `None` or 0 means unlimited.
    pub fn can_user_attend(&self, capacity: Option<u32>) -> bool {
        let Some(capacity) = capacity.filter(|c| *c > 0) else {
            return true;
        };
        let already_attending = self
            .current_user_rsvp()
            .is_some_and(|r| r.status == RsvpStatus::Attending);
        already_attending || self.counts().attending < capacity as usize
    }

    pub fn capacity_info(&self, capacity: Option<u32>) -> CapacityInfo {
        let counts = self.counts();
        let Some(capacity) = capacity.filter(|c| *c > 0) else {
            return CapacityInfo {
                is_full: false,
                percentage: 0,
                remaining: None,
                waitlist_count: counts.waitlist,
            };
        };

        let attending = counts.attending as u32;
        let percentage = (f64::from(attending) / f64::from(capacity) * 100.0).round();
        CapacityInfo {
            is_full: attending >= capacity,
            percentage: percentage.min(100.0) as u8,
            remaining: Some(capacity.saturating_sub(attending)),
            waitlist_count: counts.waitlist,
        }
    }

    fn waitlist(&self) -> Vec<Rsvp> {
        let mut waitlist = self.by_status(RsvpStatus::Waitlist);
        waitlist.sort_by_key(|r| r.created_at);
        waitlist
    }

    fn require_user(&self) -> Result<UserId> {
        self.current_user
            .ok_or_else(|| Error::InvalidParameter("no current user".to_string()))
    }

    /// Optimistic record, built from whatever is in place when the change's
    /// turn comes
    fn optimistic(
        &self,
        user_id: UserId,
        status: RsvpStatus,
    ) -> impl FnOnce(Option<Rsvp>) -> Option<Rsvp> + Send + 'static {
        let event_id = self.event_id;
        move |current| {
            Some(match current {
                Some(existing) => existing.with_status(status),
                None => Rsvp::provisional(event_id, user_id, status),
            })
        }
    }

    fn remote(
        &self,
        user_id: UserId,
        status: RsvpStatus,
    ) -> impl FnOnce(Option<Rsvp>) -> BoxFuture<'static, Result<Option<Rsvp>>> + Send + 'static {
        let api = self.api.clone();
        let event_id = self.event_id;
        move |previous| {
            Box::pin(async move {
                let rsvp = match previous {
                    Some(_) => api.update(event_id, user_id, status).await?,
                    None => api.create(event_id, user_id, status).await?,
                };
                Ok(Some(rsvp))
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::time::Duration;
    use tokio_test::assert_ok;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn rsvp(id: i64, user_id: UserId, status: RsvpStatus, minute: u32) -> Rsvp {
        Rsvp {
            id: Some(id),
            event_id: Some(4),
            user_id,
            status,
            created_at: Some(Utc.with_ymd_and_hms(2025, 10, 1, 18, minute, 0).unwrap()),
        }
    }

    fn book(server: &MockServer, rsvps: Vec<Rsvp>) -> RsvpBook {
        RsvpBook::with_rsvps(RsvpApi::new(server.uri()), 4, Some(10), rsvps)
    }

    fn echo(user_id: UserId, status: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "id": 100 + user_id,
            "eventId": 4,
            "userId": user_id,
            "status": status
        }))
    }

    #[tokio::test]
    async fn test_offline_update_reverts() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/events/4/rsvps/10"))
            .respond_with(ResponseTemplate::new(503).set_body_string("offline"))
            .mount(&server)
            .await;

        let book = book(&server, vec![rsvp(1, 10, RsvpStatus::Maybe, 0)]);
        let err = book.update_rsvp(RsvpStatus::Attending).await.unwrap_err();

        assert!(err.is_remote());
        assert_eq!(book.current_user_rsvp().unwrap().status, RsvpStatus::Maybe);
        assert!(!book.is_syncing());
    }

    #[tokio::test]
    async fn test_optimistic_value_visible_while_in_flight() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/events/4/rsvps/10"))
            .respond_with(echo(10, "ATTENDING").set_delay(Duration::from_millis(200)))
            .mount(&server)
            .await;

        let book = book(&server, vec![rsvp(1, 10, RsvpStatus::Maybe, 0)]);
        let update = tokio::spawn({
            let book = book.clone();
            async move { book.update_rsvp(RsvpStatus::Attending).await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(book.current_user_rsvp().unwrap().status, RsvpStatus::Attending);
        assert!(book.is_syncing());

        update.await.unwrap().unwrap();
        assert!(!book.is_syncing());
    }

    #[tokio::test]
    async fn test_update_is_visible_before_first_poll() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/events/4/rsvps/10"))
            .respond_with(echo(10, "ATTENDING"))
            .mount(&server)
            .await;

        let book = book(&server, vec![rsvp(1, 10, RsvpStatus::Maybe, 0)]);
        let update = book.update_rsvp(RsvpStatus::Attending);

        let local = book.current_user_rsvp().unwrap();
        assert_eq!(local.status, RsvpStatus::Attending);
        assert_eq!(local.id, Some(1));
        assert!(book.is_syncing());

        assert_eq!(update.await.unwrap().id, Some(110));
    }

    #[tokio::test]
    async fn test_queued_change_keeps_created_record() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/events/4/rsvps"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": 77,
                "eventId": 4,
                "userId": 10,
                "status": "ATTENDING",
                "createdAt": "2025-10-01T18:00:00Z"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/events/4/rsvps/10"))
            .and(body_json(json!({"status": "MAYBE"})))
            .respond_with(echo(10, "MAYBE").set_delay(Duration::from_millis(300)))
            .expect(1)
            .mount(&server)
            .await;

        let book = book(&server, Vec::new());
        let create = book.update_rsvp(RsvpStatus::Attending);
        let change = book.update_rsvp(RsvpStatus::Maybe);
        create.await.unwrap();

        // the queued change is applied on top of the server's record
        tokio::time::sleep(Duration::from_millis(100)).await;
        let local = book.current_user_rsvp().unwrap();
        assert_eq!(local.status, RsvpStatus::Maybe);
        assert_eq!(local.id, Some(77));
        assert_eq!(
            local.created_at,
            Some(Utc.with_ymd_and_hms(2025, 10, 1, 18, 0, 0).unwrap())
        );

        change.await.unwrap();
        assert_eq!(book.rsvps().len(), 1);
    }

    #[tokio::test]
    async fn test_rapid_changes_apply_in_request_order() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/events/4/rsvps/10"))
            .and(body_json(json!({"status": "ATTENDING"})))
            .respond_with(echo(10, "ATTENDING").set_delay(Duration::from_millis(150)))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/events/4/rsvps/10"))
            .and(body_json(json!({"status": "MAYBE"})))
            .respond_with(echo(10, "MAYBE"))
            .mount(&server)
            .await;

        let book = book(&server, vec![rsvp(1, 10, RsvpStatus::NotAttending, 0)]);
        let (first, second) = tokio::join!(
            book.update_rsvp(RsvpStatus::Attending),
            book.update_rsvp(RsvpStatus::Maybe)
        );

        assert_eq!(first.unwrap().status, RsvpStatus::Attending);
        assert_eq!(second.unwrap().status, RsvpStatus::Maybe);
        assert_eq!(book.current_user_rsvp().unwrap().status, RsvpStatus::Maybe);
    }

    #[tokio::test]
    async fn test_first_rsvp_is_created_with_server_value() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/events/4/rsvps"))
            .and(body_json(json!({"userId": 10, "status": "ATTENDING"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": 77, "eventId": 4, "userId": 10, "status": "WAITLIST"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let book = book(&server, Vec::new());
        assert!(!book.has_user_rsvped());

        let confirmed = book.update_rsvp(RsvpStatus::Attending).await.unwrap();
        assert_eq!(confirmed.id, Some(77));
        assert_eq!(book.current_user_rsvp().unwrap().status, RsvpStatus::Waitlist);
    }

    #[tokio::test]
    async fn test_remove_rsvp() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/events/4/rsvps/10"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let book = book(&server, vec![rsvp(1, 10, RsvpStatus::Attending, 0)]);
        assert_ok!(book.remove_rsvp().await);
        assert!(!book.has_user_rsvped());

        // nothing left to delete
        assert_ok!(book.remove_rsvp().await);
    }

    #[tokio::test]
    async fn test_update_requires_current_user() {
        let server = MockServer::start().await;
        let book = RsvpBook::new(RsvpApi::new(server.uri()), 4, None);
        let err = book.update_rsvp(RsvpStatus::Attending).await.unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[tokio::test]
    async fn test_load_replaces_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/events/4/rsvps"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 1, "eventId": 4, "userId": 10, "status": "ATTENDING"},
                {"id": 2, "eventId": 4, "userId": 11, "status": "MAYBE"}
            ])))
            .mount(&server)
            .await;

        let book = book(&server, vec![rsvp(9, 99, RsvpStatus::Waitlist, 0)]);
        book.load().await.unwrap();

        assert_eq!(book.rsvps().len(), 2);
        assert_eq!(book.counts().maybe, 1);
        assert!(book.has_user_rsvped());
    }

    #[tokio::test]
    async fn test_bulk_update_reports_partial_failure() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/events/4/rsvps/11"))
            .respond_with(echo(11, "ATTENDING"))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/events/4/rsvps/12"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let book = book(
            &server,
            vec![
                rsvp(1, 11, RsvpStatus::Maybe, 0),
                rsvp(2, 12, RsvpStatus::Maybe, 1),
            ],
        );
        let outcome = book
            .bulk_update(vec![
                RsvpUpdate::new(11, RsvpStatus::Attending),
                RsvpUpdate::new(12, RsvpStatus::Attending),
            ])
            .await;

        assert_eq!(outcome.len(), 2);
        assert!(!outcome.is_complete());
        assert_eq!(outcome.failed().map(|(k, _)| *k).collect::<Vec<_>>(), vec![12]);
        assert_eq!(book.list().find(11).unwrap().status, RsvpStatus::Attending);
        assert_eq!(book.list().find(12).unwrap().status, RsvpStatus::Maybe);
    }

    #[tokio::test]
    async fn test_promote_all_waitlist() {
        let server = MockServer::start().await;
        for user_id in [11, 12] {
            Mock::given(method("PUT"))
                .and(path(format!("/api/events/4/rsvps/{}", user_id)))
                .and(body_json(json!({"status": "ATTENDING"})))
                .respond_with(echo(user_id, "ATTENDING"))
                .expect(1)
                .mount(&server)
                .await;
        }

        let book = book(
            &server,
            vec![
                rsvp(1, 10, RsvpStatus::Attending, 0),
                rsvp(2, 12, RsvpStatus::Waitlist, 5),
                rsvp(3, 11, RsvpStatus::Waitlist, 2),
            ],
        );
        let outcome = book.promote_all_waitlist().await;

        assert_eq!(outcome.items.iter().map(|i| i.key).collect::<Vec<_>>(), vec![11, 12]);
        assert!(outcome.is_complete());
        assert_eq!(book.total_attending(), 3);
        assert!(book.by_status(RsvpStatus::Waitlist).is_empty());
    }

    #[tokio::test]
    async fn test_promote_from_waitlist_by_rsvp_id() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/events/4/rsvps/11"))
            .respond_with(echo(11, "ATTENDING"))
            .expect(1)
            .mount(&server)
            .await;

        let book = book(&server, vec![rsvp(3, 11, RsvpStatus::Waitlist, 2)]);
        let promoted = book.promote_from_waitlist(3).await.unwrap();
        assert_eq!(promoted.status, RsvpStatus::Attending);

        assert!(matches!(
            book.promote_from_waitlist(404).await,
            Err(Error::InvalidParameter(_))
        ));
    }

    #[tokio::test]
    async fn test_waitlist_and_capacity() {
        let server = MockServer::start().await;
        let book = book(
            &server,
            vec![
                rsvp(1, 20, RsvpStatus::Attending, 0),
                rsvp(2, 21, RsvpStatus::Attending, 1),
                rsvp(3, 10, RsvpStatus::Waitlist, 9),
                rsvp(4, 22, RsvpStatus::Waitlist, 3),
            ],
        );

        assert_eq!(book.total_attending(), 4);
        assert_eq!(book.waitlist_position(22), 1);
        assert_eq!(book.waitlist_position(10), 2);
        assert_eq!(book.waitlist_position(20), 0);

        let full = book.capacity_info(Some(2));
        assert!(full.is_full);
        assert_eq!(full.percentage, 100);
        assert_eq!(full.remaining, Some(0));
        assert_eq!(full.waitlist_count, 2);
        assert!(!book.can_user_attend(Some(2)));

        let roomy = book.capacity_info(Some(3));
        assert!(!roomy.is_full);
        assert_eq!(roomy.percentage, 67);
        assert_eq!(roomy.remaining, Some(1));
        assert!(book.can_user_attend(Some(3)));

        let unlimited = book.capacity_info(None);
        assert_eq!(unlimited.remaining, None);
        assert!(book.can_user_attend(Some(0)));
    }
}
