use std::collections::BTreeSet;
use std::future::Future;

use crate::reconcile::BatchOutcome;
use crate::types::{Rsvp, RsvpStatus, RsvpUpdate, UserId};

use super::RsvpBook;

/// Organizer-side multi-select over an event's RSVPs
#[derive(Debug, Clone, Default)]
pub struct RsvpSelection {
    selected: BTreeSet<i64>,
}

impl RsvpSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select or deselect one RSVP; returns whether it is now selected
    pub fn toggle(&mut self, rsvp_id: i64) -> bool {
        if self.selected.remove(&rsvp_id) {
            false
        } else {
            self.selected.insert(rsvp_id);
            true
        }
    }

    /// Select every RSVP of the book, or only those with `status`
    ///
    /// RSVPs still waiting for a server id are skipped.
    pub fn select_all(&mut self, book: &RsvpBook, status: Option<RsvpStatus>) {
        self.selected = book
            .rsvps()
            .iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .filter_map(|r| r.id)
            .collect();
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn is_selected(&self, rsvp_id: i64) -> bool {
        self.selected.contains(&rsvp_id)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn selected(&self) -> impl Iterator<Item = i64> + '_ {
        self.selected.iter().copied()
    }

    /// Set `status` on every selected RSVP, then clear the selection
    ///
    /// Selected ids no longer present in the book are dropped.
    pub fn execute_bulk_action(
        &mut self,
        book: &RsvpBook,
        status: RsvpStatus,
    ) -> impl Future<Output = BatchOutcome<UserId, Rsvp>> + Send + 'static {
        let updates = self
            .selected
            .iter()
            .filter_map(|id| book.list().find_by_id(*id))
            .map(|r| RsvpUpdate::new(r.user_id, status))
            .collect();
        self.clear();
        book.bulk_update(updates)
    }
}
