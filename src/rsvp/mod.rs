//! Event RSVP state with optimistic updates.
//!
//! [`RsvpBook`] keeps the RSVP list of one event in memory and routes every
//! status change through a [`Reconciler`](crate::reconcile::Reconciler), so
//! the list reflects a change before the server has confirmed it and snaps
//! back if the server refuses it.

mod book;
mod selection;

pub use book::{RsvpBook, RsvpList};
pub use selection::RsvpSelection;
