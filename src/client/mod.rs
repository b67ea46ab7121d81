//! REST bindings for the backend API.

mod monitoring;
mod rsvp;

pub use monitoring::MonitoringApi;
pub use rsvp::RsvpApi;
