mod frame;
mod live;
mod monitoring;
mod rsvp;

// Re-export all types
pub use frame::*;
pub use live::*;
pub use monitoring::*;
pub use rsvp::*;
