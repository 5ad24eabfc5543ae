pub mod bot;
pub mod dispatch;
pub mod events;
pub mod guild;
pub mod objects;
pub mod readiness;

pub use bot::Bot;
pub use guild::{Guild, PresenceChange};
