pub mod effects;
pub mod events;

pub use effects::{notifications_for, Notification, NotificationDispatcher};
pub use events::LedgerEvent;
