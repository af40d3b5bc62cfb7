//! Social domain actions - invites, verification, trust and flags

mod flag;
mod invite;
mod trust;
mod verify;

pub use flag::{FlagMember, ResolveFlagMember};
pub use invite::Invite;
pub use trust::Trust;
pub use verify::Verify;
