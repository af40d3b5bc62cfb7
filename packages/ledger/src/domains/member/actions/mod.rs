//! Member domain actions - ledger commands for membership
//!
//! Each action is a `LedgerCommand` run by the transaction coordinator. It
//! reads what it needs, validates, buffers writes and queues fact events.

mod create_member;
mod edit_member;
mod request_verification;

pub use create_member::CreateMember;
pub use edit_member::EditMember;
pub use request_verification::RequestVerification;
