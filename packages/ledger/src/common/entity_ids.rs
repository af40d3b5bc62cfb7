//! Typed ID definitions for ledger entities.

pub use super::id::Id;

/// Marker type for Member entities.
pub struct Member;

/// Marker type for Operation entities (ledger log entries).
pub struct Operation;

/// Typed ID for Member entities. Equal to the member's verified identity.
pub type MemberId = Id<Member>;

/// Typed ID for Operation entities.
pub type OperationId = Id<Operation>;
