//! Operations domain - the append-only log and its projection fold

pub mod models;
pub mod projection;

pub use models::{
    EditMemberData, MintData, MintType, OpCode, Operation, OperationData, OperationQuery,
};
pub use projection::{
    audit, audit_store, baseline_genesis, replay, AuditReport, ProjectionMismatch, ReplayError,
};
