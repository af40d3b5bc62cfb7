// Community currency ledger - engine core
//
// This crate provides the operation ledger for a community currency/basic
// income network: an append-only log of typed operations plus the member
// projection that is updated in the same transaction as every append.
//
// Entry point is `LedgerEngine` (one method per operation code). Storage,
// auth, media validation and notification delivery are injected through the
// `kernel` traits.

pub mod common;
pub mod config;
pub mod domains;
pub mod engine;
pub mod kernel;

pub use config::*;
pub use engine::{CreateMemberRequest, InviteRequest, LedgerEngine, OperationOutcome};
