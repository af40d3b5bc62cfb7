//! Ledger domains.
//!
//! `operations` owns the log and its fold, `abilities` and `policy` are the
//! pure rule sets, and `member`, `social` and `economy` hold the commands.

pub mod abilities;
pub mod economy;
pub mod member;
pub mod notifications;
pub mod operations;
pub mod policy;
pub mod social;
