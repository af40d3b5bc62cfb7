//! Member domain - member records, profile edits and verification requests

pub mod actions;
pub mod models;

// Re-export commonly used types
pub use models::member::Member;
