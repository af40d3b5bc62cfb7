// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no ledger rules.
// Ledger rules live in the domain commands that use these traits.
//
// Naming convention: Base* for trait names (e.g., BaseAuthVerifier, BaseClock)

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::common::{MediaReference, MemberId};

pub use super::store::{BaseDocumentStore, StoreTransaction};

// =============================================================================
// Auth Verifier Trait (Infrastructure - bearer token -> identity)
// =============================================================================

#[async_trait]
pub trait BaseAuthVerifier: Send + Sync {
    /// Verify a bearer token and return the member id it was issued for
    async fn verify(&self, bearer: &str) -> Result<MemberId>;
}

// =============================================================================
// Push Notification Service Trait (Infrastructure - Push Notifications)
// =============================================================================

#[async_trait]
pub trait BasePushNotificationService: Send + Sync {
    /// Send a push notification to a member's registered devices.
    /// Returns false when the member has no device to deliver to.
    async fn send_push_notification(
        &self,
        to_member_id: MemberId,
        title: &str,
        body: &str,
    ) -> Result<bool>;
}

// =============================================================================
// Email Service Trait (Infrastructure - Invite emails)
// =============================================================================

#[async_trait]
pub trait BaseEmailService: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

// =============================================================================
// Media Validator Trait (Infrastructure - uploaded video references)
// =============================================================================

pub trait BaseMediaValidator: Send + Sync {
    /// Check that a media reference points at something usable
    fn validate(&self, media: &MediaReference) -> Result<()>;
}

// =============================================================================
// Clock Trait
// =============================================================================

pub trait BaseClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl BaseClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
