//! Ledger dependencies (using traits for testability)
//!
//! Central dependency container handed to `LedgerEngine::start`. All external
//! services are trait objects so tests can swap in mocks.

use anyhow::{Context, Result};
use std::sync::Arc;

use super::{
    BaseAuthVerifier, BaseClock, BaseDocumentStore, BaseEmailService, BaseMediaValidator,
    BasePushNotificationService, JwtAuthVerifier, SystemClock, UrlMediaValidator,
};
use crate::config::Config;
use crate::domains::policy::EconomicPolicy;

#[derive(Clone)]
pub struct LedgerDeps {
    pub store: Arc<dyn BaseDocumentStore>,
    pub auth: Arc<dyn BaseAuthVerifier>,
    pub push_service: Arc<dyn BasePushNotificationService>,
    pub email_service: Arc<dyn BaseEmailService>,
    pub media_validator: Arc<dyn BaseMediaValidator>,
    pub clock: Arc<dyn BaseClock>,
    /// Loaded once at startup, shared read-only
    pub policy: Arc<EconomicPolicy>,
}

impl LedgerDeps {
    pub fn new(
        store: Arc<dyn BaseDocumentStore>,
        auth: Arc<dyn BaseAuthVerifier>,
        push_service: Arc<dyn BasePushNotificationService>,
        email_service: Arc<dyn BaseEmailService>,
        media_validator: Arc<dyn BaseMediaValidator>,
        clock: Arc<dyn BaseClock>,
        policy: Arc<EconomicPolicy>,
    ) -> Self {
        Self {
            store,
            auth,
            push_service,
            email_service,
            media_validator,
            clock,
            policy,
        }
    }

    /// Production wiring: JWT auth from the configured secret, URL media
    /// validation, the wall clock and the configured policy. Delivery
    /// services come from the caller.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn BaseDocumentStore>,
        push_service: Arc<dyn BasePushNotificationService>,
        email_service: Arc<dyn BaseEmailService>,
    ) -> Result<Self> {
        let secret = config
            .jwt_secret
            .as_deref()
            .context("JWT_SECRET must be set")?;
        let policy = config.load_policy().context("Failed to load economic policy")?;

        Ok(Self::new(
            store,
            Arc::new(JwtAuthVerifier::new(secret, config.jwt_issuer.clone())),
            push_service,
            email_service,
            Arc::new(UrlMediaValidator),
            Arc::new(SystemClock),
            Arc::new(policy),
        ))
    }
}
