// TestDependencies - mock implementations for testing
//
// Provides mock services that can be injected into LedgerDeps for tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::{Arc, Mutex};

use super::{
    BaseClock, BaseDocumentStore, BaseEmailService, BasePushNotificationService, JwtAuthVerifier,
    LedgerDeps, UrlMediaValidator,
};
use crate::common::MemberId;
use crate::domains::policy::EconomicPolicy;

pub const TEST_JWT_SECRET: &str = "test_secret_key";
pub const TEST_JWT_ISSUER: &str = "ledger-test";

// =============================================================================
// Mock Push Notification Service
// =============================================================================

pub struct MockPushNotificationService {
    sent_notifications: Arc<Mutex<Vec<(MemberId, String, String)>>>,
    fail: bool,
}

impl MockPushNotificationService {
    pub fn new() -> Self {
        Self {
            sent_notifications: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    /// Records every call, then reports a delivery failure
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// Get all notifications that were sent
    pub fn sent_notifications(&self) -> Vec<(MemberId, String, String)> {
        self.sent_notifications.lock().unwrap().clone()
    }

    /// Recipients in send order
    pub fn sent_to(&self) -> Vec<MemberId> {
        self.sent_notifications
            .lock()
            .unwrap()
            .iter()
            .map(|(to, _, _)| *to)
            .collect()
    }

    /// Check if a notification was sent with the given title
    pub fn was_sent_with_title(&self, title: &str) -> bool {
        self.sent_notifications
            .lock()
            .unwrap()
            .iter()
            .any(|(_, t, _)| t == title)
    }
}

impl Default for MockPushNotificationService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BasePushNotificationService for MockPushNotificationService {
    async fn send_push_notification(
        &self,
        to_member_id: MemberId,
        title: &str,
        body: &str,
    ) -> Result<bool> {
        self.sent_notifications.lock().unwrap().push((
            to_member_id,
            title.to_string(),
            body.to_string(),
        ));
        if self.fail {
            return Err(anyhow!("push gateway unavailable"));
        }
        Ok(true)
    }
}

// =============================================================================
// Mock Email Service
// =============================================================================

pub struct MockEmailService {
    sent: Arc<Mutex<Vec<(String, String, String)>>>,
}

impl MockEmailService {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// (to, subject, body) in send order
    pub fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Default for MockEmailService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseEmailService for MockEmailService {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }
}

// =============================================================================
// Fixed Clock
// =============================================================================

/// Clock that only moves when told to.
#[derive(Clone)]
pub struct FixedClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Default for FixedClock {
    fn default() -> Self {
        Self::new(Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap())
    }
}

impl BaseClock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// =============================================================================
// TestDependencies
// =============================================================================

pub struct TestDependencies {
    pub push_service: Arc<MockPushNotificationService>,
    pub email_service: Arc<MockEmailService>,
    pub clock: FixedClock,
    pub auth: Arc<JwtAuthVerifier>,
    pub policy: EconomicPolicy,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            push_service: Arc::new(MockPushNotificationService::new()),
            email_service: Arc::new(MockEmailService::new()),
            clock: FixedClock::default(),
            auth: Arc::new(JwtAuthVerifier::new(
                TEST_JWT_SECRET,
                TEST_JWT_ISSUER.to_string(),
            )),
            policy: EconomicPolicy::default(),
        }
    }

    /// Set a mock push notification service
    pub fn mock_push(mut self, service: MockPushNotificationService) -> Self {
        self.push_service = Arc::new(service);
        self
    }

    /// Set the clock
    pub fn clock(mut self, clock: FixedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Set the economic policy
    pub fn policy(mut self, policy: EconomicPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Convert into LedgerDeps over the given store
    pub fn into_deps(self, store: Arc<dyn BaseDocumentStore>) -> LedgerDeps {
        LedgerDeps::new(
            store,
            self.auth,
            self.push_service,
            self.email_service,
            Arc::new(UrlMediaValidator),
            Arc::new(self.clock),
            Arc::new(self.policy),
        )
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
