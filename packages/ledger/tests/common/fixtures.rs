//! Test fixtures for building ledgers and members.
//!
//! Members are created through the engine wherever possible so the operation
//! log stays consistent with the projection. The only exception is the
//! founder, who has to exist before anyone can verify anyone.

#![allow(dead_code)]

use std::sync::Arc;

use ledger_core::common::{Amount, MediaReference, MemberId};
use ledger_core::domains::member::models::Member;
use ledger_core::domains::operations::models::{Operation, OperationData};
use ledger_core::kernel::test_dependencies::{
    FixedClock, MockEmailService, MockPushNotificationService, TestDependencies,
};
use ledger_core::kernel::{
    BaseClock, BaseDocumentStore, JwtAuthVerifier, LedgerTxn, MemoryStore, RetryPolicy,
};
use ledger_core::{CreateMemberRequest, InviteRequest, LedgerEngine};

/// Engine over an in-memory store with mock delivery services.
pub struct TestLedger {
    pub engine: LedgerEngine,
    pub store: MemoryStore,
    pub push: Arc<MockPushNotificationService>,
    pub email: Arc<MockEmailService>,
    pub clock: FixedClock,
    pub auth: Arc<JwtAuthVerifier>,
}

impl TestLedger {
    pub async fn new() -> Self {
        Self::with(TestDependencies::new(), RetryPolicy::default()).await
    }

    pub async fn with_retry(retry: RetryPolicy) -> Self {
        Self::with(TestDependencies::new(), retry).await
    }

    pub async fn with(deps: TestDependencies, retry: RetryPolicy) -> Self {
        let store = MemoryStore::new();
        let push = deps.push_service.clone();
        let email = deps.email_service.clone();
        let clock = deps.clock.clone();
        let auth = deps.auth.clone();

        let engine = LedgerEngine::start(deps.into_deps(Arc::new(store.clone())), retry)
            .expect("Failed to start engine");
        engine
            .ensure_system_accounts()
            .await
            .expect("Failed to create system accounts");

        Self {
            engine,
            store,
            push,
            email,
            clock,
            auth,
        }
    }

    pub fn balance(&self, id: MemberId) -> Amount {
        self.store.member(id).expect("member exists").balance
    }

    pub fn member(&self, id: MemberId) -> Member {
        self.store.member(id).expect("member exists")
    }

    /// Overwrite a balance outside the ledger. Breaks audit consistency.
    pub fn set_balance(&self, id: MemberId, balance: Amount) {
        let mut member = self.member(id);
        member.balance = balance;
        self.store.seed_member(member);
    }

    pub fn total_balance(&self) -> Amount {
        self.store.members().iter().map(|m| m.balance).sum()
    }
}

pub fn amount(s: &str) -> Amount {
    s.parse().expect("valid amount")
}

pub fn test_video() -> MediaReference {
    MediaReference::new(
        "https://media.example.org/videos/intro.mp4",
        "https://media.example.org/thumbs/intro.jpg",
    )
}

pub fn create_request(name: &str, invite_token: Option<&str>) -> CreateMemberRequest {
    CreateMemberRequest {
        full_name: name.to_string(),
        username: name.to_lowercase().replace(' ', "_"),
        identity_video: test_video(),
        invite_token: invite_token.map(str::to_string),
    }
}

pub fn invite_request(token: &str) -> InviteRequest {
    InviteRequest {
        invite_token: token.to_string(),
        video: test_video(),
        is_joint_video: false,
        invite_email: None,
    }
}

/// First member of a network. Written as a CREATE_MEMBER plus a creator-less
/// VERIFY so replay still accounts for the verification.
pub async fn create_founder(ledger: &TestLedger, name: &str) -> MemberId {
    let id = MemberId::new();
    let now = ledger.clock.now();

    let mut txn = LedgerTxn::new(ledger.store.begin().await.expect("begin"));
    txn.append(Operation::new(
        Some(id),
        OperationData::CreateMember {
            full_name: name.to_string(),
            username: name.to_lowercase(),
            identity_video: test_video(),
            invite_token: None,
        },
        now,
    ));
    txn.append(Operation::new(
        None,
        OperationData::Verify {
            to_member_id: id,
            video: test_video(),
        },
        now,
    ));

    let mut founder = Member::new(id, name, name.to_lowercase(), now);
    founder.verified_by_count = 1;
    txn.put_member(founder);
    txn.commit().await.expect("Failed to seed founder");
    id
}

/// Create a member through the engine. Not yet verified.
pub async fn join(ledger: &TestLedger, name: &str, invite_token: Option<&str>) -> MemberId {
    let id = MemberId::new();
    ledger
        .engine
        .create_member(id, create_request(name, invite_token))
        .await
        .expect("Failed to create member");
    id
}

/// Create a member and have `verifier` verify them.
pub async fn verified_member(ledger: &TestLedger, verifier: MemberId, name: &str) -> MemberId {
    let id = join(ledger, name, None).await;
    ledger
        .engine
        .verify(verifier, id, test_video())
        .await
        .expect("Failed to verify member");
    id
}

/// Invite, join with the token and confirm the invite.
pub async fn invited_member(
    ledger: &TestLedger,
    inviter: MemberId,
    name: &str,
    token: &str,
) -> MemberId {
    ledger
        .engine
        .invite(inviter, invite_request(token))
        .await
        .expect("Failed to invite");
    let id = join(ledger, name, Some(token)).await;
    ledger
        .engine
        .verify(inviter, id, test_video())
        .await
        .expect("Failed to confirm invite");
    id
}
