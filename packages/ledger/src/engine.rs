//! Ledger engine - one async entry point per operation code.
//!
//! Every mutating call runs its command through the transaction coordinator
//! and, once the commit is durable, publishes the command's events to the
//! outbox for the notification dispatcher.

use anyhow::Context;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::common::{Amount, LedgerError, MediaReference, MemberId, OperationId};
use crate::domains::economy::actions::{Give, Mint};
use crate::domains::member::actions::{CreateMember, EditMember, RequestVerification};
use crate::domains::member::models::Member;
use crate::domains::notifications::NotificationDispatcher;
use crate::domains::operations::models::{EditMemberData, MintData, Operation, OperationQuery};
use crate::domains::operations::projection::{self, ProjectionMismatch};
use crate::domains::social::actions::{FlagMember, Invite, ResolveFlagMember, Trust, Verify};
use crate::config::Config;
use crate::kernel::{
    BaseAuthVerifier, BaseDocumentStore, BaseEmailService, BasePushNotificationService,
    EventOutbox, LedgerCommand, LedgerDeps, LedgerTxn, RetryPolicy, StatusHint,
    TransactionCoordinator,
};

/// Result of a successful command.
#[derive(Debug, Clone)]
pub struct OperationOutcome {
    /// Appended operations, or the existing one for an idempotent replay
    pub operations: Vec<Operation>,
    pub status: StatusHint,
}

impl OperationOutcome {
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// The primary operation of the request.
    pub fn operation(&self) -> Option<&Operation> {
        self.operations.first()
    }
}

#[derive(Debug, Clone)]
pub struct CreateMemberRequest {
    pub full_name: String,
    pub username: String,
    pub identity_video: MediaReference,
    pub invite_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct InviteRequest {
    pub invite_token: String,
    pub video: MediaReference,
    pub is_joint_video: bool,
    pub invite_email: Option<String>,
}

pub struct LedgerEngine {
    coordinator: TransactionCoordinator,
    outbox: EventOutbox,
    auth: Arc<dyn BaseAuthVerifier>,
    dispatcher: JoinHandle<()>,
}

impl LedgerEngine {
    /// Build the engine and spawn its notification dispatcher. Must be
    /// called inside a tokio runtime. Fails on an invalid policy.
    pub fn start(deps: LedgerDeps, retry: RetryPolicy) -> anyhow::Result<Self> {
        let coordinator = TransactionCoordinator::new(
            deps.store,
            deps.clock,
            deps.media_validator,
            deps.policy,
            retry,
        )
        .context("Failed to start ledger engine")?;

        let (outbox, rx) = EventOutbox::channel();
        let dispatcher =
            NotificationDispatcher::new(deps.push_service, deps.email_service).spawn(rx);

        Ok(Self {
            coordinator,
            outbox,
            auth: deps.auth,
            dispatcher,
        })
    }

    /// Build deps from configuration and start the engine with the
    /// configured retry policy.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn BaseDocumentStore>,
        push_service: Arc<dyn BasePushNotificationService>,
        email_service: Arc<dyn BaseEmailService>,
    ) -> anyhow::Result<Self> {
        let deps = LedgerDeps::from_config(config, store, push_service, email_service)?;
        Self::start(deps, config.retry_policy())
    }

    /// Close the outbox and wait until every queued notification went out.
    pub async fn shutdown(self) {
        drop(self.outbox);
        if let Err(e) = self.dispatcher.await {
            warn!(error = %e, "Notification dispatcher ended abnormally");
        }
    }

    pub async fn authenticate(&self, bearer: &str) -> Result<MemberId, LedgerError> {
        self.auth
            .verify(bearer)
            .await
            .map_err(|e| LedgerError::Unauthenticated(e.to_string()))
    }

    /// Create the policy's default donation recipient if it is missing.
    /// Returns true when it was created.
    pub async fn ensure_system_accounts(&self) -> Result<bool, LedgerError> {
        let recipient = self.coordinator.policy().default_donation_recipient;
        let mut txn = LedgerTxn::new(self.coordinator.store().begin().await?);

        if txn.member(recipient).await?.is_some() {
            txn.abort().await;
            return Ok(false);
        }

        txn.put_member(Member::new(
            recipient,
            "Community Fund",
            "community-fund",
            self.coordinator.now(),
        ));
        txn.commit().await?;
        info!(member_id = %recipient, "Created default donation recipient");
        Ok(true)
    }

    async fn run<C: LedgerCommand>(&self, command: C) -> Result<OperationOutcome, LedgerError> {
        let committed = self.coordinator.execute(&command).await?;
        self.outbox.publish(committed.events);
        Ok(OperationOutcome {
            operations: committed.operations,
            status: committed.status,
        })
    }

    // =========================================================================
    // Membership
    // =========================================================================

    /// `identity` is the caller's verified id; there is no acting member yet.
    pub async fn create_member(
        &self,
        identity: MemberId,
        request: CreateMemberRequest,
    ) -> Result<OperationOutcome, LedgerError> {
        self.run(CreateMember {
            member_id: identity,
            full_name: request.full_name,
            username: request.username,
            identity_video: request.identity_video,
            invite_token: request.invite_token,
        })
        .await
    }

    pub async fn edit_member(
        &self,
        actor_id: MemberId,
        data: EditMemberData,
    ) -> Result<OperationOutcome, LedgerError> {
        self.run(EditMember { actor_id, data }).await
    }

    pub async fn request_verification(
        &self,
        actor_id: MemberId,
        to_member_id: MemberId,
    ) -> Result<OperationOutcome, LedgerError> {
        self.run(RequestVerification {
            actor_id,
            to_member_id,
        })
        .await
    }

    // =========================================================================
    // Social
    // =========================================================================

    pub async fn invite(
        &self,
        actor_id: MemberId,
        request: InviteRequest,
    ) -> Result<OperationOutcome, LedgerError> {
        self.run(Invite {
            actor_id,
            invite_token: request.invite_token,
            video: request.video,
            is_joint_video: request.is_joint_video,
            invite_email: request.invite_email,
        })
        .await
    }

    pub async fn verify(
        &self,
        actor_id: MemberId,
        to_member_id: MemberId,
        video: MediaReference,
    ) -> Result<OperationOutcome, LedgerError> {
        self.run(Verify {
            actor_id,
            to_member_id,
            video,
        })
        .await
    }

    pub async fn trust(
        &self,
        actor_id: MemberId,
        to_member_id: MemberId,
    ) -> Result<OperationOutcome, LedgerError> {
        self.run(Trust {
            actor_id,
            to_member_id,
        })
        .await
    }

    pub async fn flag_member(
        &self,
        actor_id: MemberId,
        to_member_id: MemberId,
        reason: impl Into<String>,
    ) -> Result<OperationOutcome, LedgerError> {
        self.run(FlagMember {
            actor_id,
            to_member_id,
            reason: reason.into(),
        })
        .await
    }

    pub async fn resolve_flag(
        &self,
        actor_id: MemberId,
        to_member_id: MemberId,
        flag_operation_id: OperationId,
        reason: impl Into<String>,
    ) -> Result<OperationOutcome, LedgerError> {
        self.run(ResolveFlagMember {
            actor_id,
            to_member_id,
            flag_operation_id,
            reason: reason.into(),
        })
        .await
    }

    // =========================================================================
    // Economy
    // =========================================================================

    pub async fn mint(
        &self,
        actor_id: MemberId,
        data: MintData,
    ) -> Result<OperationOutcome, LedgerError> {
        self.run(Mint { actor_id, data }).await
    }

    pub async fn give(
        &self,
        actor_id: MemberId,
        to_member_id: MemberId,
        amount: Amount,
        memo: Option<String>,
    ) -> Result<OperationOutcome, LedgerError> {
        self.run(Give {
            actor_id,
            to_member_id,
            amount,
            memo,
        })
        .await
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get_member(&self, id: MemberId) -> Result<Option<Member>, LedgerError> {
        let mut txn = LedgerTxn::new(self.coordinator.store().begin().await?);
        let member = txn.member(id).await;
        txn.abort().await;
        member
    }

    /// Matching operations, oldest first.
    pub async fn list_operations(
        &self,
        query: &OperationQuery,
    ) -> Result<Vec<Operation>, LedgerError> {
        let mut txn = LedgerTxn::new(self.coordinator.store().begin().await?);
        let operations = txn.find_operations(query).await;
        txn.abort().await;
        operations
    }

    /// Replay the whole log and report members whose stored projection
    /// disagrees with it.
    pub async fn audit(&self) -> Result<Vec<ProjectionMismatch>, LedgerError> {
        let report = projection::audit_store(self.coordinator.store().as_ref()).await?;
        info!(
            members = report.members,
            operations = report.operations,
            mismatches = report.mismatches.len(),
            "Projection audit finished"
        );
        Ok(report.mismatches)
    }
}
