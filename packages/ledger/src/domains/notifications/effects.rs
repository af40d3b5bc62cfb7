//! Notification effect - reacts to committed ledger events
//!
//! Delivery is fire-and-forget: the dispatcher runs on its own task and a
//! failed push or email is logged and dropped. Nothing here can affect the
//! ledger.
//!
//! Cascade flow:
//!   VerificationRequested → push to the member asked to verify
//!   MemberVerified        → push to the verified member
//!   InviteCreated         → invite email (when an address was given)
//!   MemberTrusted / MemberFlagged / FlagResolved / Given → push to the target

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::events::LedgerEvent;
use crate::common::MemberId;
use crate::kernel::{BaseEmailService, BasePushNotificationService, EventReceiver};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Push {
        to_member_id: MemberId,
        title: String,
        body: String,
    },
    Email {
        to: String,
        subject: String,
        body: String,
    },
}

fn push(to_member_id: MemberId, title: &str, body: impl Into<String>) -> Notification {
    Notification::Push {
        to_member_id,
        title: title.to_string(),
        body: body.into(),
    }
}

/// Notifications a committed event should produce.
pub fn notifications_for(event: &LedgerEvent) -> Vec<Notification> {
    match event {
        // =====================================================================
        // Membership
        // =====================================================================
        LedgerEvent::VerificationRequested { to, .. } => vec![push(
            *to,
            "Verification requested",
            "A member has asked you to verify their identity.",
        )],
        LedgerEvent::MemberVerified {
            member_id,
            invite_confirmed,
            ..
        } => {
            let body = if *invite_confirmed {
                "You have been verified and your invite is confirmed."
            } else {
                "Another member has verified your identity."
            };
            vec![push(*member_id, "You were verified", body)]
        }
        LedgerEvent::InviteCreated {
            invite_token,
            invite_email: Some(email),
            ..
        } => vec![Notification::Email {
            to: email.clone(),
            subject: "You have been invited".to_string(),
            body: format!("Use invite code {} when you create your account.", invite_token),
        }],

        // =====================================================================
        // Social
        // =====================================================================
        LedgerEvent::MemberTrusted { to, .. } => {
            vec![push(*to, "New trust", "A member has marked you as trusted.")]
        }
        LedgerEvent::MemberFlagged { member_id, .. } => vec![push(
            *member_id,
            "Account flagged",
            "Your account has been flagged for review.",
        )],
        LedgerEvent::FlagResolved { member_id, .. } => vec![push(
            *member_id,
            "Flag resolved",
            "A flag on your account has been resolved.",
        )],

        // =====================================================================
        // Economy
        // =====================================================================
        LedgerEvent::Given { to, net_amount, .. } => vec![push(
            *to,
            "Payment received",
            format!("You received {}.", net_amount),
        )],

        // =====================================================================
        // Terminal events - nobody to tell
        // =====================================================================
        LedgerEvent::MemberCreated { .. }
        | LedgerEvent::InviteCreated {
            invite_email: None,
            ..
        }
        | LedgerEvent::MemberEdited { .. }
        | LedgerEvent::Minted { .. } => Vec::new(),
    }
}

/// Consumes the outbox and delivers notifications.
#[derive(Clone)]
pub struct NotificationDispatcher {
    push: Arc<dyn BasePushNotificationService>,
    email: Arc<dyn BaseEmailService>,
}

impl NotificationDispatcher {
    pub fn new(
        push: Arc<dyn BasePushNotificationService>,
        email: Arc<dyn BaseEmailService>,
    ) -> Self {
        Self { push, email }
    }

    pub fn spawn(self, rx: EventReceiver) -> JoinHandle<()> {
        tokio::spawn(self.run(rx))
    }

    /// Runs until every outbox sender is dropped.
    pub async fn run(self, mut rx: EventReceiver) {
        info!("Notification dispatcher started");
        while let Some(event) = rx.recv().await {
            self.dispatch(&event).await;
        }
        info!("Notification dispatcher stopped");
    }

    pub async fn dispatch(&self, event: &LedgerEvent) {
        for notification in notifications_for(event) {
            self.deliver(notification).await;
        }
    }

    async fn deliver(&self, notification: Notification) {
        match notification {
            Notification::Push {
                to_member_id,
                title,
                body,
            } => match self
                .push
                .send_push_notification(to_member_id, &title, &body)
                .await
            {
                Ok(true) => debug!(member_id = %to_member_id, title = %title, "Push notification sent"),
                Ok(false) => debug!(member_id = %to_member_id, "Member has no push device"),
                Err(e) => warn!(member_id = %to_member_id, error = %e, "Push notification failed"),
            },
            Notification::Email { to, subject, body } => {
                if let Err(e) = self.email.send_email(&to, &subject, &body).await {
                    warn!(error = %e, subject = %subject, "Email delivery failed");
                }
            }
        }
    }
}
