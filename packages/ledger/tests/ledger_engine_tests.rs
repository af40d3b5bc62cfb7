//! Ledger engine integration tests over the in-memory store.
//!
//! Each test builds its own ledger, seeds a founder and drives everything
//! else through `LedgerEngine`.

mod common;

use std::sync::Arc;

use chrono::Duration;
use rust_decimal::Decimal;

use crate::common::{
    amount, create_founder, create_request, invite_request, invited_member, join, test_video,
    verified_member, TestLedger,
};
use ledger_core::common::{LedgerError, MediaReference, MemberId, OperationId};
use ledger_core::domains::operations::models::{
    EditMemberData, MintData, MintType, OpCode, OperationData, OperationQuery,
};
use ledger_core::domains::policy::{EconomicPolicy, DEFAULT_DONATION_RECIPIENT};
use ledger_core::kernel::test_dependencies::{
    MockEmailService, MockPushNotificationService, TestDependencies,
};
use ledger_core::kernel::{BaseClock, JwtAuthVerifier, MemoryStore, RetryPolicy, StatusHint};
use ledger_core::{Config, InviteRequest, LedgerEngine};

// ============================================================================
// Test Helpers
// ============================================================================

fn basic_income(value: &str) -> MintData {
    MintData::BasicIncome {
        amount: amount(value),
    }
}

fn referral_bonus(value: &str, invited_member_id: MemberId) -> MintData {
    MintData::ReferralBonus {
        amount: amount(value),
        invited_member_id,
    }
}

fn invited_bonus(value: &str) -> MintData {
    MintData::InvitedBonus {
        amount: amount(value),
    }
}

fn flagging_policy() -> EconomicPolicy {
    EconomicPolicy {
        flag_verification_threshold: 1,
        ..EconomicPolicy::default()
    }
}

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_backoff: std::time::Duration::from_millis(1),
        max_backoff: std::time::Duration::from_millis(2),
        ..RetryPolicy::default()
    }
}

// ============================================================================
// Membership
// ============================================================================

#[tokio::test]
async fn create_member_returns_created_and_records_operation() {
    let ledger = TestLedger::new().await;
    let id = MemberId::new();

    let outcome = ledger
        .engine
        .create_member(id, create_request("Ada Lovelace", None))
        .await
        .unwrap();

    assert_eq!(outcome.status_code(), 201);
    let op = outcome.operation().unwrap();
    assert_eq!(op.op_code(), OpCode::CreateMember);
    assert_eq!(op.creator_id, Some(id));

    let member = ledger.member(id);
    assert_eq!(member.username, "ada_lovelace");
    assert_eq!(member.verified_by_count, 0);
    assert!(!member.is_in_good_standing());
}

#[tokio::test]
async fn create_member_twice_is_rejected() {
    let ledger = TestLedger::new().await;
    let id = join(&ledger, "Ada", None).await;

    let err = ledger
        .engine
        .create_member(id, create_request("Ada Again", None))
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::MemberAlreadyExists(m) if m == id));
    assert_eq!(err.status_hint(), 409);
}

#[tokio::test]
async fn create_member_validates_input() {
    let ledger = TestLedger::new().await;

    let err = ledger
        .engine
        .create_member(MemberId::new(), create_request("   ", None))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::MissingParams(_)));

    let mut request = create_request("Ada", None);
    request.identity_video = MediaReference::new("not a url", "https://media.example.org/t.jpg");
    let err = ledger
        .engine
        .create_member(MemberId::new(), request)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidMedia(_)));
    assert_eq!(err.status_hint(), 400);

    // Only the system account exists
    assert_eq!(ledger.store.members().len(), 1);
    assert!(ledger.store.operations().is_empty());
}

#[tokio::test]
async fn create_member_with_unknown_invite_token_fails() {
    let ledger = TestLedger::new().await;

    let err = ledger
        .engine
        .create_member(MemberId::new(), create_request("Ada", Some("no-such-token")))
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::InvalidInviteToken));
    assert_eq!(err.status_hint(), 404);
}

#[tokio::test]
async fn create_member_with_invite_requests_verification_from_inviter() {
    let ledger = TestLedger::new().await;
    let founder = create_founder(&ledger, "Founder").await;
    ledger
        .engine
        .invite(founder, invite_request("welcome-1"))
        .await
        .unwrap();

    let id = MemberId::new();
    let outcome = ledger
        .engine
        .create_member(id, create_request("Newcomer", Some("  welcome-1 ")))
        .await
        .unwrap();

    assert_eq!(outcome.operations.len(), 2);
    assert_eq!(ledger.member(id).request_invite_from_member_id, Some(founder));

    let requests = ledger
        .engine
        .list_operations(&OperationQuery::op_code(OpCode::RequestVerification).targeting(founder))
        .await
        .unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].creator_id, Some(id));

    let push = ledger.push.clone();
    ledger.engine.shutdown().await;
    assert!(push.sent_to().contains(&founder));
    assert!(push.was_sent_with_title("Verification requested"));
}

#[tokio::test]
async fn edit_member_validates_and_applies() {
    let ledger = TestLedger::new().await;
    let founder = create_founder(&ledger, "Founder").await;

    let err = ledger
        .engine
        .edit_member(founder, EditMemberData::default())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::MissingParams(_)));

    let err = ledger
        .engine
        .edit_member(
            founder,
            EditMemberData {
                full_name: Some("  ".into()),
                ..EditMemberData::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::MissingParams(_)));

    let err = ledger
        .engine
        .edit_member(
            founder,
            EditMemberData {
                donation_rate: Some(Decimal::new(15, 1)),
                ..EditMemberData::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAmount(_)));

    let err = ledger
        .engine
        .edit_member(
            founder,
            EditMemberData {
                donation_to_member_id: Some(MemberId::new()),
                ..EditMemberData::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::MemberNotFound(_)));

    ledger
        .engine
        .edit_member(
            founder,
            EditMemberData {
                full_name: Some("Founding Member".into()),
                donation_rate: Some(Decimal::new(1, 1)),
                ..EditMemberData::default()
            },
        )
        .await
        .unwrap();

    let member = ledger.member(founder);
    assert_eq!(member.full_name, "Founding Member");
    assert_eq!(member.username, "founder");
    assert_eq!(member.donation_rate, Some(Decimal::new(1, 1)));
}

#[tokio::test]
async fn edit_member_requires_a_member_record() {
    let ledger = TestLedger::new().await;

    let err = ledger
        .engine
        .edit_member(
            MemberId::new(),
            EditMemberData {
                full_name: Some("Ghost".into()),
                ..EditMemberData::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::AbilityDenied(OpCode::EditMember)));
    assert_eq!(err.status_hint(), 403);
}

// ============================================================================
// Social
// ============================================================================

#[tokio::test]
async fn unverified_member_cannot_invite() {
    let ledger = TestLedger::new().await;
    let newcomer = join(&ledger, "Newcomer", None).await;

    let err = ledger
        .engine
        .invite(newcomer, invite_request("tok"))
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::AbilityDenied(OpCode::Invite)));
}

#[tokio::test]
async fn invite_token_can_only_be_used_once() {
    let ledger = TestLedger::new().await;
    let founder = create_founder(&ledger, "Founder").await;
    let other = verified_member(&ledger, founder, "Other").await;

    ledger
        .engine
        .invite(founder, invite_request("shared"))
        .await
        .unwrap();

    let err = ledger
        .engine
        .invite(other, invite_request("shared"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InviteTokenInUse));

    let err = ledger
        .engine
        .invite(founder, invite_request("   "))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::MissingParams(_)));
}

#[tokio::test]
async fn invite_with_email_sends_invitation() {
    let ledger = TestLedger::new().await;
    let founder = create_founder(&ledger, "Founder").await;

    ledger
        .engine
        .invite(
            founder,
            InviteRequest {
                invite_email: Some("friend@example.org".into()),
                ..invite_request("hello-friend")
            },
        )
        .await
        .unwrap();

    let email = ledger.email.clone();
    ledger.engine.shutdown().await;

    let sent = email.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "friend@example.org");
    assert!(sent[0].2.contains("hello-friend"));
}

#[tokio::test]
async fn verify_is_idempotent() {
    let ledger = TestLedger::new().await;
    let founder = create_founder(&ledger, "Founder").await;
    let newcomer = join(&ledger, "Newcomer", None).await;

    let first = ledger
        .engine
        .verify(founder, newcomer, test_video())
        .await
        .unwrap();
    assert_eq!(first.status, StatusHint::Created);

    let second = ledger
        .engine
        .verify(founder, newcomer, test_video())
        .await
        .unwrap();
    assert_eq!(second.status, StatusHint::Ok);
    assert_eq!(second.status_code(), 200);
    assert_eq!(
        first.operation().unwrap().id,
        second.operation().unwrap().id
    );

    assert_eq!(ledger.member(newcomer).verified_by_count, 1);
    let verifies = ledger
        .engine
        .list_operations(&OperationQuery::op_code(OpCode::Verify).created_by(founder))
        .await
        .unwrap();
    assert_eq!(verifies.len(), 1);
}

#[tokio::test]
async fn verify_self_is_rejected() {
    let ledger = TestLedger::new().await;
    let founder = create_founder(&ledger, "Founder").await;

    let err = ledger
        .engine
        .verify(founder, founder, test_video())
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::InvalidTarget(_)));
}

#[tokio::test]
async fn verify_by_inviter_confirms_invite() {
    let ledger = TestLedger::new().await;
    let founder = create_founder(&ledger, "Founder").await;
    let other = verified_member(&ledger, founder, "Other").await;

    ledger
        .engine
        .invite(founder, invite_request("tok"))
        .await
        .unwrap();
    let newcomer = join(&ledger, "Newcomer", Some("tok")).await;

    ledger
        .engine
        .verify(other, newcomer, test_video())
        .await
        .unwrap();
    assert!(!ledger.member(newcomer).invite_confirmed);

    ledger
        .engine
        .verify(founder, newcomer, test_video())
        .await
        .unwrap();
    let member = ledger.member(newcomer);
    assert!(member.invite_confirmed);
    assert_eq!(member.verified_by_count, 2);
}

#[tokio::test]
async fn trust_twice_is_rejected() {
    let ledger = TestLedger::new().await;
    let founder = create_founder(&ledger, "Founder").await;
    let other = verified_member(&ledger, founder, "Other").await;

    ledger.engine.trust(founder, other).await.unwrap();
    let err = ledger.engine.trust(founder, other).await.unwrap_err();

    assert!(matches!(err, LedgerError::AlreadyTrusted(m) if m == other));
    assert_eq!(err.status_hint(), 409);
}

#[tokio::test]
async fn flagging_requires_enough_verifications() {
    let ledger = TestLedger::new().await;
    let founder = create_founder(&ledger, "Founder").await;
    let other = verified_member(&ledger, founder, "Other").await;

    let err = ledger
        .engine
        .flag_member(founder, other, "spam")
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::AbilityDenied(OpCode::FlagMember)));
}

#[tokio::test]
async fn flag_blocks_member_until_resolved() {
    let deps = TestDependencies::new().policy(flagging_policy());
    let ledger = TestLedger::with(deps, RetryPolicy::default()).await;
    let founder = create_founder(&ledger, "Founder").await;
    let other = verified_member(&ledger, founder, "Other").await;

    let flag = ledger
        .engine
        .flag_member(founder, other, "duplicate account")
        .await
        .unwrap();
    let flag_id = flag.operation().unwrap().id;
    assert_eq!(ledger.member(other).flagging_operation_ids, vec![flag_id]);

    let pending = join(&ledger, "Pending", None).await;
    ledger.set_balance(other, amount("10.00"));
    ledger.clock.advance(Duration::days(7));

    let sorted_members = |ledger: &TestLedger| {
        let mut members = ledger.store.members();
        members.sort_by_key(|m| m.id);
        members
    };
    let operations_before = ledger.store.operations();
    let members_before = sorted_members(&ledger);

    let attempts = vec![
        (
            OpCode::Give,
            ledger
                .engine
                .give(other, founder, amount("1.00"), None)
                .await,
        ),
        (
            OpCode::Mint,
            ledger.engine.mint(other, basic_income("1.00")).await,
        ),
        (OpCode::Trust, ledger.engine.trust(other, founder).await),
        (
            OpCode::Verify,
            ledger.engine.verify(other, pending, test_video()).await,
        ),
        (
            OpCode::Invite,
            ledger
                .engine
                .invite(other, invite_request("while-flagged"))
                .await,
        ),
    ];
    for (op_code, result) in attempts {
        let err = result.unwrap_err();
        assert!(
            matches!(err, LedgerError::AbilityDenied(denied) if denied == op_code),
            "{op_code}: {err:?}"
        );
    }

    assert_eq!(ledger.store.operations(), operations_before);
    assert_eq!(sorted_members(&ledger), members_before);

    ledger
        .engine
        .resolve_flag(founder, other, flag_id, "talked it through")
        .await
        .unwrap();
    assert!(ledger.member(other).flagging_operation_ids.is_empty());

    ledger.engine.trust(other, founder).await.unwrap();
}

#[tokio::test]
async fn resolve_flag_checks_the_flag_operation() {
    let deps = TestDependencies::new().policy(flagging_policy());
    let ledger = TestLedger::with(deps, RetryPolicy::default()).await;
    let founder = create_founder(&ledger, "Founder").await;
    let other = verified_member(&ledger, founder, "Other").await;

    let err = ledger
        .engine
        .resolve_flag(founder, other, OperationId::new(), "nothing to resolve")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::OperationNotFound(_)));

    let trust = ledger.engine.trust(founder, other).await.unwrap();
    let trust_id = trust.operation().unwrap().id;
    let err = ledger
        .engine
        .resolve_flag(founder, other, trust_id, "not a flag")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidFlagOperation(id) if id == trust_id));
}

#[tokio::test]
async fn resolving_a_closed_flag_is_still_recorded() {
    let deps = TestDependencies::new().policy(flagging_policy());
    let ledger = TestLedger::with(deps, RetryPolicy::default()).await;
    let founder = create_founder(&ledger, "Founder").await;
    let other = verified_member(&ledger, founder, "Other").await;

    let flag_id = ledger
        .engine
        .flag_member(founder, other, "spam")
        .await
        .unwrap()
        .operation()
        .unwrap()
        .id;
    ledger
        .engine
        .resolve_flag(founder, other, flag_id, "first")
        .await
        .unwrap();
    ledger
        .engine
        .resolve_flag(founder, other, flag_id, "second")
        .await
        .unwrap();

    let resolutions = ledger
        .engine
        .list_operations(&OperationQuery::op_code(OpCode::ResolveFlagMember))
        .await
        .unwrap();
    assert_eq!(resolutions.len(), 2);
    assert!(ledger.member(other).is_in_good_standing());
}

// ============================================================================
// Minting
// ============================================================================

#[tokio::test]
async fn basic_income_accrues_linearly() {
    let ledger = TestLedger::new().await;
    let founder = create_founder(&ledger, "Founder").await;
    ledger.clock.advance(Duration::days(3));

    // 10.00 * 3/7 = 4.2857..., rounded down
    let err = ledger
        .engine
        .mint(founder, basic_income("4.29"))
        .await
        .unwrap_err();
    match err {
        LedgerError::AmountTooLarge { requested, max } => {
            assert_eq!(requested, amount("4.29"));
            assert_eq!(max, amount("4.28"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    ledger
        .engine
        .mint(founder, basic_income("4.28"))
        .await
        .unwrap();

    let member = ledger.member(founder);
    assert_eq!(member.balance, amount("4.28"));
    assert_eq!(member.last_minted_at, Some(ledger.clock.now()));

    // Accrual restarts at the mint
    let err = ledger
        .engine
        .mint(founder, basic_income("0.01"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AmountTooLarge { .. }));
}

#[tokio::test]
async fn basic_income_accrual_is_capped() {
    let ledger = TestLedger::new().await;
    let founder = create_founder(&ledger, "Founder").await;
    ledger.clock.advance(Duration::weeks(10));

    let err = ledger
        .engine
        .mint(founder, basic_income("40.01"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AmountTooLarge { max, .. } if max == amount("40.00")));

    ledger
        .engine
        .mint(founder, basic_income("40.00"))
        .await
        .unwrap();
    assert_eq!(ledger.balance(founder), amount("40.00"));
}

#[tokio::test]
async fn mint_rejects_amounts_that_round_to_zero() {
    let ledger = TestLedger::new().await;
    let founder = create_founder(&ledger, "Founder").await;
    ledger.clock.advance(Duration::days(7));

    let err = ledger
        .engine
        .mint(founder, basic_income("0.009"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAmount(_)));

    // Sub-cent digits are dropped, not rejected
    let outcome = ledger
        .engine
        .mint(founder, basic_income("1.239"))
        .await
        .unwrap();
    match &outcome.operation().unwrap().data {
        OperationData::Mint(mint) => assert_eq!(mint.amount(), amount("1.23")),
        other => panic!("unexpected operation: {other:?}"),
    }
    assert_eq!(ledger.balance(founder), amount("1.23"));
}

#[tokio::test]
async fn referral_and_invited_bonus_can_each_be_minted_once() {
    let ledger = TestLedger::new().await;
    let founder = create_founder(&ledger, "Founder").await;
    let newcomer = invited_member(&ledger, founder, "Newcomer", "tok-1").await;

    let err = ledger
        .engine
        .mint(founder, referral_bonus("60.01", newcomer))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AmountTooLarge { .. }));

    ledger
        .engine
        .mint(founder, referral_bonus("60.00", newcomer))
        .await
        .unwrap();
    let err = ledger
        .engine
        .mint(founder, referral_bonus("1.00", newcomer))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyMinted));

    ledger
        .engine
        .mint(newcomer, invited_bonus("60.00"))
        .await
        .unwrap();
    let err = ledger
        .engine
        .mint(newcomer, invited_bonus("60.00"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyMinted));

    assert_eq!(ledger.balance(founder), amount("60.00"));
    assert_eq!(ledger.balance(newcomer), amount("60.00"));

    let referrals = ledger
        .engine
        .list_operations(
            &OperationQuery::op_code(OpCode::Mint)
                .created_by(founder)
                .with_mint_type(MintType::ReferralBonus),
        )
        .await
        .unwrap();
    assert_eq!(referrals.len(), 1);
    assert_eq!(referrals[0].data.target_member_id(), Some(newcomer));
}

#[tokio::test]
async fn bonuses_need_a_confirmed_invite() {
    let ledger = TestLedger::new().await;
    let founder = create_founder(&ledger, "Founder").await;
    let other = verified_member(&ledger, founder, "Other").await;

    // Verified but never invited
    let err = ledger
        .engine
        .mint(founder, referral_bonus("10.00", other))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotEligible(_)));
    let err = ledger
        .engine
        .mint(other, invited_bonus("10.00"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotEligible(_)));

    // Invited by the founder, verified by someone else
    ledger
        .engine
        .invite(founder, invite_request("tok-2"))
        .await
        .unwrap();
    let newcomer = join(&ledger, "Newcomer", Some("tok-2")).await;
    ledger
        .engine
        .verify(other, newcomer, test_video())
        .await
        .unwrap();

    let err = ledger
        .engine
        .mint(founder, referral_bonus("10.00", newcomer))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotEligible(_)));

    // Someone else cannot claim the founder's referral
    let err = ledger
        .engine
        .mint(other, referral_bonus("10.00", newcomer))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotEligible(_)));

    let err = ledger
        .engine
        .mint(founder, referral_bonus("10.00", founder))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidTarget(_)));
}

#[tokio::test]
async fn bonus_amount_follows_policy_period_of_join_date() {
    let ledger = TestLedger::new().await;
    // Before the 2019-03-01 period the bonus was 20.00
    ledger.clock.set(
        "2018-06-01T00:00:00Z"
            .parse::<chrono::DateTime<chrono::Utc>>()
            .unwrap(),
    );
    let founder = create_founder(&ledger, "Founder").await;
    let newcomer = invited_member(&ledger, founder, "Newcomer", "early").await;

    ledger.clock.advance(Duration::days(365));

    let err = ledger
        .engine
        .mint(newcomer, invited_bonus("20.01"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AmountTooLarge { max, .. } if max == amount("20.00")));
}

// ============================================================================
// Giving
// ============================================================================

#[tokio::test]
async fn give_splits_default_donation() {
    let ledger = TestLedger::new().await;
    let founder = create_founder(&ledger, "Founder").await;
    let other = verified_member(&ledger, founder, "Other").await;
    ledger.set_balance(founder, amount("100.00"));

    let outcome = ledger
        .engine
        .give(founder, other, amount("10.00"), Some("lunch".into()))
        .await
        .unwrap();

    assert_eq!(ledger.balance(founder), amount("90.00"));
    assert_eq!(ledger.balance(other), amount("9.70"));
    assert_eq!(ledger.balance(DEFAULT_DONATION_RECIPIENT), amount("0.30"));

    match &outcome.operation().unwrap().data {
        OperationData::Give {
            to_member_id,
            amount: given,
            donation_to_member_id,
            donation_amount,
            memo,
        } => {
            assert_eq!(*to_member_id, other);
            assert_eq!(*given, amount("10.00"));
            assert_eq!(*donation_to_member_id, DEFAULT_DONATION_RECIPIENT);
            assert_eq!(*donation_amount, amount("0.30"));
            assert_eq!(memo.as_deref(), Some("lunch"));
        }
        other => panic!("unexpected operation: {other:?}"),
    }
}

#[tokio::test]
async fn give_uses_recipient_donation_settings() {
    let ledger = TestLedger::new().await;
    let founder = create_founder(&ledger, "Founder").await;
    let other = verified_member(&ledger, founder, "Other").await;
    let charity = verified_member(&ledger, founder, "Charity").await;
    ledger.set_balance(founder, amount("50.00"));

    ledger
        .engine
        .edit_member(
            other,
            EditMemberData {
                donation_rate: Some(Decimal::new(1, 1)),
                donation_to_member_id: Some(charity),
                ..EditMemberData::default()
            },
        )
        .await
        .unwrap();

    ledger
        .engine
        .give(founder, other, amount("10.00"), None)
        .await
        .unwrap();

    assert_eq!(ledger.balance(founder), amount("40.00"));
    assert_eq!(ledger.balance(other), amount("9.00"));
    assert_eq!(ledger.balance(charity), amount("1.00"));
    assert_eq!(ledger.balance(DEFAULT_DONATION_RECIPIENT), amount("0.00"));
}

#[tokio::test]
async fn give_with_insufficient_balance_changes_nothing() {
    let ledger = TestLedger::new().await;
    let founder = create_founder(&ledger, "Founder").await;
    let other = verified_member(&ledger, founder, "Other").await;
    ledger.set_balance(founder, amount("5.00"));
    let ops_before = ledger.store.operations().len();

    let err = ledger
        .engine
        .give(founder, other, amount("10.00"), None)
        .await
        .unwrap_err();

    match err {
        LedgerError::InsufficientBalance { balance, requested } => {
            assert_eq!(balance, amount("5.00"));
            assert_eq!(requested, amount("10.00"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(ledger.balance(founder), amount("5.00"));
    assert_eq!(ledger.balance(other), amount("0.00"));
    assert_eq!(ledger.store.operations().len(), ops_before);
}

#[tokio::test]
async fn give_rejects_bad_requests() {
    let ledger = TestLedger::new().await;
    let founder = create_founder(&ledger, "Founder").await;
    ledger.set_balance(founder, amount("5.00"));

    let err = ledger
        .engine
        .give(founder, founder, amount("1.00"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidTarget(_)));

    let err = ledger
        .engine
        .give(founder, MemberId::new(), amount("1.00"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::MemberNotFound(_)));

    let err = ledger
        .engine
        .give(founder, DEFAULT_DONATION_RECIPIENT, amount("-1.00"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAmount(_)));
}

#[tokio::test]
async fn unverified_member_cannot_give() {
    let ledger = TestLedger::new().await;
    let newcomer = join(&ledger, "Newcomer", None).await;
    ledger.set_balance(newcomer, amount("5.00"));

    let err = ledger
        .engine
        .give(newcomer, DEFAULT_DONATION_RECIPIENT, amount("1.00"), None)
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::AbilityDenied(OpCode::Give)));
    assert_eq!(ledger.balance(newcomer), amount("5.00"));
}

// ============================================================================
// Transactions
// ============================================================================

#[tokio::test]
async fn conflicts_are_retried_transparently() {
    let ledger = TestLedger::with_retry(fast_retry(5)).await;
    let founder = create_founder(&ledger, "Founder").await;
    let other = verified_member(&ledger, founder, "Other").await;
    ledger.set_balance(founder, amount("10.00"));
    let commits_before = ledger.store.commit_count();

    ledger.store.inject_conflicts(3);
    ledger
        .engine
        .give(founder, other, amount("1.00"), None)
        .await
        .unwrap();

    assert_eq!(ledger.store.commit_count(), commits_before + 1);
    assert_eq!(ledger.balance(founder), amount("9.00"));
}

#[tokio::test]
async fn exhausted_retries_fail_without_writing() {
    let ledger = TestLedger::with_retry(fast_retry(2)).await;
    let founder = create_founder(&ledger, "Founder").await;
    let other = verified_member(&ledger, founder, "Other").await;
    ledger.set_balance(founder, amount("10.00"));
    let ops_before = ledger.store.operations().len();

    ledger.store.inject_conflicts(5);
    let err = ledger
        .engine
        .give(founder, other, amount("1.00"), None)
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::TransactionFailed { attempts: 2 }));
    assert_eq!(err.status_hint(), 500);
    assert_eq!(ledger.balance(founder), amount("10.00"));
    assert_eq!(ledger.store.operations().len(), ops_before);
}

// ============================================================================
// Auth, notifications, audit
// ============================================================================

#[tokio::test]
async fn authenticate_accepts_valid_bearer_token() {
    let ledger = TestLedger::new().await;
    let member_id = MemberId::new();
    let token = ledger
        .auth
        .create_token(member_id, Duration::hours(1))
        .unwrap();

    let authenticated = ledger
        .engine
        .authenticate(&format!("Bearer {}", token))
        .await
        .unwrap();
    assert_eq!(authenticated, member_id);

    let err = ledger.engine.authenticate("Bearer garbage").await.unwrap_err();
    assert!(matches!(err, LedgerError::Unauthenticated(_)));
    assert_eq!(err.status_hint(), 401);
}

#[tokio::test]
async fn engine_starts_from_config() {
    let policy_path = std::env::temp_dir().join(format!("ledger-policy-{}.json", MemberId::new()));
    let fund = MemberId::new();
    let policy = EconomicPolicy {
        default_donation_recipient: fund,
        ..EconomicPolicy::default()
    };
    std::fs::write(&policy_path, serde_json::to_string(&policy).unwrap()).unwrap();

    let config = Config {
        database_url: "postgres://unused".into(),
        jwt_secret: Some("configured-secret".into()),
        jwt_issuer: "configured-issuer".into(),
        max_txn_attempts: 2,
        txn_timeout: std::time::Duration::from_secs(5),
        policy_path: Some(policy_path.clone()),
    };
    let store = MemoryStore::new();
    let engine = LedgerEngine::from_config(
        &config,
        Arc::new(store.clone()),
        Arc::new(MockPushNotificationService::new()),
        Arc::new(MockEmailService::new()),
    )
    .unwrap();
    std::fs::remove_file(&policy_path).unwrap();

    // Donation recipient comes from the policy file
    assert!(engine.ensure_system_accounts().await.unwrap());
    assert!(store.member(fund).is_some());
    assert!(store.member(DEFAULT_DONATION_RECIPIENT).is_none());

    // Two configured attempts, both lost to conflicts
    store.inject_conflicts(2);
    let err = engine
        .create_member(MemberId::new(), create_request("Ada", None))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::TransactionFailed { attempts: 2 }));

    let member_id = MemberId::new();
    let token = JwtAuthVerifier::new("configured-secret", "configured-issuer".into())
        .create_token(member_id, Duration::hours(1))
        .unwrap();
    assert_eq!(
        engine
            .authenticate(&format!("Bearer {}", token))
            .await
            .unwrap(),
        member_id
    );
    engine.shutdown().await;
}

#[tokio::test]
async fn payment_notifies_recipient_after_commit() {
    let ledger = TestLedger::new().await;
    let founder = create_founder(&ledger, "Founder").await;
    let other = verified_member(&ledger, founder, "Other").await;
    ledger.set_balance(founder, amount("10.00"));

    ledger
        .engine
        .give(founder, other, amount("2.00"), None)
        .await
        .unwrap();

    let push = ledger.push.clone();
    ledger.engine.shutdown().await;

    let payments: Vec<_> = push
        .sent_notifications()
        .into_iter()
        .filter(|(_, title, _)| title == "Payment received")
        .collect();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].0, other);
    assert!(payments[0].2.contains("1.94"));
}

#[tokio::test]
async fn failed_delivery_does_not_fail_the_operation() {
    let deps = TestDependencies::new().mock_push(MockPushNotificationService::failing());
    let ledger = TestLedger::with(deps, RetryPolicy::default()).await;
    let founder = create_founder(&ledger, "Founder").await;
    let other = verified_member(&ledger, founder, "Other").await;

    ledger.engine.trust(founder, other).await.unwrap();

    let push = ledger.push.clone();
    ledger.engine.shutdown().await;
    assert!(push.was_sent_with_title("New trust"));
}

#[tokio::test]
async fn audit_finds_no_drift_after_normal_use() {
    let ledger = TestLedger::new().await;
    let founder = create_founder(&ledger, "Founder").await;
    let other = verified_member(&ledger, founder, "Other").await;

    ledger.clock.advance(Duration::days(7));
    ledger
        .engine
        .mint(founder, basic_income("10.00"))
        .await
        .unwrap();
    ledger
        .engine
        .give(founder, other, amount("5.00"), None)
        .await
        .unwrap();
    ledger
        .engine
        .edit_member(
            other,
            EditMemberData {
                username: Some("other_one".into()),
                ..EditMemberData::default()
            },
        )
        .await
        .unwrap();
    let newcomer = invited_member(&ledger, founder, "Newcomer", "audit-tok").await;
    ledger
        .engine
        .mint(founder, referral_bonus("60.00", newcomer))
        .await
        .unwrap();
    ledger
        .engine
        .mint(newcomer, invited_bonus("60.00"))
        .await
        .unwrap();
    ledger.engine.trust(other, newcomer).await.unwrap();

    assert!(ledger.engine.audit().await.unwrap().is_empty());

    // Drift introduced outside the ledger shows up
    ledger.set_balance(other, amount("1000.00"));
    let mismatches = ledger.engine.audit().await.unwrap();
    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches[0].member_id, other);
    assert_eq!(
        mismatches[0].replayed.as_ref().unwrap().balance,
        amount("4.85")
    );
}

#[tokio::test]
async fn system_accounts_are_created_once() {
    let ledger = TestLedger::new().await;

    assert!(!ledger.engine.ensure_system_accounts().await.unwrap());
    let fund = ledger
        .engine
        .get_member(DEFAULT_DONATION_RECIPIENT)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fund.balance, amount("0.00"));
}
