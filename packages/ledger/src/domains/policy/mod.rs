//! Economic policy - time-varying constants of the currency.
//!
//! Loaded once at startup and shared read-only. Constants live in dated
//! periods; the period in force at a given instant is the latest one whose
//! `effective_from` is not after it. Bonuses are resolved against the
//! relevant member's join date, so switching a bonus amount is just adding a
//! period with a new cutoff.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use crate::common::{Amount, MemberId};

/// Basic income accrues linearly against this.
pub const MILLISECONDS_PER_WEEK: i64 = 7 * 24 * 60 * 60 * 1000;

/// Account that receives donations when a member has not picked one.
pub const DEFAULT_DONATION_RECIPIENT: MemberId =
    MemberId::from_uuid(Uuid::from_u128(0x0000_0000_0000_7000_8000_0000_0000_0001));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyPeriod {
    pub effective_from: DateTime<Utc>,
    pub weekly_basic_income: Amount,
    /// Accrual stops growing after this many weeks without minting.
    #[serde(default)]
    pub max_accrual_weeks: Option<u32>,
    pub referral_bonus: Amount,
    pub invited_bonus: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EconomicPolicy {
    /// Sorted by `effective_from`, oldest first.
    pub periods: Vec<PolicyPeriod>,
    pub default_donation_rate: Decimal,
    pub default_donation_recipient: MemberId,
    /// Verifications needed before a member may flag or resolve flags.
    pub flag_verification_threshold: u32,
}

impl Default for EconomicPolicy {
    fn default() -> Self {
        Self {
            periods: vec![
                PolicyPeriod {
                    effective_from: Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap(),
                    weekly_basic_income: Amount::from(10),
                    max_accrual_weeks: Some(4),
                    referral_bonus: Amount::from(20),
                    invited_bonus: Amount::from(20),
                },
                PolicyPeriod {
                    effective_from: Utc.with_ymd_and_hms(2019, 3, 1, 0, 0, 0).unwrap(),
                    weekly_basic_income: Amount::from(10),
                    max_accrual_weeks: Some(4),
                    referral_bonus: Amount::from(60),
                    invited_bonus: Amount::from(60),
                },
            ],
            default_donation_rate: Decimal::new(3, 2),
            default_donation_recipient: DEFAULT_DONATION_RECIPIENT,
            flag_verification_threshold: 5,
        }
    }
}

impl EconomicPolicy {
    /// Load a policy from a JSON file, or fall back to the built-in default.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let policy = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read policy file {}", path.display()))?;
                let policy: EconomicPolicy = serde_json::from_str(&raw)
                    .with_context(|| format!("Invalid policy file {}", path.display()))?;
                info!(path = %path.display(), periods = policy.periods.len(), "Loaded economic policy");
                policy
            }
            None => {
                info!("Using built-in economic policy");
                Self::default()
            }
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<()> {
        if self.periods.is_empty() {
            bail!("Economic policy needs at least one period");
        }
        for pair in self.periods.windows(2) {
            if pair[0].effective_from >= pair[1].effective_from {
                bail!(
                    "Policy periods must be strictly ordered by effective_from ({} >= {})",
                    pair[0].effective_from,
                    pair[1].effective_from
                );
            }
        }
        for period in &self.periods {
            if period.weekly_basic_income.is_negative()
                || period.referral_bonus.is_negative()
                || period.invited_bonus.is_negative()
            {
                bail!("Policy amounts must not be negative ({})", period.effective_from);
            }
        }
        if self.default_donation_rate < Decimal::ZERO || self.default_donation_rate > Decimal::ONE {
            bail!("default_donation_rate must be between 0 and 1");
        }
        Ok(())
    }

    /// Period in force at `at`. Instants before the first period use it.
    pub fn period_at(&self, at: DateTime<Utc>) -> &PolicyPeriod {
        self.periods
            .iter()
            .rev()
            .find(|period| period.effective_from <= at)
            .unwrap_or(&self.periods[0])
    }

    /// Most a member may mint as basic income at `now` when accrual started
    /// at `since`. Rounded down to two places.
    pub fn max_basic_income(&self, since: DateTime<Utc>, now: DateTime<Utc>) -> Amount {
        let period = self.period_at(now);
        let week = Decimal::from(MILLISECONDS_PER_WEEK);

        let mut elapsed = Decimal::from((now - since).num_milliseconds().max(0));
        if let Some(weeks) = period.max_accrual_weeks {
            elapsed = elapsed.min(Decimal::from(weeks) * week);
        }

        Amount::from_decimal(period.weekly_basic_income.as_decimal() * elapsed / week).round_down()
    }

    /// Referral bonus for inviting a member who joined at `invited_created_at`.
    pub fn referral_bonus_for(&self, invited_created_at: DateTime<Utc>) -> Amount {
        self.period_at(invited_created_at).referral_bonus
    }

    /// One-time bonus for a member who joined at `member_created_at`.
    pub fn invited_bonus_for(&self, member_created_at: DateTime<Utc>) -> Amount {
        self.period_at(member_created_at).invited_bonus
    }
}
