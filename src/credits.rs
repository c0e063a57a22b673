use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::CreditError;

pub const SIGNUP_BONUS: u32 = 3;
pub const ANONYMOUS_FREE_STORIES: u32 = 1;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserCredits {
    pub user_id: String,
    pub credits: u32,
    pub total_generated: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Purchase,
    Usage,
    Signup,
    Refund,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditTransaction {
    pub amount: i64,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

struct Account {
    credits: UserCredits,
    transactions: Vec<CreditTransaction>,
}

impl Account {
    fn open(user_id: &str) -> Self {
        let now = Utc::now();
        info!(user_id, bonus = SIGNUP_BONUS, "opening credit account");
        Self {
            credits: UserCredits {
                user_id: user_id.to_string(),
                credits: SIGNUP_BONUS,
                total_generated: 0,
                created_at: now,
                updated_at: now,
            },
            transactions: vec![CreditTransaction {
                amount: i64::from(SIGNUP_BONUS),
                kind: TransactionKind::Signup,
                description: "Welcome bonus - 3 free stories".to_string(),
                created_at: now,
            }],
        }
    }

    fn record(&mut self, amount: i64, kind: TransactionKind, description: &str) {
        let now = Utc::now();
        self.credits.updated_at = now;
        self.transactions.push(CreditTransaction {
            amount,
            kind,
            description: description.to_string(),
            created_at: now,
        });
    }
}

/// Per-user credit balances and anonymous usage, held in process memory.
///
/// Each account lives behind its DashMap shard lock, so a balance check and
/// the decrement that follows it cannot interleave with another request for
/// the same user.
#[derive(Default)]
pub struct CreditLedger {
    accounts: DashMap<String, Account>,
    anonymous: DashMap<String, u32>,
}

impl CreditLedger {
    pub fn new() -> Self {
        Self::default()
    }

    // Get or create; new users start with the signup bonus
    pub fn balance(&self, user_id: &str) -> UserCredits {
        self.accounts
            .entry(user_id.to_string())
            .or_insert_with(|| Account::open(user_id))
            .credits
            .clone()
    }

    pub fn try_deduct(&self, user_id: &str) -> Result<UserCredits, CreditError> {
        let mut account = self
            .accounts
            .entry(user_id.to_string())
            .or_insert_with(|| Account::open(user_id));

        if account.credits.credits == 0 {
            return Err(CreditError::Insufficient(user_id.to_string()));
        }

        account.credits.credits -= 1;
        account.credits.total_generated += 1;
        account.record(-1, TransactionKind::Usage, "Story generation");
        debug!(user_id, remaining = account.credits.credits, "deducted credit");
        Ok(account.credits.clone())
    }

    // Give back a credit taken for a generation that then failed
    pub fn refund(&self, user_id: &str) -> UserCredits {
        let mut account = self
            .accounts
            .entry(user_id.to_string())
            .or_insert_with(|| Account::open(user_id));
        account.credits.credits = account.credits.credits.saturating_add(1);
        account.credits.total_generated = account.credits.total_generated.saturating_sub(1);
        account.record(1, TransactionKind::Refund, "Generation failed");
        account.credits.clone()
    }

    // Top-ups arrive from a payment flow this service does not host
    #[cfg(test)]
    pub(crate) fn add(&self, user_id: &str, amount: u32, description: &str) -> UserCredits {
        let mut account = self
            .accounts
            .entry(user_id.to_string())
            .or_insert_with(|| Account::open(user_id));
        account.credits.credits = account.credits.credits.saturating_add(amount);
        account.record(i64::from(amount), TransactionKind::Purchase, description);
        account.credits.clone()
    }

    pub fn transactions(&self, user_id: &str) -> Vec<CreditTransaction> {
        self.accounts
            .get(user_id)
            .map(|account| account.transactions.clone())
            .unwrap_or_default()
    }

    /// Atomically claims a free story for `session_id`. Returns false when the
    /// session has already used its allowance.
    pub fn track_anonymous(&self, session_id: &str) -> bool {
        let mut used = self.anonymous.entry(session_id.to_string()).or_insert(0);
        if *used >= ANONYMOUS_FREE_STORIES {
            return false;
        }
        *used += 1;
        true
    }
}
