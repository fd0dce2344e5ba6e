// 👛 Wallet Entity - Balance holder with enable/disable lifecycle
//
// Exactly one wallet per account. Balance is an integer in the smallest
// currency unit (no floats anywhere in balance arithmetic) and must never
// be observed below zero. A wallet starts Disabled with balance 0 and is
// invisible to reads and transfers until enabled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// WALLET STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletStatus {
    Disabled,
    Enabled,
}

impl WalletStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletStatus::Disabled => "disabled",
            WalletStatus::Enabled => "enabled",
        }
    }

    /// Parse the lowercase storage form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "disabled" => Some(WalletStatus::Disabled),
            "enabled" => Some(WalletStatus::Enabled),
            _ => None,
        }
    }
}

// ============================================================================
// WALLET ENTITY
// ============================================================================

/// Balance-bearing wallet owned by exactly one account.
///
/// `enabled_at` and `disabled_at` are mutually exclusive: once the wallet
/// has been toggled at least once, exactly one of them is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: Uuid,

    /// Owning account id (one wallet per account)
    pub owned_by: Uuid,

    /// Balance in the smallest currency unit, never negative
    pub balance: i64,

    pub status: WalletStatus,
    pub enabled_at: Option<DateTime<Utc>>,
    pub disabled_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Create a new wallet for an account: always Disabled, balance 0
    pub fn new(owned_by: Uuid) -> Self {
        let now = Utc::now();
        Wallet {
            id: Uuid::new_v4(),
            owned_by,
            balance: 0,
            status: WalletStatus::Disabled,
            enabled_at: None,
            disabled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.status == WalletStatus::Enabled
    }

    /// Mark enabled as of `now`; clears `disabled_at`
    pub fn mark_enabled(&mut self, now: DateTime<Utc>) {
        self.status = WalletStatus::Enabled;
        self.enabled_at = Some(now);
        self.disabled_at = None;
        self.updated_at = now;
    }

    /// Mark disabled as of `now`; clears `enabled_at`
    pub fn mark_disabled(&mut self, now: DateTime<Utc>) {
        self.status = WalletStatus::Disabled;
        self.enabled_at = None;
        self.disabled_at = Some(now);
        self.updated_at = now;
    }
}
