use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Token type tag stored with every ledger record
pub const TOKEN_TYPE_BEARER: &str = "TK";

/// Registered account, read-only from the gateway's point of view
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Account {
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle state of an issued token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenState {
    Active,
    Invalid,
}

impl TokenState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenState::Active => "ACTIVE",
            TokenState::Invalid => "INVALID",
        }
    }
}

impl fmt::Display for TokenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(TokenState::Active),
            "INVALID" => Ok(TokenState::Invalid),
            other => anyhow::bail!("unknown token state: {}", other),
        }
    }
}

/// One ledger row per issuance. Never deleted; revocation flips `state`.
#[derive(Debug, Clone)]
pub struct TokenRecord {
    pub id: i64,
    pub account_username: String,
    pub token_type: String,
    pub token: String,
    pub state: TokenState,
    pub created_at: DateTime<Utc>,
}

impl TokenRecord {
    pub fn is_active(&self) -> bool {
        self.state == TokenState::Active
    }
}
