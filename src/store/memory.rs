use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

use super::models::{Account, TokenRecord, TokenState, TOKEN_TYPE_BEARER};
use super::{AccountStore, TokenLedger};

/// In-memory implementation of both storage contracts.
///
/// Nothing survives a restart. Writes take the lock exclusively, so a
/// revocation is visible to every lookup that starts after it returns.
#[derive(Default)]
pub struct InMemoryStore {
    accounts: RwLock<HashMap<String, Account>>,
    tokens: RwLock<Vec<TokenRecord>>,
    next_id: AtomicI64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ledger records, regardless of state
    pub async fn token_count(&self) -> usize {
        self.tokens.read().await.len()
    }
}

#[async_trait::async_trait]
impl AccountStore for InMemoryStore {
    async fn get_account_by_username(&self, username: &str) -> Result<Option<Account>> {
        Ok(self.accounts.read().await.get(username).cloned())
    }

    async fn create_account(&self, username: &str, password_hash: &str, role: &str) -> Result<()> {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(username) {
            anyhow::bail!("account {} already exists", username);
        }
        accounts.insert(
            username.to_string(),
            Account {
                username: username.to_string(),
                password_hash: password_hash.to_string(),
                role: role.to_string(),
                created_at: Utc::now(),
            },
        );
        Ok(())
    }
}

#[async_trait::async_trait]
impl TokenLedger for InMemoryStore {
    async fn insert_token(&self, username: &str, token: &str) -> Result<i64> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.tokens.write().await.push(TokenRecord {
            id,
            account_username: username.to_string(),
            token_type: TOKEN_TYPE_BEARER.to_string(),
            token: token.to_string(),
            state: TokenState::Active,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn find_by_token(&self, token: &str) -> Result<Vec<TokenRecord>> {
        let tokens = self.tokens.read().await;
        Ok(tokens
            .iter()
            .rev()
            .filter(|record| record.token == token)
            .cloned()
            .collect())
    }

    async fn update_state(&self, username: &str, token: &str, state: TokenState) -> Result<u64> {
        let mut tokens = self.tokens.write().await;
        let mut touched = 0;
        for record in tokens
            .iter_mut()
            .filter(|r| r.account_username == username && r.token == token)
        {
            record.state = state;
            touched += 1;
        }
        Ok(touched)
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
