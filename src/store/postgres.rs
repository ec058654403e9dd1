use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use super::models::{Account, TokenRecord, TokenState, TOKEN_TYPE_BEARER};
use super::{AccountStore, TokenLedger};
use crate::db::DbPool;

/// PostgreSQL implementation of AccountStore and TokenLedger
pub struct PostgresStore {
    pool: DbPool,
}

impl PostgresStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AccountStore for PostgresStore {
    async fn get_account_by_username(&self, username: &str) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT username, password_hash, role, created_at
            FROM accounts
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up account")?;

        Ok(account)
    }

    async fn create_account(&self, username: &str, password_hash: &str, role: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (username, password_hash, role, created_at)
            VALUES ($1, $2, $3, NOW())
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(role)
        .execute(&self.pool)
        .await
        .context("Failed to create account")?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl TokenLedger for PostgresStore {
    async fn insert_token(&self, username: &str, token: &str) -> Result<i64> {
        let (id,) = sqlx::query_as::<_, (i64,)>(
            r#"
            INSERT INTO tokens (account_username, type, token, state, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING id
            "#,
        )
        .bind(username)
        .bind(TOKEN_TYPE_BEARER)
        .bind(token)
        .bind(TokenState::Active.as_str())
        .fetch_one(&self.pool)
        .await
        .context("Failed to save token")?;

        Ok(id)
    }

    async fn find_by_token(&self, token: &str) -> Result<Vec<TokenRecord>> {
        let rows = sqlx::query_as::<_, (i64, String, String, String, String, DateTime<Utc>)>(
            r#"
            SELECT id, account_username, type, token, state, created_at
            FROM tokens
            WHERE token = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(token)
        .fetch_all(&self.pool)
        .await
        .context("Failed to look up token")?;

        rows.into_iter()
            .map(|(id, account_username, token_type, token, state, created_at)| {
                Ok(TokenRecord {
                    id,
                    account_username,
                    token_type,
                    token,
                    state: state.parse()?,
                    created_at,
                })
            })
            .collect()
    }

    async fn update_state(&self, username: &str, token: &str, state: TokenState) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE tokens
            SET state = $1
            WHERE account_username = $2
            AND token = $3
            "#,
        )
        .bind(state.as_str())
        .bind(username)
        .bind(token)
        .execute(&self.pool)
        .await
        .context("Failed to update token state")?;

        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
