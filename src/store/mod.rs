// ============================================================================
// Account & Token Storage
// ============================================================================
//
// Narrow persistence contracts consumed by the session service:
// - AccountStore: account lookup (and creation for the admin tool / seeding)
// - TokenLedger: issued tokens and their revocation state
//
// Implementations:
// - postgres: sqlx-backed, durable
// - memory: RwLock-backed, used when no database is configured and in tests
//
// ============================================================================

pub mod memory;
pub mod models;
pub mod postgres;

use anyhow::Result;

pub use memory::InMemoryStore;
pub use models::{Account, TokenRecord, TokenState, TOKEN_TYPE_BEARER};
pub use postgres::PostgresStore;

/// Read access to registered accounts
#[async_trait::async_trait]
pub trait AccountStore: Send + Sync {
    /// Find an account by its unique username
    async fn get_account_by_username(&self, username: &str) -> Result<Option<Account>>;

    /// Register a new account. `password_hash` must already be a bcrypt hash.
    async fn create_account(&self, username: &str, password_hash: &str, role: &str) -> Result<()>;
}

/// Server-side record of issued tokens
#[async_trait::async_trait]
pub trait TokenLedger: Send + Sync {
    /// Record a freshly issued token as ACTIVE and return the record id
    async fn insert_token(&self, username: &str, token: &str) -> Result<i64>;

    /// All records carrying exactly this token string, newest first
    async fn find_by_token(&self, token: &str) -> Result<Vec<TokenRecord>>;

    /// Set the state of every record matching (username, token).
    /// Returns the number of records touched.
    async fn update_state(&self, username: &str, token: &str, state: TokenState) -> Result<u64>;

    /// Cheap liveness probe for /health
    async fn health_check(&self) -> Result<()>;
}
