// ============================================================================
// Auth Session Service
// ============================================================================
//
// Token lifecycle on top of the signed-token codec and the ledger:
// - issue: credential check -> sign -> ledger insert (ACTIVE)
// - revoke: ledger lookup -> verify -> ledger update (INVALID)
// - authenticate: ledger state -> signature/expiry -> sub/aud claims
//
// A token only carries authority while its ledger record is ACTIVE. The
// ledger is consulted before the signature so a revoked token is refused
// even though it still verifies.
//
// ============================================================================

use std::sync::Arc;

use crate::auth::{IssuedToken, TokenCodec, TokenError};
use crate::config::LoggingConfig;
use crate::password::{verify_dummy, verify_password};
use crate::store::{AccountStore, TokenLedger, TokenState};
use crate::utils::loggable_user;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("account not found")]
    AccountNotFound,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("no bearer token supplied")]
    MissingCredential,

    /// Revocation target was never issued by this gateway
    #[error("token not found in ledger")]
    TokenNotFound,

    /// Presented for authorization but never issued by this gateway
    #[error("token not recognised")]
    UnrecognizedToken,

    #[error("token has been revoked")]
    TokenRevoked,

    #[error("invalid token: {0}")]
    InvalidToken(#[source] TokenError),

    #[error("failed to sign token: {0}")]
    Signing(#[source] TokenError),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Caller identity established from a bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub role: String,
}

pub struct AuthSessionService {
    accounts: Arc<dyn AccountStore>,
    ledger: Arc<dyn TokenLedger>,
    codec: Arc<TokenCodec>,
    logging: LoggingConfig,
}

impl AuthSessionService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        ledger: Arc<dyn TokenLedger>,
        codec: Arc<TokenCodec>,
        logging: LoggingConfig,
    ) -> Self {
        Self {
            accounts,
            ledger,
            codec,
            logging,
        }
    }

    pub fn ledger(&self) -> &Arc<dyn TokenLedger> {
        &self.ledger
    }

    /// Exchange username/password for a new ACTIVE token.
    ///
    /// Earlier tokens of the same account stay valid.
    pub async fn issue(&self, username: &str, password: &str) -> Result<IssuedToken, SessionError> {
        let user = loggable_user(username, &self.logging);
        let account = self.accounts.get_account_by_username(username).await?;
        let supplied = password.to_string();

        let Some(account) = account else {
            // Same bcrypt cost as a real mismatch
            tokio::task::spawn_blocking(move || verify_dummy(&supplied))
                .await
                .map_err(|e| anyhow::anyhow!("password check task failed: {}", e))?;
            tracing::warn!(user = %user, "Token requested for unknown account");
            return Err(SessionError::AccountNotFound);
        };

        let stored_hash = account.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || {
            verify_password(&supplied, &stored_hash)
        })
        .await
        .map_err(|e| anyhow::anyhow!("password check task failed: {}", e))??;

        if !matches {
            tracing::warn!(user = %user, "Wrong password");
            return Err(SessionError::InvalidCredentials);
        }

        let issued = self
            .codec
            .issue(&account.username, &account.role)
            .map_err(SessionError::Signing)?;
        let record_id = self
            .ledger
            .insert_token(&account.username, &issued.token)
            .await?;

        tracing::info!(
            user = %user,
            role = %account.role,
            record_id = record_id,
            expires_at = issued.expires_at,
            "Token issued"
        );
        Ok(issued)
    }

    /// Mark a previously issued token INVALID.
    ///
    /// Revoking a token that is already INVALID succeeds and changes nothing.
    pub async fn revoke(&self, raw_token: Option<&str>) -> Result<(), SessionError> {
        let token = raw_token
            .filter(|t| !t.is_empty())
            .ok_or(SessionError::MissingCredential)?;

        let records = self.ledger.find_by_token(token).await?;
        if records.is_empty() {
            return Err(SessionError::TokenNotFound);
        }

        let claims = self.codec.verify(token).map_err(SessionError::InvalidToken)?;
        let subject = claims.subject().map_err(SessionError::InvalidToken)?;
        let user = loggable_user(subject, &self.logging);

        if records.iter().all(|r| !r.is_active()) {
            tracing::debug!(user = %user, "Token already revoked");
        }

        let touched = self
            .ledger
            .update_state(subject, token, TokenState::Invalid)
            .await?;
        if touched == 0 {
            // Ledger holds the string under a different owner than `sub`
            tracing::warn!(user = %user, "Token subject does not own any ledger record");
            return Err(SessionError::TokenNotFound);
        }

        tracing::info!(user = %user, records = touched, "Token revoked");
        Ok(())
    }

    /// Establish the caller's identity from a bearer token.
    ///
    /// Order matters: ledger state, then signature and expiry, then claims.
    pub async fn authenticate(&self, token: &str) -> Result<Identity, SessionError> {
        let records = self.ledger.find_by_token(token).await?;
        if records.is_empty() {
            return Err(SessionError::UnrecognizedToken);
        }
        if records.iter().any(|r| !r.is_active()) {
            return Err(SessionError::TokenRevoked);
        }

        let claims = self.codec.verify(token).map_err(SessionError::InvalidToken)?;
        let username = claims.subject().map_err(SessionError::InvalidToken)?;
        let role = claims.role().map_err(SessionError::InvalidToken)?;

        Ok(Identity {
            username: username.to_string(),
            role: role.to_string(),
        })
    }
}
