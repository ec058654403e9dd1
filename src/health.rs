use crate::store::TokenLedger;
use anyhow::Result;

/// The gateway is healthy when the token ledger answers
pub async fn health_check(ledger: &dyn TokenLedger) -> Result<()> {
    ledger.health_check().await?;

    Ok(())
}
