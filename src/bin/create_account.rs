// Account admin: creates a gateway account with a bcrypt-hashed password.
//
// With --hash-only nothing is written; the hash is printed for use in the
// `Accounts` seed list of a database-less configuration.
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use cerberus::config::Config;
use cerberus::db;
use cerberus::password::hash_password;
use cerberus::store::{AccountStore, PostgresStore};

#[derive(Parser, Debug)]
#[command(name = "cerberus-account")]
#[command(about = "Create a gateway account")]
struct Args {
    /// Gateway YAML configuration (its DB section names the account database)
    #[arg(long, env = "CERBERUS_CONFIG")]
    config: Option<PathBuf>,

    /// Account username
    #[arg(long)]
    username: String,

    /// Plaintext password, hashed before it leaves this process
    #[arg(long, env = "ACCOUNT_PASSWORD", hide_env_values = true)]
    password: String,

    /// Role tag injected as X-Auth-Role, e.g. USER or ADMIN
    #[arg(long, default_value = "USER")]
    role: String,

    /// Print the bcrypt hash instead of writing to the database
    #[arg(long)]
    hash_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if args.username.trim().is_empty() || args.role.trim().is_empty() {
        bail!("username and role must not be empty");
    }

    let password_hash = hash_password(&args.password)?;
    if args.hash_only {
        println!("{}", password_hash);
        return Ok(());
    }

    let config_path = args
        .config
        .context("--config (or CERBERUS_CONFIG) is required unless --hash-only is given")?;
    let config = Config::load(&config_path)?;
    let database = config
        .database
        .context("Configuration has no DB section and DATABASE_URL is not set")?;

    let pool = db::create_pool(&database).await?;
    db::migrate(&pool).await?;

    let store = PostgresStore::new(pool);
    store
        .create_account(&args.username, &password_hash, &args.role)
        .await
        .with_context(|| format!("Failed to create account {}", args.username))?;

    info!(role = %args.role, "Account {} created", args.username);
    Ok(())
}
