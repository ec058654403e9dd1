use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::routing::{RouteGroupSpec, RouteTable};

// ============================================================================
// Configuration Constants
// ============================================================================

/// External prefix every gateway route lives under
pub const GATEWAY_PREFIX: &str = "/api/v1";

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_JWT_ISSUER: &str = "cerberus";
// 1 hour validity window
const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 3600;
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;
const DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_MAX_REQUEST_BODY_BYTES: usize = 10 * 1024 * 1024; // 10 MB
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_DB_ACQUIRE_TIMEOUT_SECS: u64 = 5;

// ============================================================================
// Configuration Structures
// ============================================================================

#[derive(Clone, Debug)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub ttl_secs: i64,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct UpstreamConfig {
    /// Total time allowed for one upstream exchange (0 disables the limit)
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub max_request_body_bytes: usize,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// Log raw usernames instead of salted hashes
    pub enable_user_identifiers: bool,
    pub hash_salt: String,
}

/// Development-only account seeded into the in-memory store
#[derive(Clone, Debug, Deserialize)]
pub struct SeedAccount {
    #[serde(rename = "Username")]
    pub username: String,
    /// bcrypt hash, never a plaintext password
    #[serde(rename = "Password")]
    pub password_hash: String,
    #[serde(rename = "Role")]
    pub role: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub jwt: JwtConfig,
    pub database: Option<DatabaseConfig>,
    pub upstream: UpstreamConfig,
    pub logging: LoggingConfig,
    pub routes: RouteTable,
    pub seed_accounts: Vec<SeedAccount>,
}

// ============================================================================
// YAML properties file
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct Properties {
    #[serde(rename = "Server", default)]
    server: ServerProps,
    #[serde(rename = "DB")]
    db: Option<DbProps>,
    #[serde(rename = "JWT", default)]
    jwt: JwtProps,
    #[serde(rename = "Upstream", default)]
    upstream: UpstreamProps,
    #[serde(rename = "Accounts", default)]
    accounts: Vec<SeedAccount>,
    #[serde(rename = "APIs", default)]
    apis: Vec<RouteGroupSpec>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerProps {
    #[serde(rename = "Port")]
    port: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct DbProps {
    #[serde(rename = "Host")]
    host: String,
    #[serde(rename = "User")]
    user: String,
    #[serde(rename = "Password", default)]
    password: String,
    #[serde(rename = "Port", default = "default_db_port")]
    port: u16,
    #[serde(rename = "DBName")]
    db_name: String,
    #[serde(rename = "MaxConnections")]
    max_connections: Option<u32>,
}

fn default_db_port() -> u16 {
    5432
}

impl DbProps {
    fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.db_name
        )
    }
}

#[derive(Debug, Default, Deserialize)]
struct JwtProps {
    #[serde(rename = "Secret")]
    secret: Option<String>,
    #[serde(rename = "Issuer")]
    issuer: Option<String>,
    #[serde(rename = "TtlSecs")]
    ttl_secs: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct UpstreamProps {
    #[serde(rename = "TimeoutSecs")]
    timeout_secs: Option<u64>,
    #[serde(rename = "ConnectTimeoutSecs")]
    connect_timeout_secs: Option<u64>,
    #[serde(rename = "MaxBodyBytes")]
    max_body_bytes: Option<usize>,
}

/// Lookup used for overrides; `std::env::var` in production
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn env_parse<T: std::str::FromStr>(env: EnvLookup<'_>, name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env(name) {
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Invalid {}: {}", name, e)),
        None => Ok(None),
    }
}

impl Config {
    /// Load from a YAML properties file, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&contents)
    }

    /// Resolve the config path from the first CLI argument or CERBERUS_CONFIG
    pub fn from_env() -> Result<Self> {
        let path = std::env::args()
            .nth(1)
            .or_else(|| std::env::var("CERBERUS_CONFIG").ok())
            .context("No yaml file provided (pass it as the first argument or set CERBERUS_CONFIG)")?;
        Self::load(Path::new(&path))
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        Self::from_yaml_with_env(contents, &process_env)
    }

    /// Parse `contents` with overrides taken from `env` instead of the process
    pub fn from_yaml_with_env(contents: &str, env: EnvLookup<'_>) -> Result<Self> {
        let props: Properties =
            serde_yaml::from_str(contents).context("Failed to parse config yaml")?;
        Self::from_properties(props, env)
    }

    fn from_properties(props: Properties, env: EnvLookup<'_>) -> Result<Self> {
        let port = env_parse::<u16>(env, "PORT")?
            .or(props.server.port)
            .unwrap_or(DEFAULT_PORT);

        let jwt = JwtConfig {
            secret: env("JWT_SECRET")
                .or(props.jwt.secret)
                .unwrap_or_default(),
            issuer: env("JWT_ISSUER")
                .or(props.jwt.issuer)
                .unwrap_or_else(|| DEFAULT_JWT_ISSUER.to_string()),
            ttl_secs: env_parse::<i64>(env, "ACCESS_TOKEN_TTL_SECS")?
                .or(props.jwt.ttl_secs)
                .unwrap_or(DEFAULT_ACCESS_TOKEN_TTL_SECS),
        };
        if jwt.secret.trim().is_empty() {
            anyhow::bail!("No JWT secret configured. Set JWT.Secret in the config file or JWT_SECRET");
        }
        if jwt.ttl_secs <= 0 {
            anyhow::bail!("JWT.TtlSecs must be positive, got {}", jwt.ttl_secs);
        }

        let max_connections = props
            .db
            .as_ref()
            .and_then(|db| db.max_connections)
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
        let database_url = env("DATABASE_URL")
            .or_else(|| props.db.as_ref().map(DbProps::url));
        let database = database_url.map(|url| DatabaseConfig {
            url,
            max_connections,
            acquire_timeout_secs: DEFAULT_DB_ACQUIRE_TIMEOUT_SECS,
        });

        let upstream = UpstreamConfig {
            timeout_secs: env_parse::<u64>(env, "UPSTREAM_TIMEOUT_SECS")?
                .or(props.upstream.timeout_secs)
                .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECS),
            connect_timeout_secs: props
                .upstream
                .connect_timeout_secs
                .unwrap_or(DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS),
            max_request_body_bytes: props
                .upstream
                .max_body_bytes
                .unwrap_or(DEFAULT_MAX_REQUEST_BODY_BYTES),
        };

        let logging = LoggingConfig {
            enable_user_identifiers: env_parse::<bool>(env, "LOG_USER_IDENTIFIERS")?.unwrap_or(false),
            hash_salt: env("LOG_HASH_SALT")
                .filter(|salt| !salt.is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        };

        let routes = RouteTable::from_specs(props.apis).context("Invalid APIs section")?;

        Ok(Self {
            port,
            rust_log: env("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            jwt,
            database,
            upstream,
            logging,
            routes,
            seed_accounts: props.accounts,
        })
    }
}
