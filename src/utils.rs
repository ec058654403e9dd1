use sha2::{Digest, Sha256};

use crate::config::LoggingConfig;

/// Creates a truncated, salted hash of an identifier for safe logging.
///
/// # Arguments
/// * `id` - The identifier to hash (e.g., username).
/// * `salt` - A salt value from the application's configuration.
///
/// # Returns
/// A short, hexadecimal string representing the salted hash.
pub fn log_safe_id(id: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(id.as_bytes());
    let hash = hasher.finalize();

    hash[..4]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<String>()
}

/// Username as it should appear in logs under the current logging policy
pub fn loggable_user(username: &str, logging: &LoggingConfig) -> String {
    if logging.enable_user_identifiers {
        username.to_string()
    } else {
        log_safe_id(username, &logging.hash_salt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_safe_id_is_stable_and_salted() {
        assert_eq!(log_safe_id("alice", "salt"), log_safe_id("alice", "salt"));
        assert_ne!(log_safe_id("alice", "salt"), log_safe_id("alice", "pepper"));
        assert_eq!(log_safe_id("alice", "salt").len(), 8);
    }

    #[test]
    fn test_loggable_user_respects_policy() {
        let mut logging = LoggingConfig {
            enable_user_identifiers: false,
            hash_salt: "salt".to_string(),
        };
        assert_ne!(loggable_user("alice", &logging), "alice");

        logging.enable_user_identifiers = true;
        assert_eq!(loggable_user("alice", &logging), "alice");
    }
}
