//! Accounts, salted password hashing, and bearer-token sessions.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Iterations of the salted digest. Slows brute force without an external KDF
/// dependency.
const HASH_ROUNDS: u32 = 4096;

/// Access level attached to an account and its tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full control, including user management.
    Admin,
    /// May edit system state and inventory.
    Member,
    /// Read-only monitoring.
    Guest,
}

impl Role {
    /// Whether this role may mutate state and inventory.
    pub fn can_operate(&self) -> bool {
        matches!(self, Role::Admin | Role::Member)
    }
}

/// Salted, iterated SHA-256 password digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordHash {
    salt: String,
    digest: String,
}

impl PasswordHash {
    /// Hashes a password under a fresh random salt.
    pub fn new(password: &str) -> Self {
        let mut salt_bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut salt_bytes);
        let salt = hex::encode(salt_bytes);
        let digest = digest_password(&salt, password);
        Self { salt, digest }
    }

    /// Constant-shape verification against a candidate password.
    pub fn verify(&self, password: &str) -> bool {
        digest_password(&self.salt, password) == self.digest
    }
}

fn digest_password(salt: &str, password: &str) -> String {
    let mut bytes = {
        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(password.as_bytes());
        hasher.finalize()
    };
    for _ in 1..HASH_ROUNDS {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        bytes = hasher.finalize();
    }
    hex::encode(bytes)
}

/// A dashboard account. The password hash never leaves the store; API
/// responses use [`crate::api::types::UserInfo`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub email: Option<String>,
    pub password: PasswordHash,
    pub role: Role,
    pub name: String,
    pub assigned_unit_id: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct Session {
    user_id: u64,
    expires_at: DateTime<Utc>,
}

/// In-memory bearer-token sessions with a fixed TTL.
///
/// Tokens are opaque 32-byte random secrets, hex encoded. Sessions are not
/// persisted; a restart logs everyone out.
#[derive(Debug)]
pub struct TokenStore {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
}

impl TokenStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Issues a fresh token for the user.
    pub fn issue(&self, user_id: u64) -> String {
        let mut secret = [0u8; 32];
        rand::rng().fill_bytes(&mut secret);
        let token = hex::encode(secret);
        self.sessions.write().insert(
            token.clone(),
            Session {
                user_id,
                expires_at: Utc::now() + self.ttl,
            },
        );
        token
    }

    /// Resolves a token to its user id, dropping it when expired.
    pub fn resolve(&self, token: &str) -> Option<u64> {
        let mut sessions = self.sessions.write();
        match sessions.get(token) {
            Some(session) if session.expires_at > Utc::now() => Some(session.user_id),
            Some(_) => {
                sessions.remove(token);
                None
            }
            None => None,
        }
    }

    /// Revokes a token. Returns whether it existed.
    pub fn revoke(&self, token: &str) -> bool {
        self.sessions.write().remove(token).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip() {
        let hash = PasswordHash::new("hunter2");
        assert!(hash.verify("hunter2"));
        assert!(!hash.verify("hunter3"));
        assert!(!hash.verify(""));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = PasswordHash::new("secret");
        let b = PasswordHash::new("secret");
        assert_ne!(a, b);
        assert!(a.verify("secret") && b.verify("secret"));
    }

    #[test]
    fn issue_resolve_revoke() {
        let store = TokenStore::new(Duration::hours(24));
        let token = store.issue(7);
        assert_eq!(store.resolve(&token), Some(7));
        assert!(store.revoke(&token));
        assert_eq!(store.resolve(&token), None);
        assert!(!store.revoke(&token));
    }

    #[test]
    fn expired_tokens_do_not_resolve() {
        let store = TokenStore::new(Duration::seconds(-1));
        let token = store.issue(3);
        assert_eq!(store.resolve(&token), None);
    }

    #[test]
    fn unknown_tokens_do_not_resolve() {
        let store = TokenStore::new(Duration::hours(1));
        store.issue(1);
        assert_eq!(store.resolve("deadbeef"), None);
    }

    #[test]
    fn role_operate_policy() {
        assert!(Role::Admin.can_operate());
        assert!(Role::Member.can_operate());
        assert!(!Role::Guest.can_operate());
    }
}
