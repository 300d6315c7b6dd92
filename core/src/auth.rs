//! Password checks and the failed-login side channel

use crate::database::{keys, Account, AccountStore, EntityRef};
use crate::password;
use std::sync::Arc;

/// Notified whenever a password check fails for an existing account.
///
/// The hook fires even though the request that triggered it is rejected,
/// so lockout and notification policies see every attempt.
pub trait FailedLoginHook: Send + Sync {
    fn bad_password(&self, account: &Account, source: &str);
}

/// Verify a plaintext password against an account's stored credential
pub fn verify_account_password(account: &Account, password: &str) -> bool {
    password::verify_password(password, &account.password_hash)
}

/// Records failed logins as account metadata
/// (`private:loginfail:failnum`, `lastfailaddr`, `lastfailtime`)
pub struct LoginFailureRecorder {
    store: Arc<dyn AccountStore>,
}

impl LoginFailureRecorder {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }
}

impl FailedLoginHook for LoginFailureRecorder {
    fn bad_password(&self, account: &Account, source: &str) {
        let count = account
            .metadata(keys::LOGINFAIL_COUNT)
            .and_then(|n| n.parse::<u32>().ok())
            .unwrap_or(0)
            .saturating_add(1);
        let entity = EntityRef::Account(account.name.clone());
        let now = crate::utils::time::current_unix_timestamp().to_string();

        let recorded = self
            .store
            .metadata_set(&entity, keys::LOGINFAIL_COUNT, &count.to_string())
            .and_then(|_| self.store.metadata_set(&entity, keys::LOGINFAIL_ADDR, source))
            .and_then(|_| self.store.metadata_set(&entity, keys::LOGINFAIL_TIME, &now));

        if let Err(e) = recorded {
            tracing::error!("Failed to record bad password for {}: {}", account.name, e);
            return;
        }

        tracing::warn!(
            account = %account.name,
            source = %source,
            failures = count,
            "Failed login attempt"
        );
    }
}
