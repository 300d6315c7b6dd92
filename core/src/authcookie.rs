//! Authcookies: bearer tickets that bind a remote caller to an account
//! between login and logout.

use crate::database::Account;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::{distributions::Alphanumeric, Rng};

const TICKET_LENGTH: usize = 20;

/// An issued authcookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthCookie {
    pub ticket: String,
    /// UID of the account the ticket was issued for
    pub account_uid: String,
    pub issued: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

impl AuthCookie {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires
    }
}

/// Authcookie store
pub trait AuthCookieStore: Send + Sync {
    /// Issue a new ticket for the account. The ticket validates as soon as
    /// this returns.
    fn create(&self, account: &Account) -> AuthCookie;

    /// Whether the ticket is live and was issued for this account
    fn validate(&self, ticket: &str, account: &Account) -> bool;

    fn find(&self, ticket: &str, account: &Account) -> Option<AuthCookie>;

    /// Destroy a ticket; returns whether it existed
    fn destroy(&self, ticket: &str) -> bool;
}

/// In-memory authcookie store with a fixed lifetime per ticket
#[derive(Debug)]
pub struct AuthCookieManager {
    cookies: DashMap<String, AuthCookie>,
    ttl: Duration,
}

impl AuthCookieManager {
    /// Create a store whose tickets live for `ttl_seconds`
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            cookies: DashMap::new(),
            ttl: Duration::seconds(ttl_seconds.min(i64::MAX as u64) as i64),
        }
    }

    fn generate_ticket() -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TICKET_LENGTH)
            .map(char::from)
            .collect()
    }

    /// Drop every expired ticket; returns how many were removed
    pub fn expire_stale(&self) -> usize {
        let now = Utc::now();
        let before = self.cookies.len();
        self.cookies.retain(|_, cookie| !cookie.is_expired(now));
        let removed = before.saturating_sub(self.cookies.len());
        if removed > 0 {
            tracing::debug!("Expired {} authcookies", removed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

impl Default for AuthCookieManager {
    fn default() -> Self {
        Self::new(3600) // 1 hour
    }
}

impl AuthCookieStore for AuthCookieManager {
    fn create(&self, account: &Account) -> AuthCookie {
        let issued = Utc::now();
        loop {
            let cookie = AuthCookie {
                ticket: Self::generate_ticket(),
                account_uid: account.uid.clone(),
                issued,
                expires: issued + self.ttl,
            };

            if let dashmap::mapref::entry::Entry::Vacant(slot) = self.cookies.entry(cookie.ticket.clone()) {
                slot.insert(cookie.clone());
                return cookie;
            }
        }
    }

    fn validate(&self, ticket: &str, account: &Account) -> bool {
        self.find(ticket, account).is_some()
    }

    fn find(&self, ticket: &str, account: &Account) -> Option<AuthCookie> {
        let cookie = self.cookies.get(ticket)?;
        if cookie.account_uid != account.uid || cookie.is_expired(Utc::now()) {
            return None;
        }
        Some(cookie.value().clone())
    }

    fn destroy(&self, ticket: &str) -> bool {
        self.cookies.remove(ticket).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_validates_only_for_its_account() {
        let store = AuthCookieManager::default();
        let alice = Account::new("alice", "*", "a@example.com");
        let bob = Account::new("bob", "*", "b@example.com");

        let cookie = store.create(&alice);
        assert_eq!(cookie.ticket.len(), TICKET_LENGTH);
        assert!(store.validate(&cookie.ticket, &alice));
        assert!(!store.validate(&cookie.ticket, &bob));
        assert!(!store.validate("not-a-ticket", &alice));
    }

    #[test]
    fn test_destroy() {
        let store = AuthCookieManager::default();
        let alice = Account::new("alice", "*", "a@example.com");
        let cookie = store.create(&alice);

        assert!(store.destroy(&cookie.ticket));
        assert!(!store.validate(&cookie.ticket, &alice));
        assert!(!store.destroy(&cookie.ticket));
    }

    #[test]
    fn test_expired_tickets_do_not_validate() {
        let store = AuthCookieManager::new(0);
        let alice = Account::new("alice", "*", "a@example.com");
        let cookie = store.create(&alice);

        assert!(!store.validate(&cookie.ticket, &alice));
        assert_eq!(store.expire_stale(), 1);
        assert!(store.is_empty());
    }
}
