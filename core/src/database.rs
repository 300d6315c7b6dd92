//! In-memory services database: accounts, nicknames, channels and online users

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

/// Well-known metadata keys
pub mod keys {
    pub const FREEZER: &str = "private:freeze:freezer";
    pub const VERIFY_KEY: &str = "private:verify:register:key";
    pub const VERIFY_TIMESTAMP: &str = "private:verify:register:timestamp";
    pub const LOGINFAIL_COUNT: &str = "private:loginfail:failnum";
    pub const LOGINFAIL_ADDR: &str = "private:loginfail:lastfailaddr";
    pub const LOGINFAIL_TIME: &str = "private:loginfail:lastfailtime";
    pub const STAFF_SETTER: &str = "private:staff:setter";
    pub const STAFF_TIMESTAMP: &str = "private:staff:timestamp";
}

/// A registered services account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Stable unique identifier
    pub uid: String,
    /// Account name
    pub name: String,
    /// Argon2 PHC string
    pub password_hash: String,
    pub email: String,
    pub registered: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
    /// Registration awaits verification
    pub waiting_verification: bool,
    /// Services operator class, if the account is a services operator
    pub oper_class: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl Account {
    /// Create a new account registered now
    pub fn new(name: impl Into<String>, password_hash: impl Into<String>, email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            uid: Uuid::new_v4().simple().to_string().to_uppercase(),
            name: name.into(),
            password_hash: password_hash.into(),
            email: email.into(),
            registered: now,
            last_login: now,
            waiting_verification: false,
            oper_class: None,
            metadata: HashMap::new(),
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.metadata.contains_key(keys::FREEZER)
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

/// A nickname owned by an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredNick {
    pub nick: String,
    /// Owning account name
    pub owner: String,
    pub registered: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl RegisteredNick {
    pub fn new(nick: impl Into<String>, owner: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            nick: nick.into(),
            owner: owner.into(),
            registered: now,
            last_seen: now,
        }
    }
}

/// A registered channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    pub founder: Option<String>,
    pub registered: DateTime<Utc>,
    pub metadata: HashMap<String, String>,
}

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            founder: None,
            registered: Utc::now(),
            metadata: HashMap::new(),
        }
    }
}

/// A user currently connected to IRC
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineUser {
    pub nick: String,
    /// Account the user is logged in to
    pub account: Option<String>,
}

/// Services operator class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperClass {
    pub name: String,
    /// Space-separated privilege list
    pub privs: String,
}

impl OperClass {
    pub fn has_priv(&self, privilege: &str) -> bool {
        self.privs.split_whitespace().any(|p| p == privilege)
    }
}

/// Entity that can carry metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityRef {
    Account(String),
    Channel(String),
}

/// Account and channel store consumed by services and transports.
///
/// Implementations serialize concurrent access themselves; callers never
/// hold anything across calls.
pub trait AccountStore: Send + Sync {
    fn find_account(&self, name: &str) -> Option<Account>;

    fn find_account_by_uid(&self, uid: &str) -> Option<Account>;

    /// Account by name, falling back to the owner of a registered nickname
    fn find_account_by_name_or_alias(&self, name: &str) -> Option<Account>;

    /// Add an account; fails with `Error::AlreadyExists` if the name is taken
    fn add_account(&self, account: Account) -> Result<()>;

    fn update_account(&self, name: &str, update: &mut dyn FnMut(&mut Account)) -> Result<()>;

    fn add_nick(&self, nick: RegisteredNick) -> Result<()>;

    fn find_nick(&self, nick: &str) -> Option<RegisteredNick>;

    fn find_channel(&self, name: &str) -> Option<Channel>;

    fn find_online_user(&self, nick: &str) -> Option<OnlineUser>;

    fn metadata_get(&self, entity: &EntityRef, key: &str) -> Option<String>;

    fn metadata_set(&self, entity: &EntityRef, key: &str, value: &str) -> Result<()>;

    fn metadata_delete(&self, entity: &EntityRef, key: &str) -> Result<()>;

    fn find_operclass(&self, name: &str) -> Option<OperClass>;
}

/// Serializable copy of persistent database state
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    pub accounts: Vec<Account>,
    pub nicks: Vec<RegisteredNick>,
    pub channels: Vec<Channel>,
    pub operclasses: Vec<OperClass>,
}

/// In-memory services database
#[derive(Debug, Default)]
pub struct Database {
    /// Accounts by lowercased name
    accounts: DashMap<String, Account>,
    /// Account name by UID
    accounts_by_uid: DashMap<String, String>,
    /// Registered nicknames by lowercased nick
    nicks: DashMap<String, RegisteredNick>,
    /// Channels by lowercased name
    channels: DashMap<String, Channel>,
    /// Online users by lowercased nick
    online_users: DashMap<String, OnlineUser>,
    /// Operator classes by name
    operclasses: DashMap<String, OperClass>,
}

impl Database {
    /// Create an empty database
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a database from a JSON snapshot
    pub fn load_snapshot<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let snapshot: DatabaseSnapshot = serde_json::from_str(&content)?;
        let db = Self::new();

        for account in snapshot.accounts {
            db.add_account(account)?;
        }
        for nick in snapshot.nicks {
            db.add_nick(nick)?;
        }
        for channel in snapshot.channels {
            db.add_channel(channel)?;
        }
        for class in snapshot.operclasses {
            db.add_operclass(class);
        }

        tracing::info!(
            "Loaded database snapshot from {:?}: {} accounts, {} channels",
            path.as_ref(),
            db.account_count(),
            db.channels.len()
        );
        Ok(db)
    }

    /// Write the persistent state to a JSON snapshot
    pub fn save_snapshot<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let snapshot = DatabaseSnapshot {
            accounts: self.accounts.iter().map(|e| e.value().clone()).collect(),
            nicks: self.nicks.iter().map(|e| e.value().clone()).collect(),
            channels: self.channels.iter().map(|e| e.value().clone()).collect(),
            operclasses: self.operclasses.iter().map(|e| e.value().clone()).collect(),
        };
        let content = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn add_channel(&self, channel: Channel) -> Result<()> {
        if !crate::utils::string::is_valid_channel_name(&channel.name) {
            return Err(format!("Invalid channel name: {}", channel.name).into());
        }
        let key = channel.name.to_lowercase();
        if self.channels.contains_key(&key) {
            return Err(Error::AlreadyExists(channel.name));
        }
        self.channels.insert(key, channel);
        Ok(())
    }

    pub fn add_online_user(&self, user: OnlineUser) {
        self.online_users.insert(user.nick.to_lowercase(), user);
    }

    pub fn add_operclass(&self, class: OperClass) {
        self.operclasses.insert(class.name.clone(), class);
    }

    /// Make an account a services operator of the given class
    pub fn set_oper_class(&self, account: &str, class: Option<String>) -> Result<()> {
        self.update_account(account, &mut |acct: &mut Account| acct.oper_class = class.clone())
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn nick_count(&self) -> usize {
        self.nicks.len()
    }

    fn with_metadata<R>(
        &self,
        entity: &EntityRef,
        f: impl FnOnce(&mut HashMap<String, String>) -> R,
    ) -> Result<R> {
        match entity {
            EntityRef::Account(name) => self
                .accounts
                .get_mut(&name.to_lowercase())
                .map(|mut acct| f(&mut acct.metadata))
                .ok_or_else(|| Error::NotFound(format!("account {}", name))),
            EntityRef::Channel(name) => self
                .channels
                .get_mut(&name.to_lowercase())
                .map(|mut chan| f(&mut chan.metadata))
                .ok_or_else(|| Error::NotFound(format!("channel {}", name))),
        }
    }
}

impl AccountStore for Database {
    fn find_account(&self, name: &str) -> Option<Account> {
        self.accounts
            .get(&name.to_lowercase())
            .map(|entry| entry.value().clone())
    }

    fn find_account_by_uid(&self, uid: &str) -> Option<Account> {
        let name = self.accounts_by_uid.get(uid)?.value().clone();
        self.find_account(&name)
    }

    fn find_account_by_name_or_alias(&self, name: &str) -> Option<Account> {
        self.find_account(name).or_else(|| {
            let owner = self.nicks.get(&name.to_lowercase())?.owner.clone();
            self.find_account(&owner)
        })
    }

    fn add_account(&self, account: Account) -> Result<()> {
        use dashmap::mapref::entry::Entry;

        match self.accounts.entry(account.name.to_lowercase()) {
            Entry::Occupied(_) => Err(Error::AlreadyExists(account.name)),
            Entry::Vacant(slot) => {
                self.accounts_by_uid.insert(account.uid.clone(), account.name.clone());
                slot.insert(account);
                Ok(())
            }
        }
    }

    fn update_account(&self, name: &str, update: &mut dyn FnMut(&mut Account)) -> Result<()> {
        let mut entry = self
            .accounts
            .get_mut(&name.to_lowercase())
            .ok_or_else(|| Error::NotFound(format!("account {}", name)))?;
        update(entry.value_mut());
        Ok(())
    }

    fn add_nick(&self, nick: RegisteredNick) -> Result<()> {
        use dashmap::mapref::entry::Entry;

        match self.nicks.entry(nick.nick.to_lowercase()) {
            Entry::Occupied(_) => Err(Error::AlreadyExists(nick.nick)),
            Entry::Vacant(slot) => {
                slot.insert(nick);
                Ok(())
            }
        }
    }

    fn find_nick(&self, nick: &str) -> Option<RegisteredNick> {
        self.nicks
            .get(&nick.to_lowercase())
            .map(|entry| entry.value().clone())
    }

    fn find_channel(&self, name: &str) -> Option<Channel> {
        self.channels
            .get(&name.to_lowercase())
            .map(|entry| entry.value().clone())
    }

    fn find_online_user(&self, nick: &str) -> Option<OnlineUser> {
        self.online_users
            .get(&nick.to_lowercase())
            .map(|entry| entry.value().clone())
    }

    fn metadata_get(&self, entity: &EntityRef, key: &str) -> Option<String> {
        self.with_metadata(entity, |md| md.get(key).cloned())
            .ok()
            .flatten()
    }

    fn metadata_set(&self, entity: &EntityRef, key: &str, value: &str) -> Result<()> {
        self.with_metadata(entity, |md| {
            md.insert(key.to_string(), value.to_string());
        })
    }

    fn metadata_delete(&self, entity: &EntityRef, key: &str) -> Result<()> {
        self.with_metadata(entity, |md| {
            md.remove(key);
        })
    }

    fn find_operclass(&self, name: &str) -> Option<OperClass> {
        self.operclasses.get(name).map(|entry| entry.value().clone())
    }
}
