//! Services command framework
//!
//! Services (NickServ, ChanServ, ...) are bots that own a table of named
//! commands. Any transport can look a command up and run it with a
//! [`SourceInfo`] describing the caller.

use crate::source::SourceInfo;
use async_trait::async_trait;
use parking_lot::RwLock;
use rustsvc_core::{AccountStore, Error, FaultCode, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Command trait that all service commands must implement
#[async_trait]
pub trait Command: Send + Sync {
    /// Command name as typed by users (e.g. "STAFF")
    fn name(&self) -> &str;

    /// One-line description shown in HELP
    fn description(&self) -> &str;

    /// Privilege the caller needs, if any
    fn required_priv(&self) -> Option<&str> {
        None
    }

    /// Run the command. All output goes through `si`.
    async fn execute(&self, si: &mut SourceInfo<'_>, params: &[String]);
}

/// A service bot and its command table
pub struct ServiceBot {
    name: String,
    nick: String,
    commands: RwLock<HashMap<String, Arc<dyn Command>>>,
}

impl ServiceBot {
    pub fn new(name: impl Into<String>, nick: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nick: nick.into(),
            commands: RwLock::new(HashMap::new()),
        }
    }

    /// Internal service name (e.g. "nickserv")
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Nickname on IRC (e.g. "NickServ")
    pub fn nick(&self) -> &str {
        &self.nick
    }

    /// Bind a command; replaces an existing command of the same name
    pub fn bind_command(&self, command: Arc<dyn Command>) {
        let key = command.name().to_uppercase();
        tracing::debug!("Binding {} to {}", key, self.name);
        self.commands.write().insert(key, command);
    }

    pub fn unbind_command(&self, name: &str) -> bool {
        self.commands.write().remove(&name.to_uppercase()).is_some()
    }

    /// Case-insensitive command lookup
    pub fn find_command(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.read().get(&name.to_uppercase()).cloned()
    }

    pub fn has_commands(&self) -> bool {
        !self.commands.read().is_empty()
    }

    /// (name, description) of every bound command, sorted by name
    pub fn command_list(&self) -> Vec<(String, String)> {
        let mut list: Vec<_> = self
            .commands
            .read()
            .values()
            .map(|c| (c.name().to_string(), c.description().to_string()))
            .collect();
        list.sort();
        list
    }
}

impl std::fmt::Debug for ServiceBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceBot")
            .field("name", &self.name)
            .field("nick", &self.nick)
            .field("commands", &self.commands.read().len())
            .finish()
    }
}

/// Registry of live services
pub struct ServiceManager {
    services: RwLock<HashMap<String, Arc<ServiceBot>>>,
    store: Arc<dyn AccountStore>,
}

impl ServiceManager {
    /// Create a new service manager
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self {
            services: RwLock::new(HashMap::new()),
            store,
        }
    }

    /// Add a service
    pub fn add_service(&self, service: Arc<ServiceBot>) -> Result<()> {
        let key = service.name().to_lowercase();
        let mut services = self.services.write();

        if services.contains_key(&key) {
            return Err(Error::AlreadyExists(format!("service {}", service.name())));
        }

        tracing::info!("Added service {} ({})", service.name(), service.nick());
        services.insert(key, service);
        Ok(())
    }

    /// Service by internal name
    pub fn find_service(&self, name: &str) -> Option<Arc<ServiceBot>> {
        self.services.read().get(&name.to_lowercase()).cloned()
    }

    /// Service by its IRC nickname
    pub fn find_service_by_nick(&self, nick: &str) -> Option<Arc<ServiceBot>> {
        self.services
            .read()
            .values()
            .find(|s| s.nick().eq_ignore_ascii_case(nick))
            .cloned()
    }

    /// Bind a command to a named service
    pub fn bind_command(&self, service: &str, command: Arc<dyn Command>) -> Result<()> {
        let service = self
            .find_service(service)
            .ok_or_else(|| Error::NotFound(format!("service {}", service)))?;
        service.bind_command(command);
        Ok(())
    }

    /// Names of all loaded services
    pub fn loaded_services(&self) -> Vec<String> {
        let mut names: Vec<_> = self.services.read().values().map(|s| s.name().to_string()).collect();
        names.sort();
        names
    }

    /// Whether the caller holds a services privilege
    pub fn has_priv(&self, si: &SourceInfo<'_>, privilege: &str) -> bool {
        si.account
            .as_ref()
            .and_then(|account| account.oper_class.as_deref())
            .and_then(|class| self.store.find_operclass(class))
            .is_some_and(|class| class.has_priv(privilege))
    }

    /// Run a command after checking the caller's privileges
    pub async fn invoke(&self, si: &mut SourceInfo<'_>, command: &dyn Command, params: &[String]) {
        if let Some(privilege) = command.required_priv() {
            if !self.has_priv(si, privilege) {
                tracing::warn!(
                    "{} denied {}: missing privilege {}",
                    si.oper_name(),
                    command.name(),
                    privilege
                );
                si.fail(
                    FaultCode::NoPrivs,
                    &format!("You do not have the {} privilege.", privilege),
                );
                return;
            }
        }

        command.execute(si, params).await;
    }
}
