//! Configuration management

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Services configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server information
    pub server: ServerConfig,
    /// XML-RPC transport settings
    pub xmlrpc: XmlRpcConfig,
    /// NickServ settings
    pub nickserv: NickServConfig,
    /// Authcookie settings
    pub authcookie: AuthCookieConfig,
    /// Database settings
    pub database: DatabaseConfig,
    /// Audit log settings
    pub audit: AuditConfig,
    /// Service bots
    pub services: Vec<ServiceBotConfig>,
    /// Services operator classes
    pub operclasses: Vec<OperClassConfig>,
    /// Services operators
    pub sopers: Vec<SoperConfig>,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Services server name
    pub name: String,
    /// Server description
    pub description: String,
    /// Network name
    pub network: String,
}

/// XML-RPC transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct XmlRpcConfig {
    /// Whether the XML-RPC module is loaded
    pub enabled: bool,
    /// HTTP path the gateway is routed under
    pub path: String,
}

/// NickServ configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NickServConfig {
    /// Accounts are not tied to nicknames
    pub no_nick_ownership: bool,
    /// Maximum account name length
    pub max_account_length: usize,
}

/// Authcookie configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthCookieConfig {
    /// Ticket lifetime in seconds
    pub timeout_seconds: u64,
}

/// Database configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// JSON snapshot file; in-memory only when unset
    pub snapshot_path: Option<String>,
}

/// Audit log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
    /// Minimum level for audit events (0 = all, 1 = info+, 2 = warn+)
    pub min_level: u8,
}

/// A service bot (NickServ, ChanServ, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceBotConfig {
    /// Internal service name (e.g. "nickserv")
    pub name: String,
    /// Nickname the service uses on IRC (e.g. "NickServ")
    pub nick: String,
}

/// Services operator class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperClassConfig {
    pub name: String,
    /// Privileges granted by this class
    pub privs: Vec<String>,
}

/// Services operator assignment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoperConfig {
    pub account: String,
    pub operclass: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "services.example.org".to_string(),
            description: "IRC Services".to_string(),
            network: "ExampleNet".to_string(),
        }
    }
}

impl Default for XmlRpcConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/xmlrpc".to_string(),
        }
    }
}

impl Default for NickServConfig {
    fn default() -> Self {
        Self {
            no_nick_ownership: false,
            max_account_length: 31,
        }
    }
}

impl Default for AuthCookieConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 3600,
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_level: 0,
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| Error::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.name.is_empty() {
            return Err(Error::Config("Server name cannot be empty".to_string()));
        }

        if !self.xmlrpc.path.starts_with('/') {
            return Err(Error::Config(format!(
                "XML-RPC path must start with '/': {}",
                self.xmlrpc.path
            )));
        }

        if self.nickserv.max_account_length == 0 {
            return Err(Error::Config("Max account length must be greater than 0".to_string()));
        }

        if self.authcookie.timeout_seconds == 0 {
            return Err(Error::Config("Authcookie timeout must be greater than 0".to_string()));
        }

        let mut seen_services = HashSet::new();
        for service in &self.services {
            if service.name.is_empty() || service.nick.is_empty() {
                return Err(Error::Config("Service name and nick cannot be empty".to_string()));
            }
            if !seen_services.insert(service.name.to_lowercase()) {
                return Err(Error::Config(format!("Duplicate service {} in configuration", service.name)));
            }
        }

        let classes: HashSet<&str> = self.operclasses.iter().map(|c| c.name.as_str()).collect();
        for soper in &self.sopers {
            if !classes.contains(soper.operclass.as_str()) {
                return Err(Error::Config(format!(
                    "Services operator {} uses unknown operclass {}",
                    soper.account, soper.operclass
                )));
            }
        }

        Ok(())
    }

    /// Nickname of a configured service, if any
    pub fn service_nick(&self, name: &str) -> Option<&str> {
        self.services
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .map(|s| s.nick.as_str())
    }
}
