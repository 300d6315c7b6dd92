//! Module system for loadable services transports

use crate::{Config, Result};
use async_trait::async_trait;
use std::collections::HashMap;

/// Module trait that all modules must implement
#[async_trait]
pub trait Module: Send + Sync {
    /// Module name
    fn name(&self) -> &str;

    /// Module version
    fn version(&self) -> &str;

    /// Module description
    fn description(&self) -> &str;

    /// Initialize the module
    async fn init(&mut self) -> Result<()>;

    /// Cleanup the module
    async fn cleanup(&mut self) -> Result<()>;

    /// Called after the configuration has been (re)loaded
    async fn config_ready(&mut self, _config: &Config) -> Result<()> {
        Ok(())
    }
}

/// Module manager for loading and managing modules
pub struct ModuleManager {
    modules: HashMap<String, Box<dyn Module>>,
}

impl ModuleManager {
    /// Create a new module manager
    pub fn new() -> Self {
        Self {
            modules: HashMap::new(),
        }
    }

    /// Load a module
    pub async fn load_module(&mut self, mut module: Box<dyn Module>) -> Result<()> {
        let name = module.name().to_string();
        if self.modules.contains_key(&name) {
            return Err(crate::Error::Module(format!("module {} is already loaded", name)));
        }

        module.init().await?;
        tracing::info!("Loaded module {} {}", name, module.version());
        self.modules.insert(name, module);

        Ok(())
    }

    /// Unload a module
    pub async fn unload_module(&mut self, name: &str) -> Result<()> {
        if let Some(mut module) = self.modules.remove(name) {
            module.cleanup().await?;
            tracing::info!("Unloaded module {}", name);
        }

        Ok(())
    }

    /// Get a module by name
    pub fn get_module(&self, name: &str) -> Option<&dyn Module> {
        self.modules.get(name).map(|m| m.as_ref())
    }

    /// Notify every module that the configuration is ready
    pub async fn config_ready(&mut self, config: &Config) -> Result<()> {
        for module in self.modules.values_mut() {
            module.config_ready(config).await?;
        }
        Ok(())
    }

    /// Get all loaded modules
    pub fn get_loaded_modules(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.modules.keys().map(|k| k.as_str()).collect();
        names.sort();
        names
    }

    /// Unload every module
    pub async fn unload_all(&mut self) -> Result<()> {
        let names: Vec<String> = self.modules.keys().cloned().collect();
        for name in names {
            self.unload_module(&name).await?;
        }
        Ok(())
    }
}

impl Default for ModuleManager {
    fn default() -> Self {
        Self::new()
    }
}
