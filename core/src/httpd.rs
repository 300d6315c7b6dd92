//! HTTP path routing table
//!
//! The HTTP listener owns framing and dispatches each request to the handler
//! registered for its path. Handlers are keyed by name, so registering the
//! same handler twice never produces a second route.

use parking_lot::RwLock;
use std::sync::Arc;

/// A routing entry
pub struct PathEntry<H: ?Sized> {
    /// Handler name (e.g. "xmlrpc")
    pub name: String,
    pub path: String,
    pub handler: Arc<H>,
}

/// Path routing table shared between the listener and transport modules
pub struct PathTable<H: ?Sized> {
    entries: RwLock<Vec<PathEntry<H>>>,
}

impl<H: ?Sized> PathTable<H> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Register a handler under `path`.
    ///
    /// Returns `true` if a new route was added. If a handler with this name is
    /// already registered its path is updated in place and `false` is
    /// returned.
    pub fn register(&self, name: &str, path: &str, handler: Arc<H>) -> bool {
        let mut entries = self.entries.write();

        if let Some(existing) = entries.iter_mut().find(|e| e.name == name) {
            if existing.path != path {
                tracing::info!("Moving HTTP handler {} from {} to {}", name, existing.path, path);
                existing.path = path.to_string();
            }
            existing.handler = handler;
            return false;
        }

        tracing::info!("Registered HTTP handler {} at {}", name, path);
        entries.push(PathEntry {
            name: name.to_string(),
            path: path.to_string(),
            handler,
        });
        true
    }

    /// Remove a handler; returns whether it was registered
    pub fn unregister(&self, name: &str) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.name != name);
        before != entries.len()
    }

    /// Handler for an exact request path
    pub fn route(&self, path: &str) -> Option<Arc<H>> {
        self.entries
            .read()
            .iter()
            .find(|e| e.path == path)
            .map(|e| e.handler.clone())
    }

    /// Path a named handler is registered at
    pub fn path_of(&self, name: &str) -> Option<String> {
        self.entries
            .read()
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.path.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<H: ?Sized> Default for PathTable<H> {
    fn default() -> Self {
        Self::new()
    }
}
