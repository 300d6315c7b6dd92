//! RPC method registry

use super::context::XmlRpcContext;
use super::methods::MethodHandler;
use super::response::{RpcCall, RpcResponse};
use parking_lot::RwLock;
use rustsvc_core::{AuditEvent, AuditEventType, ConnectionHandle, FaultCode};
use std::collections::HashMap;
use std::sync::Arc;

/// Method name -> handler. Written at module load and unload only.
#[derive(Default)]
pub struct MethodTable {
    methods: RwLock<HashMap<String, Arc<dyn MethodHandler>>>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its name; returns false if it replaced one
    pub fn register(&self, handler: Arc<dyn MethodHandler>) -> bool {
        let name = handler.name().to_string();
        tracing::debug!("Registering XML-RPC method {}", name);
        self.methods.write().insert(name, handler).is_none()
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.methods.write().remove(name).is_some()
    }

    pub fn find(&self, name: &str) -> Option<Arc<dyn MethodHandler>> {
        self.methods.read().get(name).cloned()
    }

    /// Registered method names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.methods.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.methods.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.read().is_empty()
    }

    /// Sanitize the arguments and run the named method
    pub async fn call(&self, ctx: &XmlRpcContext, conn: &ConnectionHandle, call: &RpcCall) -> RpcResponse {
        let Some(handler) = self.find(&call.method) else {
            tracing::debug!("Unknown XML-RPC method {}", call.method);
            return RpcResponse::fault(FaultCode::Unimplemented, "Unknown method.");
        };

        if let Err(fault) = handler.sanitizer().check(&call.params) {
            let event = AuditEvent::new(AuditEventType::Rejected)
                .with_transport("xmlrpc")
                .with_connection(conn.id)
                .with_source(conn.remote_addr.clone())
                .with_command(call.method.clone())
                .with_error(fault.to_string());
            ctx.audit.record(&event);
            return fault.into();
        }

        handler.call(ctx, conn, &call.params).await
    }
}
