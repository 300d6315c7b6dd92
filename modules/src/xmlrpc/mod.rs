//! XML-RPC transport
//!
//! Exposes account operations and services commands to web frontends as
//! the `atheme.*` XML-RPC methods. The HTTP listener and the XML codec are
//! external: the listener routes requests for the configured path to the
//! registered [`XmlRpcHandler`], and serializes the [`RpcReply`] it gets
//! back.

pub mod auth;
pub mod context;
pub mod dispatch;
pub mod methods;
pub mod reply;
pub mod response;
pub mod sanitize;
pub mod table;

pub use context::{GatewaySettings, XmlRpcContext};
pub use methods::{builtin_methods, MethodHandler};
pub use reply::{ReplyBuffer, RpcReplySink};
pub use response::{RpcCall, RpcReply, RpcResponse, RpcValue};
pub use sanitize::Sanitizer;
pub use table::MethodTable;

use rustsvc_core::{async_trait, Config, ConnectionHandle, Module, PathTable, Result};
use std::sync::Arc;
use tracing::{error, info};

/// Name the handler is routed under in the HTTP path table
pub const HANDLER_NAME: &str = "xmlrpc";

/// HTTP path handler for XML-RPC requests
pub struct XmlRpcHandler {
    context: Arc<XmlRpcContext>,
    methods: Arc<MethodTable>,
}

impl XmlRpcHandler {
    /// Serve one decoded call
    pub async fn handle(&self, conn: &ConnectionHandle, call: &RpcCall) -> RpcReply {
        let response = self.methods.call(&self.context, conn, call).await;
        RpcReply {
            response,
            connection_close: conn.connection_close,
        }
    }
}

/// The XML-RPC transport module
pub struct XmlRpcModule {
    handler: Arc<XmlRpcHandler>,
    methods: Arc<MethodTable>,
    paths: Arc<PathTable<XmlRpcHandler>>,
    path: String,
}

impl XmlRpcModule {
    pub fn new(context: XmlRpcContext, paths: Arc<PathTable<XmlRpcHandler>>, config: &Config) -> Self {
        let methods = Arc::new(MethodTable::new());
        let handler = Arc::new(XmlRpcHandler {
            context: Arc::new(context),
            methods: methods.clone(),
        });

        Self {
            handler,
            methods,
            paths,
            path: config.xmlrpc.path.clone(),
        }
    }

    pub fn methods(&self) -> &MethodTable {
        &self.methods
    }

    /// Path the handler is (or will be) routed under
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Run a call as if it arrived on `conn`
    pub async fn call(&self, conn: &ConnectionHandle, call: &RpcCall) -> RpcReply {
        self.handler.handle(conn, call).await
    }

    /// Add or move the route; re-registering is a no-op
    fn register_path(&self) {
        if self.path.is_empty() {
            error!("xmlrpc: path is missing or invalid, handler not registered");
            return;
        }
        self.paths.register(HANDLER_NAME, &self.path, self.handler.clone());
    }
}

#[async_trait]
impl Module for XmlRpcModule {
    fn name(&self) -> &str {
        "transport/xmlrpc"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn description(&self) -> &str {
        "XML-RPC interface to accounts and services commands"
    }

    async fn init(&mut self) -> Result<()> {
        for method in builtin_methods() {
            self.methods.register(method);
        }
        self.register_path();
        info!("XML-RPC transport ready at {} ({} methods)", self.path, self.methods.len());
        Ok(())
    }

    async fn cleanup(&mut self) -> Result<()> {
        for name in self.methods.names() {
            self.methods.unregister(&name);
        }
        self.paths.unregister(HANDLER_NAME);
        info!("XML-RPC transport unloaded");
        Ok(())
    }

    async fn config_ready(&mut self, config: &Config) -> Result<()> {
        self.path = config.xmlrpc.path.clone();
        self.register_path();
        Ok(())
    }
}
