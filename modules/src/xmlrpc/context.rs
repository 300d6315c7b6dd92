//! Collaborators shared by every XML-RPC method

use rustsvc_core::{
    Account, AccountStore, AuditEvent, AuditEventType, AuditSink, AuthCookieStore, Config,
    ConnectionHandle, FailedLoginHook,
};
use rustsvc_services::ServiceManager;
use std::sync::Arc;

/// NickServ settings the gateway needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    pub no_nick_ownership: bool,
    pub max_account_length: usize,
    /// Service name used in audit records for account operations
    pub nickserv_nick: String,
}

impl GatewaySettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            no_nick_ownership: config.nickserv.no_nick_ownership,
            max_account_length: config.nickserv.max_account_length,
            nickserv_nick: config.service_nick("nickserv").unwrap_or("NickServ").to_string(),
        }
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Everything a method handler may touch
pub struct XmlRpcContext {
    pub accounts: Arc<dyn AccountStore>,
    pub cookies: Arc<dyn AuthCookieStore>,
    pub services: Arc<ServiceManager>,
    pub audit: Arc<dyn AuditSink>,
    pub failed_login: Arc<dyn FailedLoginHook>,
    pub settings: GatewaySettings,
}

impl XmlRpcContext {
    /// Audit record for an account operation performed over XML-RPC
    pub fn log_external(
        &self,
        conn: &ConnectionHandle,
        source: Option<&str>,
        account: Option<&Account>,
        event_type: AuditEventType,
        detail: impl Into<String>,
    ) {
        let mut event = self.external_event(conn, source, event_type).with_detail(detail);
        if let Some(account) = account {
            event = event.with_account(account.name.clone());
        }
        self.audit.record(&event);
    }

    /// Bare audit event attributed to the NickServ nick and this connection
    pub fn external_event(
        &self,
        conn: &ConnectionHandle,
        source: Option<&str>,
        event_type: AuditEventType,
    ) -> AuditEvent {
        AuditEvent::new(event_type)
            .with_service(self.settings.nickserv_nick.clone())
            .with_transport("xmlrpc")
            .with_connection(conn.id)
            .with_source(source.unwrap_or(conn.remote_addr.as_str()))
    }
}
