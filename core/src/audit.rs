//! Command and security audit logging
//!
//! Every externally triggered login, logout, registration, verification and
//! command dispatch produces an [`AuditEvent`]. Events are emitted as
//! structured `tracing` records; failures are logged at warn level with full
//! detail even when the caller only receives a terse fault.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audit event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    Login,
    LoginFailure,
    Logout,
    Register,
    Verify,
    Command,
    /// Administrative change made by a services operator
    Admin,
    /// Request rejected before any work was done
    Rejected,
}

impl std::fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Login => write!(f, "login"),
            Self::LoginFailure => write!(f, "login_failure"),
            Self::Logout => write!(f, "logout"),
            Self::Register => write!(f, "register"),
            Self::Verify => write!(f, "verify"),
            Self::Command => write!(f, "command"),
            Self::Admin => write!(f, "admin"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// Audit event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_type: AuditEventType,

    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// Service the action was performed through (e.g. "NickServ")
    pub service: Option<String>,

    /// Transport that carried the request (e.g. "xmlrpc")
    pub transport: Option<String>,

    /// Connection the request arrived on
    pub connection_id: Option<Uuid>,

    /// Source description: remote address or caller-supplied description
    pub source: Option<String>,

    /// Account the caller is authenticated as
    pub account: Option<String>,

    /// Command executed
    pub command: Option<String>,

    /// Target of the action
    pub target: Option<String>,

    /// Free-form detail
    pub detail: Option<String>,

    /// Error message (for failures)
    pub error: Option<String>,

    pub metadata: std::collections::HashMap<String, String>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_type,
            timestamp: chrono::Utc::now(),
            service: None,
            transport: None,
            connection_id: None,
            source: None,
            account: None,
            command: None,
            target: None,
            detail: None,
            error: None,
            metadata: std::collections::HashMap::new(),
        }
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn with_transport(mut self, transport: impl Into<String>) -> Self {
        self.transport = Some(transport.into());
        self
    }

    pub fn with_connection(mut self, id: Uuid) -> Self {
        self.connection_id = Some(id);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Severity used for filtering: 2 = warn, 1 = info, 0 = debug
    pub fn severity(&self) -> u8 {
        match self.event_type {
            AuditEventType::LoginFailure | AuditEventType::Rejected => 2,
            AuditEventType::Login
            | AuditEventType::Logout
            | AuditEventType::Register
            | AuditEventType::Verify
            | AuditEventType::Admin => 1,
            AuditEventType::Command if self.error.is_some() => 1,
            AuditEventType::Command => 0,
        }
    }

    /// Log this event
    pub fn log(&self) {
        match self.severity() {
            2 => {
                tracing::warn!(
                    event = %self.event_type,
                    service = ?self.service,
                    transport = ?self.transport,
                    connection = ?self.connection_id,
                    source = ?self.source,
                    account = ?self.account,
                    command = ?self.command,
                    target = ?self.target,
                    detail = ?self.detail,
                    error = ?self.error,
                    metadata = ?self.metadata,
                    timestamp = %self.timestamp.to_rfc3339(),
                    "Audit event"
                );
            }
            1 => {
                tracing::info!(
                    event = %self.event_type,
                    service = ?self.service,
                    transport = ?self.transport,
                    connection = ?self.connection_id,
                    source = ?self.source,
                    account = ?self.account,
                    command = ?self.command,
                    target = ?self.target,
                    detail = ?self.detail,
                    error = ?self.error,
                    metadata = ?self.metadata,
                    timestamp = %self.timestamp.to_rfc3339(),
                    "Audit event"
                );
            }
            _ => {
                tracing::debug!(
                    event = %self.event_type,
                    service = ?self.service,
                    transport = ?self.transport,
                    connection = ?self.connection_id,
                    source = ?self.source,
                    account = ?self.account,
                    command = ?self.command,
                    target = ?self.target,
                    detail = ?self.detail,
                    timestamp = %self.timestamp.to_rfc3339(),
                    "Audit event"
                );
            }
        }
    }
}

/// Destination for audit events
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

/// Audit logger writing events through `tracing`
#[derive(Debug, Clone)]
pub struct AuditLogger {
    enabled: bool,

    /// Minimum level for audit events (0 = all, 1 = info+, 2 = warn+)
    min_level: u8,
}

impl AuditLogger {
    pub fn new(enabled: bool, min_level: u8) -> Self {
        Self { enabled, min_level }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn min_level(&self) -> u8 {
        self.min_level
    }

    pub fn set_min_level(&mut self, level: u8) {
        self.min_level = level;
    }
}

impl AuditSink for AuditLogger {
    fn record(&self, event: &AuditEvent) {
        if self.enabled && event.severity() >= self.min_level {
            event.log();
        }
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new(true, 0)
    }
}

/// Audit sink that keeps every event in memory
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: parking_lot::Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, event_type: AuditEventType) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: &AuditEvent) {
        self.events.lock().push(event.clone());
    }
}
