//! Rust IRC Services Core
//!
//! This crate provides the shared building blocks of the services daemon:
//! the account database, authcookies, fault codes, audit logging and
//! configuration.

pub mod audit;
pub mod auth;
pub mod authcookie;
pub mod config;
pub mod connection;
pub mod database;
pub mod error;
pub mod fault;
pub mod httpd;
pub mod module;
pub mod password;
pub mod utils;

pub use audit::{AuditEvent, AuditEventType, AuditLogger, AuditSink, MemoryAuditSink};
pub use auth::{verify_account_password, FailedLoginHook, LoginFailureRecorder};
pub use authcookie::{AuthCookie, AuthCookieManager, AuthCookieStore};
pub use config::Config;
pub use connection::ConnectionHandle;
pub use database::{Account, AccountStore, Channel, Database, EntityRef, OnlineUser, OperClass, RegisteredNick};
pub use error::{Error, Result};
pub use fault::{Fault, FaultCode};
pub use httpd::PathTable;
pub use module::{Module, ModuleManager};

/// Re-exports for convenience
pub use async_trait::async_trait;
pub use tracing::{debug, error, info, warn};
