//! Command sources
//!
//! A [`SourceInfo`] describes who is running a command and where its output
//! goes. Output is routed through a [`ReplySink`]; each transport supplies
//! its own sink, so the same command serves interactive IRC sessions and
//! one-shot RPC calls alike.

use crate::framework::ServiceBot;
use rustsvc_core::{Account, ConnectionHandle, FaultCode};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Output channel for command replies
pub trait ReplySink: Send {
    /// Transport name used in logs (e.g. "xmlrpc")
    fn description(&self) -> &str;

    /// The command failed
    fn fail(&mut self, code: FaultCode, message: &str);

    /// One line of informational output
    fn success_nodata(&mut self, message: &str);

    /// The command succeeded with a machine-readable result
    fn success_string(&mut self, result: &str, message: &str);
}

/// Invocation context for one command execution
pub struct SourceInfo<'a> {
    /// Account the caller is authenticated as
    pub account: Option<Account>,
    /// Service the command is run through
    pub service: Option<Arc<ServiceBot>>,
    pub connection: ConnectionHandle,
    /// Caller-supplied description (e.g. the end user's address)
    pub source_desc: Option<String>,
    sink: &'a mut dyn ReplySink,
}

impl<'a> SourceInfo<'a> {
    pub fn new(connection: ConnectionHandle, sink: &'a mut dyn ReplySink) -> Self {
        Self {
            account: None,
            service: None,
            connection,
            source_desc: None,
            sink,
        }
    }

    pub fn with_account(mut self, account: Option<Account>) -> Self {
        self.account = account;
        self
    }

    pub fn with_service(mut self, service: Option<Arc<ServiceBot>>) -> Self {
        self.service = service;
        self
    }

    pub fn with_source_desc(mut self, desc: Option<String>) -> Self {
        self.source_desc = desc;
        self
    }

    pub fn fail(&mut self, code: FaultCode, message: &str) {
        self.sink.fail(code, message);
    }

    pub fn success_nodata(&mut self, message: &str) {
        self.sink.success_nodata(message);
    }

    pub fn success_string(&mut self, result: &str, message: &str) {
        self.sink.success_string(result, message);
    }

    pub fn transport(&self) -> &str {
        self.sink.description()
    }

    /// Name of the caller as shown in operator notices
    pub fn oper_name(&self) -> String {
        match (&self.account, &self.source_desc) {
            (Some(account), Some(desc)) => format!("{} ({})", account.name, desc),
            (Some(account), None) => account.name.clone(),
            (None, Some(desc)) => format!("<{}>{}", self.transport(), desc),
            (None, None) => format!("<{}>", self.transport()),
        }
    }
}

/// Sink for interactive IRC sessions: every reply becomes NOTICE lines from
/// the service to the user.
pub struct SessionSink {
    service_nick: String,
    target_nick: String,
    sender: mpsc::UnboundedSender<String>,
}

impl SessionSink {
    pub fn new(
        service_nick: impl Into<String>,
        target_nick: impl Into<String>,
        sender: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            service_nick: service_nick.into(),
            target_nick: target_nick.into(),
            sender,
        }
    }

    fn notice(&self, text: &str) {
        for line in text.split('\n') {
            let line = format!(":{} NOTICE {} :{}", self.service_nick, self.target_nick, line);
            if self.sender.send(line).is_err() {
                tracing::debug!("Session for {} is gone, dropping reply", self.target_nick);
                return;
            }
        }
    }
}

impl ReplySink for SessionSink {
    fn description(&self) -> &str {
        "irc"
    }

    fn fail(&mut self, _code: FaultCode, message: &str) {
        self.notice(message);
    }

    fn success_nodata(&mut self, message: &str) {
        self.notice(message);
    }

    fn success_string(&mut self, _result: &str, message: &str) {
        self.notice(message);
    }
}
