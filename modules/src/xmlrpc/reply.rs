//! Per-call reply buffer
//!
//! Interactive commands report success once per output line. Over XML-RPC
//! only one reply may be sent, so plain lines are accumulated and the first
//! terminal reply (a fault or a string result) wins. Everything after that
//! is dropped.

use super::response::RpcResponse;
use rustsvc_core::utils::string::strip_formatting;
use rustsvc_core::FaultCode;
use rustsvc_services::ReplySink;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum BufferState {
    #[default]
    Empty,
    Accumulating(String),
    Finalized(RpcResponse),
}

/// Accumulates command output for exactly one reply
#[derive(Debug, Default)]
pub struct ReplyBuffer {
    state: BufferState,
}

impl ReplyBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a line of text; lines are joined with `\n`
    pub fn append(&mut self, text: &str) {
        match &mut self.state {
            BufferState::Finalized(_) => {}
            BufferState::Accumulating(buf) => {
                buf.push('\n');
                buf.push_str(text);
            }
            BufferState::Empty => self.state = BufferState::Accumulating(text.to_string()),
        }
    }

    /// Finalize with a success string; `None` sends the accumulated text
    pub fn finalize_success(&mut self, value: Option<&str>) {
        if self.is_finalized() {
            return;
        }
        let value = match (value, std::mem::take(&mut self.state)) {
            (Some(v), _) => v.to_string(),
            (None, BufferState::Accumulating(buf)) => buf,
            (None, _) => String::new(),
        };
        self.state = BufferState::Finalized(RpcResponse::string(value));
    }

    pub fn finalize_fault(&mut self, code: FaultCode, message: &str) {
        if self.is_finalized() {
            return;
        }
        self.state = BufferState::Finalized(RpcResponse::fault(code, message));
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self.state, BufferState::Finalized(_))
    }

    /// Final outcome once the command has returned.
    ///
    /// A command that produced no output at all is reported as
    /// `Unimplemented`.
    pub fn into_response(self) -> RpcResponse {
        match self.state {
            BufferState::Finalized(response) => response,
            BufferState::Accumulating(text) => RpcResponse::string(text),
            BufferState::Empty => {
                RpcResponse::fault(FaultCode::Unimplemented, "Command did not return a result.")
            }
        }
    }
}

/// [`ReplySink`] that feeds a [`ReplyBuffer`]
#[derive(Debug, Default)]
pub struct RpcReplySink {
    buffer: ReplyBuffer,
}

impl RpcReplySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finalized(&self) -> bool {
        self.buffer.is_finalized()
    }

    pub fn into_response(self) -> RpcResponse {
        self.buffer.into_response()
    }
}

impl ReplySink for RpcReplySink {
    fn description(&self) -> &str {
        "xmlrpc"
    }

    fn fail(&mut self, code: FaultCode, message: &str) {
        self.buffer.finalize_fault(code, &strip_formatting(message));
    }

    fn success_nodata(&mut self, message: &str) {
        self.buffer.append(&strip_formatting(message));
    }

    fn success_string(&mut self, result: &str, _message: &str) {
        self.buffer.finalize_success(Some(result));
    }
}
