//! Connection handles passed explicitly through request processing

use uuid::Uuid;

/// Handle for the connection a request arrived on.
///
/// Handed to every handler and stored in the invocation context, so output
/// produced while serving a request always knows its own connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionHandle {
    pub id: Uuid,
    /// Remote address as reported by the listener
    pub remote_addr: String,
    /// The listener should close the connection after the reply
    pub connection_close: bool,
}

impl ConnectionHandle {
    pub fn new(remote_addr: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            remote_addr: remote_addr.into(),
            connection_close: false,
        }
    }

    pub fn with_connection_close(mut self, close: bool) -> Self {
        self.connection_close = close;
        self
    }

    /// Handle for calls that do not come from the network
    pub fn local() -> Self {
        Self::new("127.0.0.1")
    }
}
