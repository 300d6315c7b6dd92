//! Values handed to the XML-RPC codec
//!
//! The gateway never produces XML itself. It hands the codec one of these
//! values plus a close-connection hint and the codec does the framing.

use rustsvc_core::{Fault, FaultCode};
use serde::{Deserialize, Serialize};

/// A single XML-RPC value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RpcValue {
    String(String),
    Boolean(bool),
}

/// The terminal outcome of one call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RpcResponse {
    Params(Vec<RpcValue>),
    Fault(Fault),
}

impl RpcResponse {
    /// Single string success value
    pub fn string(value: impl Into<String>) -> Self {
        Self::Params(vec![RpcValue::String(value.into())])
    }

    pub fn fault(code: FaultCode, message: impl Into<String>) -> Self {
        Self::Fault(Fault::new(code, message))
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Fault(_))
    }

    /// Fault code, if this is a fault
    pub fn fault_code(&self) -> Option<FaultCode> {
        match self {
            Self::Fault(fault) => Some(fault.code),
            Self::Params(_) => None,
        }
    }

    /// First parameter, if it is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Params(values) => match values.first() {
                Some(RpcValue::String(s)) => Some(s),
                _ => None,
            },
            Self::Fault(_) => None,
        }
    }
}

impl From<Fault> for RpcResponse {
    fn from(fault: Fault) -> Self {
        Self::Fault(fault)
    }
}

/// A decoded method call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcCall {
    pub method: String,
    pub params: Vec<String>,
}

impl RpcCall {
    pub fn new<I, S>(method: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method: method.into(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }
}

/// What the listener needs to write the HTTP response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcReply {
    pub response: RpcResponse,
    /// Close the connection once the reply is written
    pub connection_close: bool,
}
