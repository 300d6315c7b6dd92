//! Command fault codes
//!
//! These numbers are part of the XML-RPC wire contract and are also used by
//! interactive commands when they fail. They must never be renumbered.

use crate::Error;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Numbered fault codes shared by every command transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
#[repr(i32)]
pub enum FaultCode {
    /// Insufficient parameters
    NeedMoreParams = 1,
    /// Bad parameters, invalid username or invalid key
    BadParams = 2,
    /// Unknown source account, service, command or entity
    NoSuchSource = 3,
    /// Target account not found
    NoSuchTarget = 4,
    /// Bad credentials
    AuthFail = 5,
    /// Frozen account, already online, or missing privilege
    NoPrivs = 6,
    /// No such key
    NoSuchKey = 7,
    /// Already registered
    AlreadyExists = 8,
    /// Too many
    TooMany = 9,
    /// Delivery failure
    EmailFail = 10,
    /// Account not verified
    NotVerified = 11,
    /// Nothing changed
    NoChange = 12,
    /// Already authenticated
    AlreadyAuthed = 13,
    /// Unimplemented, or a command produced no result
    Unimplemented = 14,
    /// Authcookie validation failed
    BadAuthCookie = 15,
}

impl FaultCode {
    /// Numeric value sent on the wire
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Look a fault code up by its wire value
    pub fn from_code(code: i32) -> Option<Self> {
        let fault = match code {
            1 => Self::NeedMoreParams,
            2 => Self::BadParams,
            3 => Self::NoSuchSource,
            4 => Self::NoSuchTarget,
            5 => Self::AuthFail,
            6 => Self::NoPrivs,
            7 => Self::NoSuchKey,
            8 => Self::AlreadyExists,
            9 => Self::TooMany,
            10 => Self::EmailFail,
            11 => Self::NotVerified,
            12 => Self::NoChange,
            13 => Self::AlreadyAuthed,
            14 => Self::Unimplemented,
            15 => Self::BadAuthCookie,
            _ => return None,
        };
        Some(fault)
    }
}

impl From<FaultCode> for i32 {
    fn from(code: FaultCode) -> Self {
        code.code()
    }
}

impl TryFrom<i32> for FaultCode {
    type Error = String;

    fn try_from(code: i32) -> std::result::Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("unknown fault code {}", code))
    }
}

impl std::fmt::Display for FaultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A terminal error outcome: fault code plus human-readable message
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("fault {code}: {message}")]
pub struct Fault {
    pub code: FaultCode,
    pub message: String,
}

impl Fault {
    pub fn new(code: FaultCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn need_more_params() -> Self {
        Self::new(FaultCode::NeedMoreParams, "Insufficient parameters.")
    }

    pub fn bad_params() -> Self {
        Self::new(FaultCode::BadParams, "Invalid parameters.")
    }

    pub fn unknown_user() -> Self {
        Self::new(FaultCode::NoSuchSource, "Unknown user.")
    }

    pub fn bad_auth_cookie() -> Self {
        Self::new(FaultCode::BadAuthCookie, "Invalid authcookie for this account.")
    }
}

/// Collaborator failures never cross the gateway with their own type.
impl From<Error> for Fault {
    fn from(e: Error) -> Self {
        match e {
            Error::AlreadyExists(_) => {
                Fault::new(FaultCode::AlreadyExists, "The account is already registered.")
            }
            other => {
                tracing::error!("Collaborator failure mapped to fault: {}", other);
                Fault::new(FaultCode::NoSuchSource, "The requested object could not be found.")
            }
        }
    }
}
