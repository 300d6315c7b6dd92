//! Rust IRC Services Framework
//!
//! Service bots, their command tables, and the invocation context shared by
//! every transport that can run a services command.

pub mod framework;
pub mod help;
pub mod source;
pub mod staff;

pub use framework::{Command, ServiceBot, ServiceManager};
pub use help::HelpCommand;
pub use source::{ReplySink, SessionSink, SourceInfo};
pub use staff::StaffCommand;
