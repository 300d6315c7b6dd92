//! Rust IRC Services Modules
//!
//! Transport modules that expose services to the outside world.

pub mod xmlrpc;

pub use xmlrpc::{XmlRpcHandler, XmlRpcModule};
