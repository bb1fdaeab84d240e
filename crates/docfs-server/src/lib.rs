//! docfs server library
//!
//! Serves the collection namespace over a line-delimited JSON protocol on TCP.

pub mod config;
pub mod constants;
pub mod protocol;
pub mod seed;
pub mod server;

pub use config::{ConfigError, ServerConfig};
pub use protocol::{ProtocolError, Request, Response};
pub use seed::SeedError;
pub use server::{Namespace, Server, StartupError, dispatch};
