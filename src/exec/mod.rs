// src/exec/mod.rs

//! Remote task execution layer.
//!
//! - [`connection`] describes how to reach one instance.
//! - [`shell`] synthesizes quoted shell snippets (exports, heredoc writes).
//! - [`transport`] provides the `Transport` trait and the production
//!   `SshTransport`, which tests replace with a fake implementation.
//! - [`executor`] runs one task: signature check, timeout, exit mapping and
//!   signature recording.

pub mod connection;
pub mod executor;
pub mod shell;
pub mod transport;

pub use connection::Connection;
pub use executor::{TaskExecutor, SSH_CONNECTION_FAILED};
pub use transport::{BoxFuture, CommandOutput, SshTransport, Transport};
