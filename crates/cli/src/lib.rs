//! Library side of the `sleuth` binary: configuration wiring and REPL input
//! handling, kept here so integration tests can drive them.

pub mod repl;
pub mod runtime;

pub use repl::{ReplCommand, parse_line};
pub use runtime::{Backends, Runtime, Stores};
