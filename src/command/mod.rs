//! The `command` module turns protocol lines into broker operations.
//!
//! `parser` recognises the line protocol and `dispatcher` executes commands
//! against the shared broker on behalf of an issuer.

pub mod dispatcher;
pub mod parser;

pub use dispatcher::{Dispatcher, Outcome};
pub use parser::{Command, parse};

#[cfg(test)]
mod tests;
