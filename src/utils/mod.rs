//! The `utils` module holds the pieces shared by every layer of `eventcast`:
//! the error taxonomy and logging setup.

pub mod error;
pub mod logging;
