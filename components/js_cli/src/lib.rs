//! JavaScript VM command line library
//!
//! Provides the [`Runtime`] facade used by the `jsvm` binary: load a
//! serialized program, run it or print its disassembly.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod error;
pub mod runtime;

pub use cli::Cli;
pub use error::{CliError, CliResult};
pub use runtime::Runtime;
