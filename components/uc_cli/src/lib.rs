//! Usecode runner library
//!
//! Provides the Runtime struct and supporting modules for the
//! `usecode-run` command line tool.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod error;
pub mod logging;
pub mod runtime;

pub use cli::{Cli, VariantArg};
pub use error::{CliError, CliResult};
pub use runtime::{RunReport, Runtime};
