//! Command-line surface for the `raptodb` binary.

pub mod args;

pub use args::{Cli, Command, ServerArgs, VerbosityArg};
