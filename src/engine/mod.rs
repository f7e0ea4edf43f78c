//! Command-line front end: argument parsing and the run handler.

pub mod arg_parser;
pub mod cli;

pub use arg_parser::{Cli, UnknownArg};
pub use cli::{handle_run, resolve_settings};
