//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait, which provides a uniform
//! interface for executing commands and reporting results.
//!
//! # Architecture
//!
//! Commands are dispatched via [`CommandDispatcher`], which loads the
//! configuration and builds the requirements machinery each command needs.

pub mod check;
pub mod dispatcher;
pub mod helper;
pub mod install;

pub use dispatcher::{Command, CommandDispatcher, CommandResult};
