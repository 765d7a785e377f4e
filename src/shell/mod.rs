//! External command execution and platform checks.

pub mod command;
pub mod platform;

pub use command::{
    execute, execute_quiet, execute_streaming, CommandOptions, CommandResult, OutputLine,
};
pub use platform::{is_ci, is_elevated};
