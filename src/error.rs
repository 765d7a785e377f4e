//! Error types for umake operations.
//!
//! This module defines [`UmakeError`], the primary error type used throughout
//! the crate, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Use `UmakeError` for domain-specific errors that need distinct handling
//! - Use `anyhow::Error` (via `UmakeError::Other`) for unexpected errors
//! - Errors raised on the install worker never cross into the caller as
//!   `Err`; they are rendered into `InstallResult::error` instead

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for umake operations.
#[derive(Debug, Error)]
pub enum UmakeError {
    /// Configuration file not found at expected location.
    #[error("Configuration not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Failed to parse configuration file.
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// Invalid configuration structure or values.
    #[error("Invalid configuration: {message}")]
    ConfigValidationError { message: String },

    /// External command failed.
    #[error("Command failed with exit code {code:?}: {command}")]
    CommandFailed { command: String, code: Option<i32> },

    /// A package specifier could not be parsed.
    #[error("Invalid package specifier '{spec}': {message}")]
    InvalidSpecifier { spec: String, message: String },

    /// The package database stayed locked for every reload attempt.
    #[error("Package database is busy (gave up after {attempts} attempts)")]
    DatabaseBusy { attempts: u32 },

    /// The package database could not be read at all.
    #[error("Package database unavailable: {message}")]
    DatabaseUnavailable { message: String },

    /// A package could not be staged for install or upgrade.
    #[error("Can't mark for install {package}: {message}")]
    MarkFailed { package: String, message: String },

    /// Enabling a foreign architecture failed.
    #[error("Can't enable architecture {arch}: {message}")]
    ForeignArchFailed { arch: String, message: String },

    /// The package manager transaction failed.
    #[error("{message}")]
    CommitFailed { message: String },

    /// The privileged helper produced output that doesn't follow the protocol.
    #[error("Unexpected output from privileged helper: {line}")]
    HelperProtocol { line: String },

    /// The privileged helper couldn't be started with elevated rights.
    #[error("Privilege elevation failed: {message}")]
    ElevationFailed { message: String },

    /// A replacement package tool was passed to a helper running as root.
    #[error("Refusing to run {path} as root; the privileged helper only runs system package tools")]
    ToolOverrideRefused { path: PathBuf },

    /// The requirements service is no longer accepting tasks.
    #[error("Requirements service has been stopped")]
    ServiceStopped,

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for umake operations.
pub type Result<T> = std::result::Result<T, UmakeError>;
