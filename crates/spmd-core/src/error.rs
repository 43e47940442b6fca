//! Error types for the compilation context and driver configuration.

use std::path::PathBuf;

use spmd_target::TargetError;

use crate::context::Phase;

/// Errors raised by the compilation context state machine.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// The requested target could not be constructed; compilation must stop.
    #[error("cannot compile for target '{target}'")]
    InvalidTarget {
        /// The requested target name.
        target: String,
        /// Why construction failed.
        #[source]
        source: TargetError,
    },

    /// An operation was attempted in a phase that does not allow it.
    #[error("{operation} is not allowed while the context is {phase}")]
    WrongPhase {
        /// What was attempted.
        operation: &'static str,
        /// The current phase.
        phase: Phase,
    },

    /// An optimization stage number outside the valid range.
    #[error("optimization stage {stage} is out of range ({min}..={max})")]
    StageOutOfRange { stage: u32, min: u32, max: u32 },
}

/// Errors raised while loading or applying a driver configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read or written.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// A target, CPU or optimization name in the file was not recognized.
    #[error(transparent)]
    Target(#[from] TargetError),

    /// The context refused the configuration.
    #[error(transparent)]
    Context(#[from] ContextError),
}

/// Result type for context operations.
pub type Result<T> = std::result::Result<T, ContextError>;
