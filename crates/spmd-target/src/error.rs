//! Error types for target description operations.

/// Errors that can occur while resolving or constructing a compilation target.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    /// The target name is not in the table of supported targets.
    #[error("unknown target '{name}'")]
    UnknownTarget {
        /// The name that failed to parse.
        name: String,
    },

    /// The ISA name is not recognized.
    #[error("unknown ISA '{name}'")]
    UnknownIsa {
        /// The name that failed to parse.
        name: String,
    },

    /// The CPU name is not in the CPU table.
    #[error("unknown CPU '{cpu}'; supported CPUs: {supported}")]
    UnknownCpu {
        /// The requested CPU name.
        cpu: String,
        /// Comma-separated list of known CPU names.
        supported: String,
    },

    /// The architecture name is not recognized.
    #[error("unknown architecture '{name}'")]
    UnknownArch {
        /// The name that failed to parse.
        name: String,
    },

    /// The requested CPU cannot run code for the requested target.
    #[error("the requested CPU ({cpu}) is incompatible with the target {target}")]
    IncompatibleCpu {
        /// The resolved CPU name.
        cpu: String,
        /// The requested target name.
        target: String,
    },

    /// The requested architecture cannot host the requested target.
    #[error("the target {target} is not supported on the {arch} architecture")]
    IncompatibleArch {
        /// The architecture name.
        arch: String,
        /// The requested target name.
        target: String,
    },

    /// The OS name is not recognized.
    #[error("unknown target OS '{name}'")]
    UnknownOs {
        /// The name that failed to parse.
        name: String,
    },

    /// No triple exists for the (architecture, OS) pair.
    #[error("the {os} target OS is not supported on the {arch} architecture")]
    UnsupportedOs {
        /// The architecture name.
        arch: String,
        /// The OS name.
        os: String,
    },

    /// The backend toolkit refused to produce a target machine.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// An optimization switch name was not recognized.
    #[error("unknown optimization option '{name}'")]
    UnknownOptFlag {
        /// The unrecognized switch.
        name: String,
    },

    /// Malformed data-layout string.
    #[error("invalid data layout '{layout}': {detail}")]
    InvalidDataLayout {
        /// The full layout string.
        layout: String,
        /// What was wrong with it.
        detail: String,
    },
}

/// Errors reported by a backend toolkit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The toolkit has no code generator for the triple.
    #[error("no backend registered for triple '{triple}'")]
    NoTarget {
        /// The requested triple.
        triple: String,
    },

    /// The toolkit could not build a target machine.
    #[error("failed to create target machine for {triple} (cpu {cpu}): {message}")]
    MachineCreation {
        /// The requested triple.
        triple: String,
        /// The requested CPU.
        cpu: String,
        /// Toolkit-supplied detail.
        message: String,
    },
}

/// Result type for target operations.
pub type Result<T> = std::result::Result<T, TargetError>;
