//! CLI command implementations.

pub mod check;
pub mod describe;
pub mod targets;

use anyhow::{bail, Result};
use spmd_target::{BackendToolkit, BuiltinToolkit};

/// Output format of `describe` and `check`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Human,
    Json,
}

impl Format {
    pub fn parse(name: Option<&str>) -> Result<Format> {
        match name {
            None | Some("human") => Ok(Format::Human),
            Some("json") => Ok(Format::Json),
            Some(other) => bail!("unknown format '{other}' (expected human or json)"),
        }
    }
}

/// Backend toolkit by name.
pub fn toolkit(name: &str) -> Result<Box<dyn BackendToolkit>> {
    log::debug!("selecting the {name} backend toolkit");
    match name {
        "builtin" => Ok(Box::new(BuiltinToolkit)),
        #[cfg(feature = "llvm")]
        "llvm" => Ok(Box::new(spmd_target::llvm::LlvmToolkit::new())),
        #[cfg(not(feature = "llvm"))]
        "llvm" => bail!("spmdc was built without the 'llvm' feature"),
        other => bail!("unknown backend '{other}' (expected builtin or llvm)"),
    }
}
