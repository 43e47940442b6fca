//! Compilation context for the SPMD compiler.
//!
//! Ties a [`spmd_target::Target`] and its optimization switches to the
//! process-wide state of one compiler run, and provides the cost model and
//! object arena used by code generation.
//!
//! ## Modules
//!
//! - [`context`]: The compilation context state machine and run settings
//! - [`config`]: TOML driver configuration
//! - [`cost`]: Static cost model
//! - [`arena`]: Bookkeeping arena for cyclic compiler objects
//! - [`source`]: Source positions and warning suppression
//! - [`lang`]: Storage classes, address spaces and wrap semantics

pub mod arena;
pub mod config;
pub mod context;
pub mod cost;
pub mod error;
pub mod lang;
pub mod source;

pub use arena::{Bookkeeper, TraceId, Traceable, Traced};
pub use config::{config_to_toml, load_config, parse_config, template, DriverConfig};
pub use context::{
    CompilationContext, Phase, Settings, INIT_OPT_NUMBER, LAST_OPT_NUMBER, PRE_OPT_NUMBER,
};
pub use cost::{Construct, CostEstimate};
pub use error::{ConfigError, ContextError, Result};
pub use lang::{AddressSpace, StorageClass, WrapSemantics};
pub use source::{SourcePos, WarningSuppressions};
