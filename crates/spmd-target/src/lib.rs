//! Target description for the SPMD compiler.
//!
//! Models one compilation target (architecture, CPU, ISA, vector width) and
//! its hardware capabilities, and turns those capabilities plus the user's
//! optimization switches into code-generation decisions.
//!
//! ## Modules
//!
//! - [`isa`]: Instruction sets and vector target names
//! - [`cpu`]: CPU table and host detection
//! - [`environment`]: Architecture, OS, triple, PIC level and code model
//! - [`capabilities`]: Static ISA capability table
//! - [`backend`]: Backend toolkit seam and the built-in toolkit
//! - [`layout`]: Data-layout parsing and struct offsets
//! - [`descriptor`]: The [`Target`] descriptor
//! - [`opt`]: Optimization configuration
//! - [`policy`]: Capability policy resolution
//! - [`warning`]: Performance-warning kinds

pub mod backend;
pub mod capabilities;
pub mod cpu;
pub mod descriptor;
pub mod environment;
pub mod error;
pub mod isa;
pub mod layout;
#[cfg(feature = "llvm")]
pub mod llvm;
pub mod opt;
pub mod policy;
pub mod warning;

pub use backend::{AttributeSink, BackendToolkit, BuiltinToolkit, MachineSpec, TargetMachine};
pub use capabilities::{Capabilities, IsaProfile};
pub use cpu::{supported_cpus, Cpu};
pub use descriptor::{Target, TargetRequest, TargetSummary};
pub use environment::{Arch, CallingConv, CodeModel, PicLevel, TargetOs, Triple};
pub use error::{BackendError, Result, TargetError};
pub use isa::{Isa, IsaFamily, VectorTarget, MAX_VECTOR_WIDTH};
pub use layout::{DataLayout, ScalarType};
pub use opt::{OptConfig, OptLevel};
pub use policy::{AccessStrategy, CodegenPolicy, MaskedStoreStrategy};
pub use warning::PerfWarning;
