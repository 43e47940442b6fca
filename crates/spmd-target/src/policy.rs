//! Capability policy resolution.
//!
//! Every decision is a two-factor gate: the hardware must support the
//! feature and the optimization configuration must not disable it. A
//! disabling switch always wins, and a missing capability always selects
//! the fallback path.

use serde::Serialize;

use crate::descriptor::Target;
use crate::opt::OptConfig;

/// How a varying gather or scatter is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessStrategy {
    /// A single hardware gather/scatter instruction.
    Native,
    /// One scalar access per active lane.
    Scalarized,
}

/// How a store under a partial mask is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MaskedStoreStrategy {
    /// Predicated store instruction.
    Native,
    /// Load, blend with the mask, store back.
    Blend,
    /// One scalar store per active lane.
    Scalarize,
}

impl Target {
    /// Whether varying loads use the hardware gather.
    pub fn use_gather(&self, opt: &OptConfig) -> bool {
        self.has_gather() && !opt.disable_gathers
    }

    /// Whether varying stores use the hardware scatter.
    pub fn use_scatter(&self, opt: &OptConfig) -> bool {
        self.has_scatter() && !opt.disable_scatters
    }

    /// Pair this target with an optimization configuration.
    pub fn policy<'a>(&'a self, opt: &'a OptConfig) -> CodegenPolicy<'a> {
        CodegenPolicy { target: self, opt }
    }
}

/// Read-only view combining a target with the optimization switches.
#[derive(Debug, Clone, Copy)]
pub struct CodegenPolicy<'a> {
    pub target: &'a Target,
    pub opt: &'a OptConfig,
}

impl CodegenPolicy<'_> {
    pub fn gather_strategy(&self) -> AccessStrategy {
        if self.target.use_gather(self.opt) {
            AccessStrategy::Native
        } else {
            AccessStrategy::Scalarized
        }
    }

    pub fn scatter_strategy(&self) -> AccessStrategy {
        if self.target.use_scatter(self.opt) {
            AccessStrategy::Native
        } else {
            AccessStrategy::Scalarized
        }
    }

    /// Predicated stores need mask registers; blending needs the switch on.
    pub fn masked_store_strategy(&self) -> MaskedStoreStrategy {
        if self.target.masking_is_free() {
            MaskedStoreStrategy::Native
        } else if self.target.is_valid() && !self.opt.disable_blended_masked_stores {
            MaskedStoreStrategy::Blend
        } else {
            MaskedStoreStrategy::Scalarize
        }
    }

    pub fn use_fma(&self) -> bool {
        self.target.has_fma() && !self.opt.disable_fma
    }

    /// Whether gathers may be coalesced into vector loads.
    pub fn use_coalescing(&self) -> bool {
        self.target.is_valid() && !self.opt.disable_coalescing
    }

    /// Whether 512-bit registers may be used.
    pub fn use_zmm(&self) -> bool {
        self.target.isa().is_avx512() && self.target.is_valid() && !self.opt.disable_zmm
    }

    pub fn fast_masked_vload(&self) -> bool {
        self.opt.fast_masked_vload
    }

    pub fn unroll_loops(&self) -> bool {
        self.opt.unroll_loops
    }

    pub fn asserts_enabled(&self) -> bool {
        !self.opt.disable_asserts
    }

    /// 32-bit offsets apply only when pointers are wider than 32 bits.
    pub fn force_32bit_addressing(&self) -> bool {
        self.opt.force_32bit_addressing && !self.target.is_32bit()
    }

    /// Function attributes with the ZMM switch applied.
    pub fn function_attributes(&self) -> Vec<(String, String)> {
        self.target.function_attributes(self.opt.disable_zmm)
    }
}
