//! Optimization configuration.
//!
//! A flat record of independent switches. It is filled in once from user
//! input and read everywhere downstream; nothing here links one switch to
//! another.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TargetError};

/// Optimization level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OptLevel {
    /// `-O0`: no optimization.
    None,
    /// `-O1`: optimize without growing code.
    #[default]
    Size,
    /// `-O2` and above.
    Full,
}

impl OptLevel {
    /// Numeric level, 0 to 2.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Level from a `-O` number; anything above 2 is [`OptLevel::Full`].
    pub fn from_number(n: u32) -> OptLevel {
        match n {
            0 => OptLevel::None,
            1 => OptLevel::Size,
            _ => OptLevel::Full,
        }
    }
}

impl fmt::Display for OptLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "O{}", self.as_u8())
    }
}

/// Independent optimization and safety switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OptConfig {
    pub level: OptLevel,
    /// Allow reassociation and other value-changing float transforms.
    pub fast_math: bool,
    /// Masked vector loads may read past the active lanes.
    pub fast_masked_vload: bool,
    pub unroll_loops: bool,
    /// Use 32-bit offsets for varying address computations.
    pub force_32bit_addressing: bool,
    pub disable_asserts: bool,
    pub disable_gathers: bool,
    pub disable_scatters: bool,
    pub disable_fma: bool,
    /// Treat every vector load and store as aligned.
    pub force_aligned_memory: bool,
    pub enable_load_store_vectorizer: bool,
    pub enable_slp_vectorizer: bool,
    /// Do not specialize code for an all-on mask.
    pub disable_mask_all_on_optimizations: bool,
    pub disable_handle_pseudo_memory_ops: bool,
    pub disable_blended_masked_stores: bool,
    pub disable_coherent_control_flow: bool,
    pub disable_uniform_control_flow: bool,
    pub disable_gather_scatter_optimizations: bool,
    pub disable_masked_store_to_store: bool,
    pub disable_gather_scatter_flattening: bool,
    pub disable_uniform_memory_optimizations: bool,
    pub disable_coalescing: bool,
    /// Keep AVX-512 code in 256-bit registers.
    pub disable_zmm: bool,
    /// Restore FTZ/DAZ state on exit from exported functions.
    pub reset_ftz_daz: bool,
}

impl Default for OptConfig {
    fn default() -> Self {
        Self {
            level: OptLevel::Size,
            fast_math: false,
            fast_masked_vload: false,
            unroll_loops: true,
            force_32bit_addressing: true,
            disable_asserts: false,
            disable_gathers: false,
            disable_scatters: false,
            disable_fma: false,
            force_aligned_memory: false,
            enable_load_store_vectorizer: false,
            enable_slp_vectorizer: false,
            disable_mask_all_on_optimizations: false,
            disable_handle_pseudo_memory_ops: false,
            disable_blended_masked_stores: false,
            disable_coherent_control_flow: false,
            disable_uniform_control_flow: false,
            disable_gather_scatter_optimizations: false,
            disable_masked_store_to_store: false,
            disable_gather_scatter_flattening: false,
            disable_uniform_memory_optimizations: false,
            disable_coalescing: false,
            disable_zmm: false,
            reset_ftz_daz: false,
        }
    }
}

/// Names accepted by [`OptConfig::apply_flag`].
pub const OPT_FLAGS: &[&str] = &[
    "fast-math",
    "fast-masked-vload",
    "disable-loop-unroll",
    "force-aligned-memory",
    "disable-assertions",
    "disable-fma",
    "disable-gathers",
    "disable-scatters",
    "disable-blended-masked-stores",
    "disable-coherent-control-flow",
    "disable-uniform-control-flow",
    "disable-gather-scatter-optimizations",
    "disable-masked-store-to-store",
    "disable-gather-scatter-flattening",
    "disable-uniform-memory-optimizations",
    "disable-coalescing",
    "disable-zmm",
    "disable-handle-pseudo-memory-ops",
    "disable-mask-all-on-optimizations",
    "enable-ldst-vectorizer",
    "enable-slp-vectorizer",
    "reset-ftz-daz",
    "addressing=32",
    "addressing=64",
];

impl OptConfig {
    /// Apply one `--opt=` switch by name.
    pub fn apply_flag(&mut self, name: &str) -> Result<()> {
        match name {
            "fast-math" => self.fast_math = true,
            "fast-masked-vload" => self.fast_masked_vload = true,
            "disable-loop-unroll" => self.unroll_loops = false,
            "force-aligned-memory" => self.force_aligned_memory = true,
            "disable-assertions" => self.disable_asserts = true,
            "disable-fma" => self.disable_fma = true,
            "disable-gathers" => self.disable_gathers = true,
            "disable-scatters" => self.disable_scatters = true,
            "disable-blended-masked-stores" => self.disable_blended_masked_stores = true,
            "disable-coherent-control-flow" => self.disable_coherent_control_flow = true,
            "disable-uniform-control-flow" => self.disable_uniform_control_flow = true,
            "disable-gather-scatter-optimizations" => {
                self.disable_gather_scatter_optimizations = true
            }
            "disable-masked-store-to-store" => self.disable_masked_store_to_store = true,
            "disable-gather-scatter-flattening" => self.disable_gather_scatter_flattening = true,
            "disable-uniform-memory-optimizations" => {
                self.disable_uniform_memory_optimizations = true
            }
            "disable-coalescing" => self.disable_coalescing = true,
            "disable-zmm" => self.disable_zmm = true,
            "disable-handle-pseudo-memory-ops" => self.disable_handle_pseudo_memory_ops = true,
            "disable-mask-all-on-optimizations" => {
                self.disable_mask_all_on_optimizations = true
            }
            "enable-ldst-vectorizer" | "enable-load-store-vectorizer" => {
                self.enable_load_store_vectorizer = true
            }
            "enable-slp-vectorizer" => self.enable_slp_vectorizer = true,
            "reset-ftz-daz" => self.reset_ftz_daz = true,
            "addressing=32" => self.force_32bit_addressing = true,
            "addressing=64" => self.force_32bit_addressing = false,
            _ => {
                return Err(TargetError::UnknownOptFlag {
                    name: name.to_string(),
                })
            }
        }
        log::debug!("applied optimization option '{name}'");
        Ok(())
    }

    /// Whether any optimization passes run.
    pub fn is_optimizing(&self) -> bool {
        self.level > OptLevel::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opt = OptConfig::default();
        assert_eq!(opt.level, OptLevel::Size);
        assert!(opt.unroll_loops);
        assert!(opt.force_32bit_addressing);
        assert!(!opt.fast_math);
        assert!(!opt.disable_gathers);
        assert!(opt.is_optimizing());
    }

    #[test]
    fn every_listed_flag_applies() {
        for flag in OPT_FLAGS {
            let mut opt = OptConfig::default();
            opt.apply_flag(flag).unwrap();
        }
    }

    #[test]
    fn flags_touch_only_their_field() {
        let mut opt = OptConfig::default();
        opt.apply_flag("disable-gathers").unwrap();
        let expected = OptConfig {
            disable_gathers: true,
            ..OptConfig::default()
        };
        assert_eq!(opt, expected);

        opt.apply_flag("disable-loop-unroll").unwrap();
        opt.apply_flag("addressing=64").unwrap();
        assert!(!opt.unroll_loops);
        assert!(!opt.force_32bit_addressing);
    }

    #[test]
    fn unknown_flag() {
        let err = OptConfig::default().apply_flag("go-faster").unwrap_err();
        assert_eq!(
            err,
            TargetError::UnknownOptFlag {
                name: "go-faster".into()
            }
        );
    }

    #[test]
    fn levels() {
        assert_eq!(OptLevel::from_number(0), OptLevel::None);
        assert_eq!(OptLevel::from_number(3), OptLevel::Full);
        assert_eq!(OptLevel::Full.to_string(), "O2");
    }

    #[test]
    fn json_uses_kebab_case_and_defaults() {
        let opt: OptConfig =
            serde_json::from_str(r#"{"disable-zmm": true, "level": "full"}"#).unwrap();
        assert!(opt.disable_zmm);
        assert_eq!(opt.level, OptLevel::Full);
        assert!(opt.unroll_loops);
        let json = serde_json::to_string(&OptConfig::default()).unwrap();
        assert!(json.contains("\"force-32bit-addressing\":true"));
    }
}
