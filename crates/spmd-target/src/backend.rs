//! Backend toolkit seam.
//!
//! The target descriptor never talks to a code generator directly. It asks a
//! [`BackendToolkit`] for a triple and a [`TargetMachine`], and hands
//! per-function attributes to an [`AttributeSink`]. The default
//! [`BuiltinToolkit`] is table driven; an LLVM-backed toolkit is available
//! behind the `llvm` feature.

use std::collections::BTreeMap;
use std::fmt;

use crate::environment::{Arch, CodeModel, PicLevel, TargetOs, Triple};
use crate::error::{BackendError, Result};

/// Parameters for building a target machine.
#[derive(Debug, Clone, Copy)]
pub struct MachineSpec<'a> {
    pub triple: &'a Triple,
    pub cpu: &'a str,
    /// Comma-separated `+feature` list.
    pub features: &'a str,
    pub pic: PicLevel,
    pub code_model: CodeModel,
}

/// A backend handle able to generate code for one (triple, CPU, features).
///
/// A constructed target is shared read-only across threads, so machines must
/// be `Send + Sync`.
pub trait TargetMachine: fmt::Debug + Send + Sync {
    fn triple(&self) -> &Triple;

    fn cpu(&self) -> &str;

    fn features(&self) -> &str;

    /// LLVM-style data-layout string.
    fn data_layout(&self) -> String;

    /// Whether the backend knows the named intrinsic for this machine.
    fn has_intrinsic(&self, name: &str) -> bool;
}

/// Factory for triples and target machines.
pub trait BackendToolkit: Send + Sync {
    /// Short name used in diagnostics.
    fn name(&self) -> &str;

    /// Triple for an (architecture, OS) pair.
    fn triple(&self, arch: Arch, os: TargetOs) -> Result<Triple> {
        Triple::derive(arch, os)
    }

    /// Build a target machine, or explain why not.
    fn create_target_machine(
        &self,
        spec: &MachineSpec<'_>,
    ) -> std::result::Result<Box<dyn TargetMachine>, BackendError>;
}

/// Receives target-specific function attributes.
pub trait AttributeSink {
    fn add_attribute(&mut self, key: &str, value: &str);
}

impl AttributeSink for Vec<(String, String)> {
    fn add_attribute(&mut self, key: &str, value: &str) {
        self.push((key.to_string(), value.to_string()));
    }
}

impl AttributeSink for BTreeMap<String, String> {
    fn add_attribute(&mut self, key: &str, value: &str) {
        self.insert(key.to_string(), value.to_string());
    }
}

/// Table-driven toolkit that needs no native code generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinToolkit;

impl BackendToolkit for BuiltinToolkit {
    fn name(&self) -> &str {
        "builtin"
    }

    fn create_target_machine(
        &self,
        spec: &MachineSpec<'_>,
    ) -> std::result::Result<Box<dyn TargetMachine>, BackendError> {
        let data_layout =
            builtin_data_layout(spec.triple).ok_or_else(|| BackendError::NoTarget {
                triple: spec.triple.to_string(),
            })?;
        log::debug!(
            "builtin machine for {} (cpu {}, features {})",
            spec.triple,
            spec.cpu,
            spec.features
        );
        Ok(Box::new(BuiltinMachine {
            triple: spec.triple.clone(),
            cpu: spec.cpu.to_string(),
            features: spec.features.to_string(),
            data_layout,
        }))
    }
}

/// Target machine produced by [`BuiltinToolkit`].
#[derive(Debug, Clone)]
pub struct BuiltinMachine {
    triple: Triple,
    cpu: String,
    features: String,
    data_layout: String,
}

/// x86 feature ladder; a feature implies every entry before it.
const X86_LADDER: [&str; 7] = ["+sse", "+sse2", "+sse4.1", "+sse4.2", "+avx", "+avx2", "+avx512f"];

/// Intrinsic name prefix and the feature it needs.
const INTRINSIC_FEATURES: &[(&str, &str)] = &[
    ("llvm.x86.avx512.", "+avx512f"),
    ("llvm.x86.avx2.", "+avx2"),
    ("llvm.x86.avx.", "+avx"),
    ("llvm.x86.sse42.", "+sse4.2"),
    ("llvm.x86.sse41.", "+sse4.1"),
    ("llvm.x86.sse2.", "+sse2"),
    ("llvm.x86.sse.", "+sse"),
    ("llvm.x86.rdrand.", "+rdrnd"),
    ("llvm.x86.vcvtph2ps.", "+f16c"),
    ("llvm.x86.vcvtps2ph.", "+f16c"),
    ("llvm.aarch64.neon.", "+neon"),
    ("llvm.arm.neon.", "+neon"),
    ("llvm.wasm.", "+simd128"),
];

/// Target-independent intrinsic families every machine lowers.
const GENERIC_INTRINSICS: &[&str] = &[
    "llvm.fma.",
    "llvm.fmuladd.",
    "llvm.sqrt.",
    "llvm.fabs.",
    "llvm.minnum.",
    "llvm.maxnum.",
    "llvm.ctpop.",
    "llvm.ctlz.",
    "llvm.cttz.",
    "llvm.masked.load.",
    "llvm.masked.store.",
    "llvm.masked.gather.",
    "llvm.masked.scatter.",
    "llvm.prefetch",
    "llvm.sadd.sat.",
    "llvm.uadd.sat.",
    "llvm.ssub.sat.",
    "llvm.usub.sat.",
    "llvm.vector.reduce.",
];

impl BuiltinMachine {
    fn has_feature(&self, feature: &str) -> bool {
        let enabled = |f: &str| self.features.split(',').any(|have| have == f);
        if enabled(feature) {
            return true;
        }
        match X86_LADDER.iter().position(|f| *f == feature) {
            Some(rank) => X86_LADDER[rank + 1..].iter().any(|f| enabled(*f)),
            None => false,
        }
    }
}

impl TargetMachine for BuiltinMachine {
    fn triple(&self) -> &Triple {
        &self.triple
    }

    fn cpu(&self) -> &str {
        &self.cpu
    }

    fn features(&self) -> &str {
        &self.features
    }

    fn data_layout(&self) -> String {
        self.data_layout.clone()
    }

    fn has_intrinsic(&self, name: &str) -> bool {
        if GENERIC_INTRINSICS.iter().any(|p| name.starts_with(p)) {
            return true;
        }
        INTRINSIC_FEATURES
            .iter()
            .find(|(prefix, _)| name.starts_with(prefix))
            .is_some_and(|(_, feature)| self.has_feature(feature))
    }
}

/// Data-layout string for a triple, mirroring what LLVM reports.
pub fn builtin_data_layout(triple: &Triple) -> Option<String> {
    let mangling = if triple.is_apple() {
        "o"
    } else if triple.is_windows() {
        "w"
    } else {
        "e"
    };
    let layout = match triple.arch.as_str() {
        "x86_64" => format!(
            "e-m:{mangling}-p270:32:32-p271:32:32-p272:64:64-i64:64-i128:128-f80:128-n8:16:32:64-S128"
        ),
        "i686" if triple.is_windows() => {
            "e-m:x-p:32:32-p270:32:32-p271:32:32-p272:64:64-i64:64-i128:128-f80:128-n8:16:32-a:0:32-S32"
                .to_string()
        }
        "i686" => {
            "e-m:e-p:32:32-p270:32:32-p271:32:32-p272:64:64-i128:128-f64:32:64-f80:32-n8:16:32-S128"
                .to_string()
        }
        "aarch64" | "arm64" if triple.is_apple() => "e-m:o-i64:64-i128:128-n32:64-S128".to_string(),
        "aarch64" if triple.is_windows() => {
            "e-m:w-p:64:64-i32:32-i64:64-i128:128-n32:64-S128".to_string()
        }
        "aarch64" => "e-m:e-i8:8:32-i16:16:32-i64:64-i128:128-n32:64-S128".to_string(),
        "armv7" => "e-m:e-p:32:32-Fi8-i64:64-v128:64:128-a:0:32-n32-S64".to_string(),
        "wasm32" => "e-m:e-p:32:32-p10:8:8-p20:8:8-i64:64-n32:64-S128-ni:1:10:20".to_string(),
        "wasm64" => "e-m:e-p:64:64-p10:8:8-p20:8:8-i64:64-n32:64-S128-ni:1:10:20".to_string(),
        _ => return None,
    };
    Some(layout)
}
