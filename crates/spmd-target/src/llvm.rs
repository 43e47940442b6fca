//! LLVM-backed toolkit built on inkwell.

use std::sync::{Mutex, PoisonError};

use inkwell::intrinsics::Intrinsic;
use inkwell::targets::{self, InitializationConfig, RelocMode, Target, TargetTriple};
use inkwell::OptimizationLevel;

use crate::backend::{BackendToolkit, MachineSpec, TargetMachine};
use crate::environment::{CodeModel, PicLevel, Triple};
use crate::error::BackendError;

/// Toolkit that asks LLVM for target machines.
#[derive(Debug, Default)]
pub struct LlvmToolkit;

impl LlvmToolkit {
    pub fn new() -> Self {
        Self
    }
}

fn init_target(triple: &Triple) {
    let config = InitializationConfig::default();
    match triple.arch.as_str() {
        "x86_64" | "i686" => Target::initialize_x86(&config),
        "aarch64" | "arm64" => Target::initialize_aarch64(&config),
        "armv7" => Target::initialize_arm(&config),
        "wasm32" | "wasm64" => Target::initialize_webassembly(&config),
        _ => Target::initialize_all(&config),
    }
}

fn reloc_mode(pic: PicLevel) -> RelocMode {
    match pic {
        PicLevel::Default => RelocMode::Default,
        PicLevel::NotPic => RelocMode::Static,
        PicLevel::SmallPic | PicLevel::BigPic => RelocMode::PIC,
    }
}

fn code_model(model: CodeModel) -> targets::CodeModel {
    match model {
        CodeModel::Default => targets::CodeModel::Default,
        CodeModel::Small => targets::CodeModel::Small,
        CodeModel::Large => targets::CodeModel::Large,
    }
}

impl BackendToolkit for LlvmToolkit {
    fn name(&self) -> &str {
        "llvm"
    }

    fn create_target_machine(
        &self,
        spec: &MachineSpec<'_>,
    ) -> Result<Box<dyn TargetMachine>, BackendError> {
        init_target(spec.triple);
        let triple_str = spec.triple.to_string();
        let llvm_triple = TargetTriple::create(&triple_str);
        let target = Target::from_triple(&llvm_triple).map_err(|_| BackendError::NoTarget {
            triple: triple_str.clone(),
        })?;
        let machine = target
            .create_target_machine(
                &llvm_triple,
                spec.cpu,
                spec.features,
                OptimizationLevel::Aggressive,
                reloc_mode(spec.pic),
                code_model(spec.code_model),
            )
            .ok_or_else(|| BackendError::MachineCreation {
                triple: triple_str,
                cpu: spec.cpu.to_string(),
                message: "LLVM returned no target machine".into(),
            })?;
        Ok(Box::new(LlvmMachine {
            triple: spec.triple.clone(),
            cpu: spec.cpu.to_string(),
            features: spec.features.to_string(),
            machine: Mutex::new(OwnedMachine(machine)),
        }))
    }
}

/// Sole owner of an `LLVMTargetMachineRef`.
#[derive(Debug)]
struct OwnedMachine(targets::TargetMachine);

// SAFETY: the handle is never aliased and LLVM target machines carry no
// thread affinity. Every access goes through the `Mutex` in `LlvmMachine`.
unsafe impl Send for OwnedMachine {}

/// A target machine owned by LLVM.
#[derive(Debug)]
pub struct LlvmMachine {
    triple: Triple,
    cpu: String,
    features: String,
    machine: Mutex<OwnedMachine>,
}

impl TargetMachine for LlvmMachine {
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
        let machine = self.machine.lock().unwrap_or_else(PoisonError::into_inner);
        machine
            .0
            .get_target_data()
            .get_data_layout()
            .as_str()
            .to_string_lossy()
            .into_owned()
    }

    fn has_intrinsic(&self, name: &str) -> bool {
        Intrinsic::find(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{Arch, TargetOs};
    use crate::layout::DataLayout;

    #[test]
    fn x86_64_machine_reports_layout() {
        let triple = Triple::derive(Arch::X86_64, TargetOs::Linux).unwrap();
        let machine = LlvmToolkit::new()
            .create_target_machine(&MachineSpec {
                triple: &triple,
                cpu: "haswell",
                features: "+avx2,+fma",
                pic: PicLevel::Default,
                code_model: CodeModel::Default,
            })
            .unwrap();
        let dl = DataLayout::parse(&machine.data_layout()).unwrap();
        assert_eq!(dl.pointer_bits, 64);
        assert!(machine.has_intrinsic("llvm.x86.avx2.permd"));
    }

    #[test]
    fn machine_is_shareable_across_threads() {
        let triple = Triple::derive(Arch::X86_64, TargetOs::Linux).unwrap();
        let machine = LlvmToolkit::new()
            .create_target_machine(&MachineSpec {
                triple: &triple,
                cpu: "skylake",
                features: "+avx2",
                pic: PicLevel::Default,
                code_model: CodeModel::Default,
            })
            .unwrap();
        let layouts: Vec<String> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4).map(|_| s.spawn(|| machine.data_layout())).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(layouts.windows(2).all(|w| w[0] == w[1]));
    }
}
