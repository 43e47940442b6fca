//! The target descriptor.
//!
//! A [`Target`] is built from a [`TargetRequest`] and a backend toolkit.
//! Construction never panics and never returns early with an error: an
//! inconsistent request yields an invalid descriptor whose queries answer
//! with fixed defaults (see [`Target::is_valid`]). [`Target::create`] is the
//! fallible front door for callers that want a `Result`.
//!
//! Descriptors own backend handles and are not `Clone`. To duplicate one,
//! take its request with [`Target::describe`] and run construction again
//! with [`Target::reconstruct`].

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

use crate::backend::{AttributeSink, BackendToolkit, MachineSpec, TargetMachine};
use crate::capabilities::{self, Capabilities, IsaProfile};
use crate::cpu::{self, Cpu, NATIVE_CPU};
use crate::environment::{Arch, CallingConv, CodeModel, PicLevel, TargetOs, Triple};
use crate::error::{Result, TargetError};
use crate::isa::{Isa, IsaFamily, VectorTarget};
use crate::layout::{DataLayout, ScalarType, StructLayout};
use crate::warning::PerfWarning;

/// Prefix marking functions that use the regcall convention.
pub const REGCALL_PREFIX: &str = "__regcall3__";

/// Everything needed to construct a [`Target`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TargetRequest {
    /// Architecture; derived from the ISA family when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arch: Option<Arch>,
    /// CPU name, alias or `"native"`; the ISA's default CPU when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    pub target: VectorTarget,
    pub os: TargetOs,
    pub pic: PicLevel,
    pub code_model: CodeModel,
    /// Log a summary of the descriptor once it is built.
    pub print_target: bool,
}

impl Default for TargetRequest {
    fn default() -> Self {
        let isa = cpu::best_available_isa().unwrap_or(Isa::Sse2);
        TargetRequest::new(isa.default_target())
    }
}

impl TargetRequest {
    /// Request for `target` with every other parameter defaulted.
    pub fn new(target: VectorTarget) -> Self {
        Self {
            arch: None,
            cpu: None,
            target,
            os: TargetOs::host(),
            pic: PicLevel::Default,
            code_model: CodeModel::Default,
            print_target: false,
        }
    }

    pub fn with_arch(mut self, arch: Arch) -> Self {
        self.arch = Some(arch);
        self
    }

    pub fn with_cpu(mut self, cpu: impl Into<String>) -> Self {
        self.cpu = Some(cpu.into());
        self
    }

    pub fn with_os(mut self, os: TargetOs) -> Self {
        self.os = os;
        self
    }

    pub fn with_pic(mut self, pic: PicLevel) -> Self {
        self.pic = pic;
        self
    }

    pub fn with_code_model(mut self, code_model: CodeModel) -> Self {
        self.code_model = code_model;
        self
    }
}

/// The parts of a successfully constructed descriptor.
struct Resolved {
    cpu: &'static Cpu,
    profile: IsaProfile,
    triple: Triple,
    machine: Box<dyn TargetMachine>,
    data_layout: DataLayout,
}

/// One compilation target and its hardware capabilities.
#[derive(Debug)]
pub struct Target {
    request: TargetRequest,
    arch: Arch,
    cpu: String,
    profile: IsaProfile,
    triple: Option<Triple>,
    machine: Option<Box<dyn TargetMachine>>,
    data_layout: Option<DataLayout>,
    error: Option<TargetError>,
    warnings: AtomicU32,
}

fn resolve_cpu(request: &TargetRequest, isa: Isa, arch: Arch) -> Result<&'static Cpu> {
    match request.cpu.as_deref() {
        None => Ok(Cpu::default_for(isa, arch)),
        Some(NATIVE_CPU) => match Cpu::native(arch) {
            Some(cpu) => Ok(cpu),
            None => {
                log::debug!("no {arch} host CPU detected; using the default CPU for {isa}");
                Ok(Cpu::default_for(isa, arch))
            }
        },
        Some(name) => Cpu::lookup(name).ok_or_else(|| TargetError::UnknownCpu {
            cpu: name.to_string(),
            supported: cpu::supported_cpus(),
        }),
    }
}

fn resolve(request: &TargetRequest, arch: Arch, toolkit: &dyn BackendToolkit) -> Result<Resolved> {
    let target = request.target;
    let isa = target.isa();
    if arch.family() != isa.family() {
        return Err(TargetError::IncompatibleArch {
            arch: arch.to_string(),
            target: target.to_string(),
        });
    }

    let cpu = resolve_cpu(request, isa, arch)?;
    if !cpu.supports(isa, arch) {
        return Err(TargetError::IncompatibleCpu {
            cpu: cpu.name().to_string(),
            target: target.to_string(),
        });
    }

    let profile = capabilities::profile(target, cpu, arch);
    let triple = toolkit.triple(arch, request.os)?;
    let machine = toolkit.create_target_machine(&MachineSpec {
        triple: &triple,
        cpu: cpu.name(),
        features: &profile.features,
        pic: request.pic,
        code_model: request.code_model,
    })?;
    let data_layout = DataLayout::parse(&machine.data_layout())?;

    Ok(Resolved {
        cpu,
        profile,
        triple,
        machine,
        data_layout,
    })
}

impl Target {
    /// Construct a descriptor. Failures produce an invalid descriptor.
    pub fn new(request: TargetRequest, toolkit: &dyn BackendToolkit) -> Target {
        let arch = request
            .arch
            .unwrap_or_else(|| Arch::default_for(request.target.isa().family()));

        let target = match resolve(&request, arch, toolkit) {
            Ok(r) => {
                log::debug!(
                    "target {} on {} via {} ({})",
                    request.target,
                    r.cpu.name(),
                    toolkit.name(),
                    r.triple
                );
                Target {
                    arch,
                    cpu: r.cpu.name().to_string(),
                    profile: r.profile,
                    triple: Some(r.triple),
                    machine: Some(r.machine),
                    data_layout: Some(r.data_layout),
                    error: None,
                    warnings: AtomicU32::new(0),
                    request,
                }
            }
            Err(e) => {
                log::warn!("invalid target {}: {e}", request.target);
                Target {
                    arch,
                    cpu: request.cpu.clone().unwrap_or_default(),
                    profile: IsaProfile::degraded(request.target),
                    triple: None,
                    machine: None,
                    data_layout: None,
                    error: Some(e),
                    warnings: AtomicU32::new(0),
                    request,
                }
            }
        };
        if target.request.print_target {
            log::info!("{target}");
        }
        target
    }

    /// Construct a descriptor, turning an invalid one into its error.
    pub fn create(request: TargetRequest, toolkit: &dyn BackendToolkit) -> Result<Target> {
        let mut target = Target::new(request, toolkit);
        match target.error.take() {
            Some(e) => Err(e),
            None => Ok(target),
        }
    }

    /// The parameters this descriptor was built from.
    pub fn describe(&self) -> TargetRequest {
        self.request.clone()
    }

    /// Build a fresh, independent descriptor from the same parameters.
    pub fn reconstruct(&self, toolkit: &dyn BackendToolkit) -> Target {
        Target::new(self.describe(), toolkit)
    }

    /// Whether construction succeeded.
    ///
    /// On an invalid descriptor the vector geometry of the requested target
    /// is still reported, every capability is false, masking is not free,
    /// the triple and feature strings are empty, there is no machine or
    /// data layout, and no intrinsic is supported.
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }

    /// Why construction failed.
    pub fn error(&self) -> Option<&TargetError> {
        self.error.as_ref()
    }

    pub fn isa(&self) -> Isa {
        self.request.target.isa()
    }

    pub fn vector_target(&self) -> VectorTarget {
        self.request.target
    }

    pub fn arch(&self) -> Arch {
        self.arch
    }

    /// Resolved CPU name (the requested name when resolution failed).
    pub fn cpu(&self) -> &str {
        &self.cpu
    }

    pub fn os(&self) -> TargetOs {
        self.request.os
    }

    pub fn pic(&self) -> PicLevel {
        self.request.pic
    }

    pub fn code_model(&self) -> CodeModel {
        self.request.code_model
    }

    pub fn is_32bit(&self) -> bool {
        self.arch.is_32bit()
    }

    pub fn triple(&self) -> Option<&Triple> {
        self.triple.as_ref()
    }

    /// Triple as a string; empty when invalid.
    pub fn triple_string(&self) -> String {
        self.triple.as_ref().map(Triple::to_string).unwrap_or_default()
    }

    /// Backend feature string; empty when invalid.
    pub fn feature_string(&self) -> &str {
        &self.profile.features
    }

    pub fn target_machine(&self) -> Option<&dyn TargetMachine> {
        self.machine.as_deref()
    }

    pub fn data_layout(&self) -> Option<&DataLayout> {
        self.data_layout.as_ref()
    }

    pub fn native_vector_width(&self) -> u32 {
        self.profile.native_vector_width
    }

    pub fn native_vector_alignment(&self) -> u32 {
        self.profile.native_vector_alignment
    }

    pub fn data_type_width(&self) -> u32 {
        self.profile.data_type_width
    }

    /// Lanes per gang.
    pub fn vector_width(&self) -> u32 {
        self.profile.vector_width
    }

    pub fn mask_bit_count(&self) -> u32 {
        self.profile.mask_bit_count
    }

    pub fn masking_is_free(&self) -> bool {
        self.profile.masking_is_free
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.profile.capabilities
    }

    pub fn has_half_converts(&self) -> bool {
        self.profile.capabilities.half_converts
    }

    pub fn has_half_full_support(&self) -> bool {
        self.profile.capabilities.half_full_support
    }

    pub fn has_rand(&self) -> bool {
        self.profile.capabilities.rand
    }

    pub fn has_gather(&self) -> bool {
        self.profile.capabilities.gather
    }

    pub fn has_scatter(&self) -> bool {
        self.profile.capabilities.scatter
    }

    pub fn has_transcendentals(&self) -> bool {
        self.profile.capabilities.transcendentals
    }

    pub fn has_trigonometry(&self) -> bool {
        self.profile.capabilities.trigonometry
    }

    pub fn has_rsqrtd(&self) -> bool {
        self.profile.capabilities.rsqrtd
    }

    pub fn has_rcpd(&self) -> bool {
        self.profile.capabilities.rcpd
    }

    pub fn has_vec_prefetch(&self) -> bool {
        self.profile.capabilities.vector_prefetch
    }

    pub fn has_saturating_arithmetic(&self) -> bool {
        self.profile.capabilities.saturating_arithmetic
    }

    pub fn has_fp16_support(&self) -> bool {
        self.profile.capabilities.fp16
    }

    pub fn has_fp64_support(&self) -> bool {
        self.profile.capabilities.fp64
    }

    pub fn has_conflict_detection(&self) -> bool {
        self.profile.capabilities.conflict_detection
    }

    pub fn has_intel_vnni(&self) -> bool {
        self.profile.capabilities.intel_vnni
    }

    pub fn has_intel_vnni_int8(&self) -> bool {
        self.profile.capabilities.intel_vnni_int8
    }

    pub fn has_intel_vnni_int16(&self) -> bool {
        self.profile.capabilities.intel_vnni_int16
    }

    pub fn has_arm_dot_product(&self) -> bool {
        self.profile.capabilities.arm_dot_product
    }

    pub fn has_arm_i8mm(&self) -> bool {
        self.profile.capabilities.arm_i8mm
    }

    pub fn has_fma(&self) -> bool {
        self.profile.capabilities.fma
    }

    /// Symbol suffix distinguishing code compiled for this target,
    /// e.g. `avx2_i32x8` or `avx102_x16`.
    pub fn target_suffix(&self) -> String {
        self.request.target.name().replace('-', "_").replace('.', "")
    }

    /// Lower-case ISA name used in mangled symbols.
    pub fn isa_string(&self) -> String {
        self.isa().isa_string()
    }

    /// Calling convention for exported functions.
    pub fn calling_convention(&self) -> CallingConv {
        if self.isa().family() == IsaFamily::X86 && self.os() == TargetOs::Windows {
            CallingConv::X86VectorCall
        } else {
            CallingConv::Default
        }
    }

    /// Prepend the regcall marker to a function name.
    pub fn mark_func_name_with_regcall_prefix(name: &str) -> String {
        format!("{REGCALL_PREFIX}{name}")
    }

    /// Target-specific attributes to attach to every generated function.
    ///
    /// With `limit_zmm`, wide AVX-512 targets are told to stay in 256-bit
    /// registers.
    pub fn function_attributes(&self, limit_zmm: bool) -> Vec<(String, String)> {
        if !self.is_valid() {
            return Vec::new();
        }
        let mut attrs = vec![
            ("target-cpu".to_string(), self.cpu.clone()),
            ("target-features".to_string(), self.profile.features.clone()),
        ];
        if self.isa().is_avx512() && self.vector_width() >= 16 {
            let width = if limit_zmm { "256" } else { "512" };
            attrs.push(("prefer-vector-width".to_string(), width.to_string()));
            attrs.push(("min-legal-vector-width".to_string(), width.to_string()));
        }
        attrs
    }

    /// Push [`Target::function_attributes`] into a backend sink.
    pub fn mark_function(&self, sink: &mut dyn AttributeSink, limit_zmm: bool) {
        for (key, value) in self.function_attributes(limit_zmm) {
            sink.add_attribute(&key, &value);
        }
    }

    /// Whether a backend intrinsic can be used on this target.
    ///
    /// An unsupported intrinsic is an expected outcome; callers fall back
    /// to an emulated sequence.
    pub fn check_intrinsic_support(&self, name: &str) -> bool {
        let Some(machine) = self.machine.as_deref() else {
            return false;
        };
        let family_prefixes: &[(&str, IsaFamily)] = &[
            ("llvm.x86.", IsaFamily::X86),
            ("llvm.arm.", IsaFamily::Arm),
            ("llvm.aarch64.", IsaFamily::Arm),
            ("llvm.wasm.", IsaFamily::Wasm),
        ];
        let family_ok = family_prefixes
            .iter()
            .find(|(prefix, _)| name.starts_with(prefix))
            .map_or(true, |(prefix, family)| {
                *family == self.isa().family()
                    && match *prefix {
                        "llvm.arm." => self.arch == Arch::Arm,
                        "llvm.aarch64." => self.arch == Arch::Aarch64,
                        _ => true,
                    }
            });
        let supported = family_ok && machine.has_intrinsic(name);
        if !supported {
            log::debug!("intrinsic {name} is not supported on {}", self.request.target);
        }
        supported
    }

    /// Storage size of a scalar type; `None` when invalid.
    pub fn size_of(&self, ty: ScalarType) -> Option<u64> {
        self.data_layout.as_ref().map(|dl| dl.size_of(ty))
    }

    /// Field offsets of a struct; `None` when invalid.
    pub fn struct_layout(&self, fields: &[ScalarType]) -> Option<StructLayout> {
        self.data_layout.as_ref().map(|dl| dl.struct_layout(fields))
    }

    /// Performance warnings that apply on this target.
    pub fn relevant_warnings(&self) -> PerfWarning {
        self.profile.relevant_warnings
    }

    pub fn is_relevant(&self, kind: PerfWarning) -> bool {
        self.profile.relevant_warnings.contains(kind)
    }

    /// Record that `kind` has been reported for this target.
    pub fn set_warning(&self, kind: PerfWarning) {
        self.warnings.fetch_or(kind.bits(), Ordering::Relaxed);
    }

    /// Whether `kind` has already been reported.
    pub fn should_warn(&self, kind: PerfWarning) -> bool {
        self.raised_warnings().contains(kind)
    }

    /// Every kind reported so far.
    pub fn raised_warnings(&self) -> PerfWarning {
        PerfWarning::from_bits_truncate(self.warnings.load(Ordering::Relaxed))
    }

    /// Claim the right to report `kind`: true exactly once per target, and
    /// only for relevant kinds.
    pub fn take_warning(&self, kind: PerfWarning) -> bool {
        if !self.is_relevant(kind) {
            return false;
        }
        let before = self.warnings.fetch_or(kind.bits(), Ordering::Relaxed);
        !PerfWarning::from_bits_truncate(before).contains(kind)
    }

    /// Serializable snapshot of the descriptor.
    pub fn summary(&self) -> TargetSummary {
        TargetSummary {
            valid: self.is_valid(),
            error: self.error.as_ref().map(ToString::to_string),
            target: self.request.target.name().to_string(),
            isa: self.isa().as_str().to_string(),
            arch: self.arch,
            cpu: self.cpu.clone(),
            os: self.request.os,
            triple: self.triple_string(),
            suffix: self.target_suffix(),
            profile: self.profile.clone(),
            data_layout: self.data_layout.as_ref().map(|dl| dl.as_str().to_string()),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} x{}) on {} [{}]",
            self.request.target,
            self.isa(),
            self.vector_width(),
            if self.cpu.is_empty() { "?" } else { self.cpu.as_str() },
            self.arch
        )?;
        match (&self.triple, &self.error) {
            (Some(triple), _) => write!(f, " {triple}"),
            (None, Some(e)) => write!(f, " invalid: {e}"),
            (None, None) => Ok(()),
        }
    }
}

/// Machine-readable description of a [`Target`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct TargetSummary {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub target: String,
    pub isa: String,
    pub arch: Arch,
    pub cpu: String,
    pub os: TargetOs,
    pub triple: String,
    pub suffix: String,
    #[serde(flatten)]
    pub profile: IsaProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_layout: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BuiltinToolkit;
    use crate::error::BackendError;

    fn request(target: &str) -> TargetRequest {
        TargetRequest::new(target.parse().unwrap()).with_os(TargetOs::Linux)
    }

    fn build(req: TargetRequest) -> Target {
        Target::new(req, &BuiltinToolkit)
    }

    #[derive(Debug)]
    struct RefusingToolkit;

    impl BackendToolkit for RefusingToolkit {
        fn name(&self) -> &str {
            "refusing"
        }

        fn create_target_machine(
            &self,
            spec: &MachineSpec<'_>,
        ) -> std::result::Result<Box<dyn TargetMachine>, BackendError> {
            Err(BackendError::MachineCreation {
                triple: spec.triple.to_string(),
                cpu: spec.cpu.to_string(),
                message: "no code generator".into(),
            })
        }
    }

    #[test]
    fn valid_avx2_target() {
        let t = build(request("avx2-i32x8"));
        assert!(t.is_valid(), "{:?}", t.error());
        assert_eq!(t.cpu(), "haswell");
        assert_eq!(t.arch(), Arch::X86_64);
        assert_eq!(t.vector_width(), 8);
        assert!(t.has_gather());
        assert!(!t.has_scatter());
        assert_eq!(t.triple_string(), "x86_64-unknown-linux-gnu");
        assert_eq!(t.size_of(ScalarType::Ptr), Some(8));
        assert!(t.target_machine().is_some());
    }

    #[test]
    fn unknown_cpu_gives_invalid_descriptor_with_defaults() {
        let t = build(request("avx512skx-x16").with_cpu("pentium-pro"));
        assert!(!t.is_valid());
        assert!(matches!(t.error(), Some(TargetError::UnknownCpu { .. })));
        assert!(!t.has_gather());
        assert!(!t.has_scatter());
        assert!(!t.masking_is_free());
        assert_eq!(t.vector_width(), 16);
        assert_eq!(t.mask_bit_count(), 1);
        assert_eq!(t.cpu(), "pentium-pro");
        assert_eq!(t.triple_string(), "");
        assert_eq!(t.feature_string(), "");
        assert!(t.target_machine().is_none());
        assert!(t.data_layout().is_none());
        assert!(t.function_attributes(false).is_empty());
        assert!(!t.check_intrinsic_support("llvm.masked.gather.v16i32.v16p0"));
    }

    #[test]
    fn incompatible_cpu_and_arch() {
        let t = build(request("avx512skx-x16").with_cpu("haswell"));
        assert!(matches!(t.error(), Some(TargetError::IncompatibleCpu { .. })));
        let t = build(request("neon-i32x4").with_arch(Arch::X86_64));
        assert!(matches!(t.error(), Some(TargetError::IncompatibleArch { .. })));
        let t = build(request("avx2-i32x8").with_os(TargetOs::Ios));
        assert!(matches!(t.error(), Some(TargetError::UnsupportedOs { .. })));
    }

    #[test]
    fn toolkit_refusal_invalidates() {
        let t = Target::new(request("sse4.2-i32x4"), &RefusingToolkit);
        assert!(!t.is_valid());
        assert!(matches!(t.error(), Some(TargetError::Backend(_))));
        assert!(Target::create(request("sse4.2-i32x4"), &RefusingToolkit).is_err());
        assert!(Target::create(request("sse4.2-i32x4"), &BuiltinToolkit).is_ok());
    }

    #[test]
    fn suffixes_are_stable() {
        assert_eq!(build(request("avx2-i32x8")).target_suffix(), "avx2_i32x8");
        assert_eq!(build(request("sse4.1-i32x4")).target_suffix(), "sse41_i32x4");
        assert_eq!(build(request("avx10.2-x16")).target_suffix(), "avx102_x16");
        assert_eq!(build(request("avx10.2-x16")).isa_string(), "avx102");
    }

    #[test]
    fn warnings_are_independent_bits() {
        let t = build(request("sse2-i32x4"));
        for kind in PerfWarning::all().iter() {
            assert!(!t.should_warn(kind));
        }
        t.set_warning(PerfWarning::DIV_MOD_INT);
        assert!(t.should_warn(PerfWarning::DIV_MOD_INT));
        assert!(!t.should_warn(PerfWarning::CVT_UINT_FLOAT));
        assert!(!t.should_warn(PerfWarning::VARIABLE_SHIFT_RIGHT));
    }

    #[test]
    fn take_warning_fires_once_for_relevant_kinds() {
        let t = build(request("avx512skx-x16"));
        assert!(!t.take_warning(PerfWarning::CVT_UINT_FLOAT));
        assert!(t.take_warning(PerfWarning::DIV_MOD_INT));
        assert!(!t.take_warning(PerfWarning::DIV_MOD_INT));
        assert_eq!(t.raised_warnings(), PerfWarning::DIV_MOD_INT);
    }

    #[test]
    fn describe_and_reconstruct() {
        let t = build(request("neon-i16x8").with_cpu("cortex-a76"));
        t.set_warning(PerfWarning::DIV_MOD_INT);
        let copy = t.reconstruct(&BuiltinToolkit);
        assert_eq!(copy.describe(), t.describe());
        assert_eq!(copy.capabilities(), t.capabilities());
        assert!(!copy.should_warn(PerfWarning::DIV_MOD_INT));
    }

    #[test]
    fn zmm_attributes() {
        let t = build(request("avx512skx-x16"));
        let attrs = t.function_attributes(false);
        assert!(attrs.contains(&("prefer-vector-width".into(), "512".into())));
        let attrs = t.function_attributes(true);
        assert!(attrs.contains(&("min-legal-vector-width".into(), "256".into())));
        let t = build(request("avx512skx-x8"));
        assert_eq!(t.function_attributes(false).len(), 2);
    }

    #[test]
    fn mark_function_fills_sink() {
        let t = build(request("avx2-i32x8"));
        let mut sink: Vec<(String, String)> = Vec::new();
        t.mark_function(&mut sink, false);
        assert_eq!(sink[0], ("target-cpu".into(), "haswell".into()));
    }

    #[test]
    fn intrinsic_family_gate() {
        let t = build(request("avx2-i32x8"));
        assert!(t.check_intrinsic_support("llvm.x86.avx2.gather.d.d.256"));
        assert!(!t.check_intrinsic_support("llvm.aarch64.neon.sdot"));
        assert!(!t.check_intrinsic_support("llvm.x86.avx512.mask.compress.d.512"));
        let t = build(request("neon-i32x4").with_arch(Arch::Aarch64));
        assert!(t.check_intrinsic_support("llvm.aarch64.neon.sdot.v4i32.v16i8"));
        assert!(!t.check_intrinsic_support("llvm.arm.neon.vpadd"));
    }

    #[test]
    fn calling_conventions_and_regcall() {
        let t = build(request("avx2-i32x8").with_os(TargetOs::Windows));
        assert_eq!(t.calling_convention(), CallingConv::X86VectorCall);
        let t = build(request("avx2-i32x8"));
        assert_eq!(t.calling_convention(), CallingConv::Default);
        assert_eq!(Target::mark_func_name_with_regcall_prefix("f"), "__regcall3__f");
    }

    #[test]
    fn summary_serializes() {
        let t = build(request("wasm-i32x4").with_os(TargetOs::Web));
        assert!(t.is_valid(), "{:?}", t.error());
        let json = serde_json::to_value(t.summary()).unwrap();
        assert_eq!(json["triple"], "wasm32-unknown-unknown");
        assert_eq!(json["vector-width"], 4);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn request_round_trips_through_json() {
        let req = request("avx2-i16x16").with_cpu("znver3").with_pic(PicLevel::BigPic);
        let json = serde_json::to_string(&req).unwrap();
        let back: TargetRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn request_reads_from_owned_toml() {
        let text = ["target = \"avx512skx-x16\"", "cpu = \"skx\"", "os = \"linux\""].join("\n");
        let req: TargetRequest = toml::from_str(&text).unwrap();
        assert_eq!(req.target.name(), "avx512skx-x16");
        assert_eq!(req.cpu.as_deref(), Some("skx"));
        assert!(build(req).is_valid());
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn descriptor_is_shareable_across_threads() {
        assert_send_sync::<Target>();

        let t = build(request("avx512skx-x16"));
        let first = std::sync::atomic::AtomicUsize::new(0);
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    assert!(t.has_gather());
                    assert_eq!(t.vector_width(), 16);
                    if t.take_warning(PerfWarning::DIV_MOD_INT) {
                        first.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert!(t.should_warn(PerfWarning::DIV_MOD_INT));
    }

    #[test]
    fn native_cpu_on_the_host_isa() {
        let Some(isa) = cpu::best_available_isa() else {
            return;
        };
        let req = TargetRequest::new(isa.default_target())
            .with_os(TargetOs::Linux)
            .with_cpu(NATIVE_CPU);
        let t = build(req);
        assert!(t.is_valid(), "{:?}", t.error());
        let resolved = Cpu::lookup(t.cpu()).unwrap();
        assert!(resolved.supports(isa, t.arch()));
        assert_ne!(t.cpu(), NATIVE_CPU);
    }

    #[test]
    fn native_cpu_for_a_foreign_family_uses_the_default() {
        let foreign = match cpu::best_available_isa().map(Isa::family) {
            Some(IsaFamily::Arm) => "sse4.2-i32x4",
            _ => "neon-i32x4",
        };
        let req = request(foreign).with_cpu(NATIVE_CPU);
        let isa = req.target.isa();
        let arch = Arch::default_for(isa.family());
        let t = build(req);
        assert!(t.is_valid(), "{:?}", t.error());
        assert_eq!(t.cpu(), Cpu::default_for(isa, arch).name());
    }
}
