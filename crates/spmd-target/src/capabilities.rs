//! Static ISA capability table.
//!
//! Maps a [`VectorTarget`] (refined by the CPU and architecture) to its
//! vector geometry, mask representation, backend feature string and the set
//! of hardware capability flags.

use serde::Serialize;

use crate::cpu::{Cpu, CpuFeatures};
use crate::environment::Arch;
use crate::isa::{Isa, IsaFamily, VectorTarget};
use crate::warning::PerfWarning;

/// Hardware capability flags of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Capabilities {
    /// Native float16 <-> float32 conversion.
    pub half_converts: bool,
    /// Native float16 arithmetic.
    pub half_full_support: bool,
    /// Hardware random number generation.
    pub rand: bool,
    pub gather: bool,
    pub scatter: bool,
    /// Native exp/log/pow approximations.
    pub transcendentals: bool,
    /// Native sin/cos/tan.
    pub trigonometry: bool,
    /// Double-precision reciprocal square root estimate.
    pub rsqrtd: bool,
    /// Double-precision reciprocal estimate.
    pub rcpd: bool,
    pub vector_prefetch: bool,
    pub saturating_arithmetic: bool,
    /// float16 is a usable storage and compute type.
    pub fp16: bool,
    /// Vector double-precision arithmetic.
    pub fp64: bool,
    pub conflict_detection: bool,
    pub intel_vnni: bool,
    pub intel_vnni_int8: bool,
    pub intel_vnni_int16: bool,
    pub arm_dot_product: bool,
    pub arm_i8mm: bool,
    pub fma: bool,
}

/// Everything the capability table knows about one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct IsaProfile {
    /// Lanes that fit in one hardware register.
    pub native_vector_width: u32,
    /// Alignment in bytes of a native vector.
    pub native_vector_alignment: u32,
    /// Width in bits of the element type the target is tuned for.
    pub data_type_width: u32,
    /// Lanes per gang; a multiple of the native width.
    pub vector_width: u32,
    /// Bits per lane in the mask representation.
    pub mask_bit_count: u32,
    /// Whether the ISA has predicate registers.
    pub masking_is_free: bool,
    /// Backend feature string (`+avx2,+fma,...`).
    pub features: String,
    pub capabilities: Capabilities,
    /// Performance warnings that apply on this target.
    pub relevant_warnings: PerfWarning,
}

impl IsaProfile {
    /// The geometry of `target` with every capability switched off.
    ///
    /// Used for descriptors whose construction failed.
    pub fn degraded(target: VectorTarget) -> Self {
        let (native_vector_width, native_vector_alignment) = native_geometry(target);
        Self {
            native_vector_width,
            native_vector_alignment,
            data_type_width: target.element_bits(),
            vector_width: target.lanes(),
            mask_bit_count: mask_bits(target),
            masking_is_free: false,
            features: String::new(),
            capabilities: Capabilities::default(),
            relevant_warnings: PerfWarning::empty(),
        }
    }
}

fn register_bits(isa: Isa) -> u32 {
    match isa {
        Isa::Avx | Isa::Avx2 | Isa::Avx2Vnni => 256,
        isa if isa.is_avx512() => 512,
        _ => 128,
    }
}

fn native_geometry(target: VectorTarget) -> (u32, u32) {
    let per_register = register_bits(target.isa()) / target.element_bits();
    let width = target.lanes().min(per_register);
    (width, width * target.element_bits() / 8)
}

fn mask_bits(target: VectorTarget) -> u32 {
    if target.isa().is_avx512() {
        1
    } else {
        target.element_bits()
    }
}

const SSE41_FEATURES: &str = "+sse,+sse2,+sse3,+ssse3,+sse4.1";
const SSE42_FEATURES: &str = "+sse,+sse2,+sse3,+ssse3,+sse4.1,+sse4.2,+popcnt";
const AVX2_FEATURES: &str = "+avx,+avx2,+popcnt,+cmov,+f16c,+fma";
const SKX_FEATURES: &str =
    "+avx512f,+avx512cd,+avx512dq,+avx512bw,+avx512vl,+fma,+f16c,+popcnt,+cmov";
const ICL_EXTRA: &str = "+avx512vnni,+avx512vbmi,+avx512vbmi2,+avx512bitalg,+avx512vpopcntdq";
const SPR_EXTRA: &str = "+avx512bf16,+avx512fp16,+amx-int8,+amx-bf16,+avxvnni";

fn feature_string(isa: Isa, cpu: &Cpu, arch: Arch) -> String {
    let base = match isa {
        Isa::Sse2 => "+sse,+sse2".to_string(),
        Isa::Sse41 => SSE41_FEATURES.to_string(),
        Isa::Sse42 => SSE42_FEATURES.to_string(),
        Isa::Avx => "+avx,+popcnt,+cmov".to_string(),
        Isa::Avx2 => AVX2_FEATURES.to_string(),
        Isa::Avx2Vnni => format!("{AVX2_FEATURES},+avxvnni"),
        Isa::Avx512Knl => "+avx512f,+avx512pf,+avx512er,+avx512cd,+fma,+f16c,+popcnt,+cmov".into(),
        Isa::Avx512Skx => SKX_FEATURES.to_string(),
        Isa::Avx512Icl => format!("{SKX_FEATURES},{ICL_EXTRA}"),
        Isa::Avx512Spr => format!("{SKX_FEATURES},{ICL_EXTRA},{SPR_EXTRA}"),
        Isa::Avx10_2 => format!(
            "{SKX_FEATURES},{ICL_EXTRA},{SPR_EXTRA},+avx10.2-512,+avxvnniint8,+avxvnniint16"
        ),
        Isa::Neon if arch == Arch::Arm => "+neon,+fp16".to_string(),
        Isa::Neon => {
            let mut s = String::from("+neon");
            if cpu.features().contains(CpuFeatures::FP16) {
                s.push_str(",+fullfp16");
            }
            if cpu.features().contains(CpuFeatures::DOTPROD) {
                s.push_str(",+dotprod");
            }
            if cpu.features().contains(CpuFeatures::I8MM) {
                s.push_str(",+i8mm");
            }
            s
        }
        Isa::Wasm => "+simd128".to_string(),
    };
    if isa.family() == IsaFamily::X86
        && isa >= Isa::Avx
        && cpu.features().contains(CpuFeatures::RDRAND)
    {
        format!("{base},+rdrnd")
    } else {
        base
    }
}

fn capabilities(target: VectorTarget, cpu: &Cpu, arch: Arch) -> Capabilities {
    let isa = target.isa();
    let features = cpu.features();
    let x86 = isa.family() == IsaFamily::X86;
    let avx2_or_later = x86 && isa >= Isa::Avx2;
    let avx512 = isa.is_avx512();
    let a64_neon = isa == Isa::Neon && arch == Arch::Aarch64;

    let half_converts = (x86 && isa == Isa::Avx && features.contains(CpuFeatures::F16C))
        || avx2_or_later
        || isa == Isa::Neon;
    let half_full_support = matches!(isa, Isa::Avx512Spr | Isa::Avx10_2)
        || (a64_neon && features.contains(CpuFeatures::FP16));

    Capabilities {
        half_converts,
        half_full_support,
        rand: x86 && isa >= Isa::Avx && features.contains(CpuFeatures::RDRAND),
        gather: avx2_or_later,
        scatter: avx512,
        transcendentals: isa == Isa::Avx512Knl,
        trigonometry: false,
        rsqrtd: avx512 || a64_neon,
        rcpd: avx512 || a64_neon,
        vector_prefetch: isa == Isa::Avx512Knl,
        saturating_arithmetic: (x86 && target.element_bits() <= 16) || isa == Isa::Neon,
        fp16: half_converts || half_full_support,
        fp64: x86 || a64_neon || isa == Isa::Wasm,
        conflict_detection: avx512,
        intel_vnni: matches!(
            isa,
            Isa::Avx2Vnni | Isa::Avx512Icl | Isa::Avx512Spr | Isa::Avx10_2
        ),
        intel_vnni_int8: isa == Isa::Avx10_2 && features.contains(CpuFeatures::VNNI_INT8),
        intel_vnni_int16: isa == Isa::Avx10_2 && features.contains(CpuFeatures::VNNI_INT16),
        arm_dot_product: a64_neon && features.contains(CpuFeatures::DOTPROD),
        arm_i8mm: a64_neon && features.contains(CpuFeatures::I8MM),
        fma: avx2_or_later || a64_neon,
    }
}

fn relevant_warnings(isa: Isa) -> PerfWarning {
    match isa {
        Isa::Sse2 | Isa::Sse41 | Isa::Sse42 => {
            PerfWarning::CVT_UINT_FLOAT
                | PerfWarning::DIV_MOD_INT
                | PerfWarning::VARIABLE_SHIFT_RIGHT
        }
        Isa::Avx => PerfWarning::CVT_UINT_FLOAT | PerfWarning::DIV_MOD_INT,
        Isa::Avx2 | Isa::Avx2Vnni => {
            PerfWarning::CVT_UINT_FLOAT | PerfWarning::CVT_UINT_FLOAT16 | PerfWarning::DIV_MOD_INT
        }
        _ => PerfWarning::DIV_MOD_INT,
    }
}

/// Look up the full capability profile of `target` on `cpu` and `arch`.
///
/// The caller is responsible for checking that the CPU supports the ISA.
pub fn profile(target: VectorTarget, cpu: &Cpu, arch: Arch) -> IsaProfile {
    let isa = target.isa();
    IsaProfile {
        masking_is_free: isa.is_avx512(),
        features: feature_string(isa, cpu, arch),
        capabilities: capabilities(target, cpu, arch),
        relevant_warnings: relevant_warnings(isa),
        ..IsaProfile::degraded(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(target: &str, cpu: &str, arch: Arch) -> IsaProfile {
        let target: VectorTarget = target.parse().unwrap();
        profile(target, Cpu::lookup(cpu).unwrap(), arch)
    }

    #[test]
    fn sse_geometry() {
        let p = lookup("sse4.2-i32x8", "nehalem", Arch::X86_64);
        assert_eq!(p.native_vector_width, 4);
        assert_eq!(p.vector_width, 8);
        assert_eq!(p.native_vector_alignment, 16);
        assert_eq!(p.mask_bit_count, 32);
        assert!(!p.masking_is_free);
        assert!(!p.capabilities.gather);

        let p = lookup("sse4.1-i8x16", "penryn", Arch::X86_64);
        assert_eq!(p.native_vector_width, 16);
        assert_eq!(p.mask_bit_count, 8);
        assert!(p.capabilities.saturating_arithmetic);
    }

    #[test]
    fn avx2_has_gather_but_not_scatter() {
        let p = lookup("avx2-i32x8", "haswell", Arch::X86_64);
        assert_eq!(p.native_vector_width, 8);
        assert_eq!(p.native_vector_alignment, 32);
        assert!(p.capabilities.gather);
        assert!(!p.capabilities.scatter);
        assert!(p.capabilities.fma);
        assert!(p.capabilities.rand);
        assert!(p.features.contains("+avx2"));
        assert!(p.features.ends_with("+rdrnd"));
    }

    #[test]
    fn avx512_masks_are_free() {
        let p = lookup("avx512skx-x16", "skx", Arch::X86_64);
        assert!(p.masking_is_free);
        assert_eq!(p.mask_bit_count, 1);
        assert_eq!(p.native_vector_alignment, 64);
        assert!(p.capabilities.scatter);
        assert!(p.capabilities.conflict_detection);
        assert!(!p.capabilities.intel_vnni);

        let p = lookup("avx512skx-x4", "skx", Arch::X86_64);
        assert_eq!(p.native_vector_width, 4);

        let p = lookup("avx512icl-x64", "icl", Arch::X86_64);
        assert_eq!(p.native_vector_width, 64);
        assert!(p.capabilities.intel_vnni);
    }

    #[test]
    fn knl_extras() {
        let p = lookup("avx512knl-x16", "knl", Arch::X86_64);
        assert!(p.capabilities.transcendentals);
        assert!(p.capabilities.vector_prefetch);
        assert!(p.capabilities.rsqrtd);
    }

    #[test]
    fn avx10_vnni_variants() {
        let p = lookup("avx10.2-x16", "dmr", Arch::X86_64);
        assert!(p.capabilities.intel_vnni_int8);
        assert!(p.capabilities.intel_vnni_int16);
        assert!(p.capabilities.half_full_support);
    }

    #[test]
    fn neon_depends_on_cpu_and_arch() {
        let p = lookup("neon-i32x4", "cortex-a76", Arch::Aarch64);
        assert!(p.capabilities.arm_dot_product);
        assert!(p.capabilities.half_full_support);
        assert!(p.capabilities.fp64);
        assert!(p.features.contains("+dotprod"));

        let p = lookup("neon-i32x4", "cortex-a57", Arch::Aarch64);
        assert!(!p.capabilities.arm_dot_product);

        let p = lookup("neon-i32x4", "cortex-a9", Arch::Arm);
        assert!(!p.capabilities.fp64);
        assert!(!p.capabilities.fma);
        assert_eq!(p.features, "+neon,+fp16");
    }

    #[test]
    fn relevant_warnings_per_family() {
        let sse = lookup("sse2-i32x4", "core2", Arch::X86_64);
        assert!(sse.relevant_warnings.contains(PerfWarning::VARIABLE_SHIFT_RIGHT));
        let avx2 = lookup("avx2-i32x8", "haswell", Arch::X86_64);
        assert!(avx2.relevant_warnings.contains(PerfWarning::CVT_UINT_FLOAT16));
        assert!(!avx2.relevant_warnings.contains(PerfWarning::VARIABLE_SHIFT_RIGHT));
        let wasm = lookup("wasm-i32x4", "generic", Arch::Wasm32);
        assert_eq!(wasm.relevant_warnings, PerfWarning::DIV_MOD_INT);
    }

    #[test]
    fn degraded_keeps_geometry_only() {
        let target: VectorTarget = "avx512skx-x16".parse().unwrap();
        let p = IsaProfile::degraded(target);
        assert_eq!(p.vector_width, 16);
        assert_eq!(p.mask_bit_count, 1);
        assert!(!p.masking_is_free);
        assert_eq!(p.capabilities, Capabilities::default());
        assert!(p.features.is_empty());
    }
}
