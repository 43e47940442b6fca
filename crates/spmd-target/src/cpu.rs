//! CPU table and host detection.
//!
//! Each known CPU records the strongest ISA it can run and a handful of
//! feature bits that refine the capability table (VNNI, dot product, FP16).

use bitflags::bitflags;

use crate::environment::Arch;
use crate::isa::{Isa, IsaFamily};

/// Sentinel CPU name asking for the host processor.
pub const NATIVE_CPU: &str = "native";

bitflags! {
    /// Optional features that are not implied by a CPU's highest ISA.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CpuFeatures: u16 {
        /// VEX-encoded AVX-VNNI.
        const AVX_VNNI = 0x001;
        /// VNNI on signed/unsigned int8 (AVX-VNNI-INT8).
        const VNNI_INT8 = 0x002;
        /// VNNI on signed/unsigned int16 (AVX-VNNI-INT16).
        const VNNI_INT16 = 0x004;
        /// Half-precision conversion instructions.
        const F16C = 0x008;
        /// Hardware random number generator.
        const RDRAND = 0x010;
        /// ARM SDOT/UDOT.
        const DOTPROD = 0x020;
        /// ARM int8 matrix multiply.
        const I8MM = 0x040;
        /// Native FP16 arithmetic.
        const FP16 = 0x080;
    }
}

/// A CPU the compiler knows how to target.
#[derive(Debug, PartialEq, Eq)]
pub struct Cpu {
    name: &'static str,
    aliases: &'static [&'static str],
    family: IsaFamily,
    max_isa: Isa,
    features: CpuFeatures,
    /// Whether the CPU implements a 64-bit execution state.
    bits64: bool,
}

const X86_BASE: CpuFeatures = CpuFeatures::F16C.union(CpuFeatures::RDRAND);
const AVX10: CpuFeatures = X86_BASE
    .union(CpuFeatures::AVX_VNNI)
    .union(CpuFeatures::VNNI_INT8)
    .union(CpuFeatures::VNNI_INT16)
    .union(CpuFeatures::FP16);
const ARM_V82: CpuFeatures = CpuFeatures::FP16.union(CpuFeatures::DOTPROD);

const fn cpu(
    name: &'static str,
    aliases: &'static [&'static str],
    family: IsaFamily,
    max_isa: Isa,
    features: CpuFeatures,
    bits64: bool,
) -> Cpu {
    Cpu {
        name,
        aliases,
        family,
        max_isa,
        features,
        bits64,
    }
}

use IsaFamily::{Arm, Wasm, X86};

#[rustfmt::skip]
static CPUS: &[Cpu] = &[
    cpu("x86-64", &[], X86, Isa::Sse2, CpuFeatures::empty(), true),
    cpu("core2", &[], X86, Isa::Sse2, CpuFeatures::empty(), true),
    cpu("penryn", &[], X86, Isa::Sse41, CpuFeatures::empty(), true),
    cpu("nehalem", &["corei7"], X86, Isa::Sse42, CpuFeatures::empty(), true),
    cpu("btver2", &["ps4"], X86, Isa::Avx, CpuFeatures::F16C, true),
    cpu("sandybridge", &["corei7-avx"], X86, Isa::Avx, CpuFeatures::empty(), true),
    cpu("ivybridge", &["core-avx-i"], X86, Isa::Avx, X86_BASE, true),
    cpu("haswell", &["core-avx2"], X86, Isa::Avx2, X86_BASE, true),
    cpu("broadwell", &[], X86, Isa::Avx2, X86_BASE, true),
    cpu("skylake", &[], X86, Isa::Avx2, X86_BASE, true),
    cpu("znver1", &[], X86, Isa::Avx2, X86_BASE, true),
    cpu("znver2", &[], X86, Isa::Avx2, X86_BASE, true),
    cpu("znver3", &[], X86, Isa::Avx2, X86_BASE, true),
    cpu("alderlake", &["adl"], X86, Isa::Avx2Vnni, X86_BASE.union(CpuFeatures::AVX_VNNI), true),
    cpu("knl", &[], X86, Isa::Avx512Knl, X86_BASE, true),
    cpu("skylake-avx512", &["skx"], X86, Isa::Avx512Skx, X86_BASE, true),
    cpu("icelake-client", &["icl"], X86, Isa::Avx512Icl, X86_BASE, true),
    cpu("icelake-server", &["icx"], X86, Isa::Avx512Icl, X86_BASE, true),
    cpu("tigerlake", &["tgl"], X86, Isa::Avx512Icl, X86_BASE, true),
    cpu("znver4", &[], X86, Isa::Avx512Icl, X86_BASE, true),
    cpu("sapphirerapids", &["spr"], X86, Isa::Avx512Spr, X86_BASE.union(CpuFeatures::AVX_VNNI).union(CpuFeatures::FP16), true),
    cpu("graniterapids", &["gnr"], X86, Isa::Avx512Spr, X86_BASE.union(CpuFeatures::AVX_VNNI).union(CpuFeatures::FP16), true),
    cpu("diamondrapids", &["dmr"], X86, Isa::Avx10_2, AVX10, true),
    cpu("cortex-a9", &[], Arm, Isa::Neon, CpuFeatures::empty(), false),
    cpu("cortex-a15", &[], Arm, Isa::Neon, CpuFeatures::empty(), false),
    cpu("cortex-a35", &[], Arm, Isa::Neon, CpuFeatures::empty(), true),
    cpu("cortex-a53", &[], Arm, Isa::Neon, CpuFeatures::empty(), true),
    cpu("cortex-a57", &[], Arm, Isa::Neon, CpuFeatures::empty(), true),
    cpu("cortex-a76", &[], Arm, Isa::Neon, ARM_V82, true),
    cpu("cortex-a78", &[], Arm, Isa::Neon, ARM_V82, true),
    cpu("neoverse-n2", &[], Arm, Isa::Neon, ARM_V82.union(CpuFeatures::I8MM), true),
    cpu("apple-a7", &["cyclone"], Arm, Isa::Neon, CpuFeatures::empty(), true),
    cpu("apple-a14", &[], Arm, Isa::Neon, ARM_V82, true),
    cpu("apple-m1", &[], Arm, Isa::Neon, ARM_V82, true),
    cpu("apple-m2", &[], Arm, Isa::Neon, ARM_V82.union(CpuFeatures::I8MM), true),
    cpu("generic", &["mvp"], Wasm, Isa::Wasm, CpuFeatures::empty(), true),
];

impl Cpu {
    /// Find a CPU by name or alias.
    pub fn lookup(name: &str) -> Option<&'static Cpu> {
        CPUS.iter()
            .find(|c| c.name == name || c.aliases.contains(&name))
    }

    /// All known CPUs in table order.
    pub fn all() -> &'static [Cpu] {
        CPUS
    }

    /// Default CPU for an ISA on a given architecture.
    pub fn default_for(isa: Isa, arch: Arch) -> &'static Cpu {
        let name = match isa {
            Isa::Sse2 => "core2",
            Isa::Sse41 => "penryn",
            Isa::Sse42 => "nehalem",
            Isa::Avx => "sandybridge",
            Isa::Avx2 => "haswell",
            Isa::Avx2Vnni => "alderlake",
            Isa::Avx512Knl => "knl",
            Isa::Avx512Skx => "skylake-avx512",
            Isa::Avx512Icl => "icelake-client",
            Isa::Avx512Spr => "sapphirerapids",
            Isa::Avx10_2 => "diamondrapids",
            Isa::Neon if arch == Arch::Arm => "cortex-a9",
            Isa::Neon => "cortex-a57",
            Isa::Wasm => "generic",
        };
        Cpu::lookup(name).unwrap_or(&CPUS[0])
    }

    /// The host CPU for code on `arch`, approximated by the default CPU of
    /// the strongest host ISA in that architecture's family.
    ///
    /// `None` when the host runs nothing from the family.
    pub fn native(arch: Arch) -> Option<&'static Cpu> {
        native_from(&host_isas(), arch)
    }

    /// Canonical name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn aliases(&self) -> &'static [&'static str] {
        self.aliases
    }

    /// Processor family.
    pub fn family(&self) -> IsaFamily {
        self.family
    }

    /// Strongest ISA the CPU runs.
    pub fn max_isa(&self) -> Isa {
        self.max_isa
    }

    /// Optional feature bits.
    pub fn features(&self) -> CpuFeatures {
        self.features
    }

    /// Whether the CPU can execute `isa` code on `arch`.
    pub fn supports(&self, isa: Isa, arch: Arch) -> bool {
        if self.family != isa.family() || self.family != arch.family() {
            return false;
        }
        if arch == Arch::Aarch64 && !self.bits64 {
            return false;
        }
        match isa {
            // KNL is a separate AVX-512 lineage; later AVX-512 cores cannot run it.
            Isa::Avx512Knl => self.max_isa == Isa::Avx512Knl,
            _ if self.max_isa == Isa::Avx512Knl => isa <= Isa::Avx2,
            Isa::Avx2Vnni => self.features.contains(CpuFeatures::AVX_VNNI),
            _ => isa <= self.max_isa,
        }
    }

    /// Every ISA the CPU can run on its default architecture.
    pub fn supported_isas(&self) -> Vec<Isa> {
        let arch = Arch::default_for(self.family);
        Isa::ALL
            .into_iter()
            .filter(|isa| self.supports(*isa, arch))
            .collect()
    }
}

/// Comma-separated list of supported CPU names.
pub fn supported_cpus() -> String {
    CPUS.iter().map(|c| c.name).collect::<Vec<_>>().join(", ")
}

/// ISAs the host processor can execute.
pub fn host_isas() -> Vec<Isa> {
    detect_host()
}

/// Strongest ISA of the host processor, if it belongs to a supported family.
pub fn best_available_isa() -> Option<Isa> {
    Isa::best_available(host_isas())
}

fn native_from(isas: &[Isa], arch: Arch) -> Option<&'static Cpu> {
    let family = arch.family();
    let isa = Isa::best_available(isas.iter().copied().filter(|isa| isa.family() == family))?;
    Some(Cpu::default_for(isa, arch))
}

/// x86 feature groups that decide which ISAs the host runs.
#[cfg(any(test, target_arch = "x86", target_arch = "x86_64"))]
#[derive(Debug, Clone, Copy, Default)]
struct X86Host {
    sse2: bool,
    sse41: bool,
    sse42: bool,
    avx: bool,
    /// AVX2 together with FMA.
    avx2: bool,
    /// VEX-encoded AVX-VNNI.
    avx_vnni: bool,
    /// AVX-512 F, CD, DQ, BW and VL.
    avx512_skx: bool,
    /// AVX-512 F with the Xeon Phi ER and PF extensions.
    avx512_knl: bool,
    /// AVX-512 VNNI and VBMI2.
    avx512_icl: bool,
    /// AVX-512 FP16 and BF16 with AMX tiles.
    avx512_spr: bool,
    /// Reported AVX10 version, 0 when AVX10 is absent.
    avx10_version: u8,
}

#[cfg(any(test, target_arch = "x86", target_arch = "x86_64"))]
impl X86Host {
    fn isas(self) -> Vec<Isa> {
        let ladder = [
            (self.sse2, Isa::Sse2),
            (self.sse41, Isa::Sse41),
            (self.sse42, Isa::Sse42),
            (self.avx, Isa::Avx),
            (self.avx2, Isa::Avx2),
            (self.avx2 && self.avx_vnni, Isa::Avx2Vnni),
            (self.avx512_knl, Isa::Avx512Knl),
            (self.avx512_skx, Isa::Avx512Skx),
            (self.avx512_skx && self.avx512_icl, Isa::Avx512Icl),
            (self.avx512_skx && self.avx512_icl && self.avx512_spr, Isa::Avx512Spr),
            (self.avx512_skx && self.avx10_version >= 2, Isa::Avx10_2),
        ];
        ladder
            .into_iter()
            .filter_map(|(present, isa)| present.then_some(isa))
            .collect()
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn detect_host() -> Vec<Isa> {
    #[cfg(target_arch = "x86")]
    use std::arch::x86::{__cpuid_count, __get_cpuid_max};
    #[cfg(target_arch = "x86_64")]
    use std::arch::x86_64::{__cpuid_count, __get_cpuid_max};

    let avx2 = is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma");
    let avx512f = is_x86_feature_detected!("avx512f");
    let avx512_skx = avx512f
        && is_x86_feature_detected!("avx512cd")
        && is_x86_feature_detected!("avx512dq")
        && is_x86_feature_detected!("avx512bw")
        && is_x86_feature_detected!("avx512vl");

    // Bits the feature-detection macro does not cover on every toolchain.
    // The AVX and AVX-512 register state checks above gate each of them.
    #[allow(unused_unsafe)]
    // SAFETY: `cpuid` is available on every x86 processor this code runs on,
    // and each leaf is read only when the maximum basic leaf covers it.
    let (leaf7, leaf7_1, leaf24) = unsafe {
        let (max_leaf, _) = __get_cpuid_max(0);
        let leaf7 = (max_leaf >= 7).then(|| __cpuid_count(7, 0));
        let leaf7_1 = leaf7
            .filter(|l| l.eax >= 1)
            .map(|_| __cpuid_count(7, 1));
        let leaf24 = (max_leaf >= 0x24).then(|| __cpuid_count(0x24, 0));
        (leaf7, leaf7_1, leaf24)
    };
    let bit = |reg: u32, n: u32| reg & (1 << n) != 0;

    let avx512_er_pf = leaf7.is_some_and(|l| bit(l.ebx, 26) && bit(l.ebx, 27));
    let fp16_amx = leaf7.is_some_and(|l| bit(l.edx, 23) && bit(l.edx, 24));
    let avx_vnni = leaf7_1.is_some_and(|l| bit(l.eax, 4));
    let bf16 = leaf7_1.is_some_and(|l| bit(l.eax, 5));
    let avx10 = leaf7_1.is_some_and(|l| bit(l.edx, 19));
    let avx10_version = match leaf24 {
        Some(l) if avx10 => (l.ebx & 0xff) as u8,
        _ => 0,
    };

    X86Host {
        sse2: is_x86_feature_detected!("sse2"),
        sse41: is_x86_feature_detected!("sse4.1"),
        sse42: is_x86_feature_detected!("sse4.2"),
        avx: is_x86_feature_detected!("avx"),
        avx2,
        avx_vnni: avx2 && avx_vnni,
        avx512_skx,
        avx512_knl: avx512f && avx512_er_pf,
        avx512_icl: is_x86_feature_detected!("avx512vnni")
            && is_x86_feature_detected!("avx512vbmi2"),
        avx512_spr: avx512f && fp16_amx && bf16,
        avx10_version: if avx512f { avx10_version } else { 0 },
    }
    .isas()
}

#[cfg(any(target_arch = "aarch64", target_arch = "arm"))]
fn detect_host() -> Vec<Isa> {
    if cfg!(any(target_arch = "aarch64", target_feature = "neon")) {
        vec![Isa::Neon]
    } else {
        Vec::new()
    }
}

#[cfg(any(target_arch = "wasm32", target_arch = "wasm64"))]
fn detect_host() -> Vec<Isa> {
    vec![Isa::Wasm]
}

#[cfg(not(any(
    target_arch = "x86",
    target_arch = "x86_64",
    target_arch = "aarch64",
    target_arch = "arm",
    target_arch = "wasm32",
    target_arch = "wasm64"
)))]
fn detect_host() -> Vec<Isa> {
    Vec::new()
}
