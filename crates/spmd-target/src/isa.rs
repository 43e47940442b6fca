//! Instruction sets and the user-visible vector target names built on them.
//!
//! An [`Isa`] names a SIMD instruction set. A [`VectorTarget`] pairs an ISA
//! with an element width and a lane count (`avx2-i32x8`, `avx512skx-x16`),
//! which is what the user asks for on the command line.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, TargetError};

/// Largest lane count of any supported target.
pub const MAX_VECTOR_WIDTH: u32 = 64;

/// Processor family an ISA belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IsaFamily {
    X86,
    Arm,
    Wasm,
}

impl fmt::Display for IsaFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IsaFamily::X86 => "x86",
            IsaFamily::Arm => "arm",
            IsaFamily::Wasm => "wasm",
        };
        f.write_str(name)
    }
}

/// Supported instruction sets.
///
/// Variants are ordered from weakest to strongest within a family: when a
/// processor supports several ISAs, the best one is the maximum. A new ISA
/// must be inserted at its rank, never appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Isa {
    #[serde(rename = "sse2")]
    Sse2,
    #[serde(rename = "sse4.1")]
    Sse41,
    #[serde(rename = "sse4.2")]
    Sse42,
    #[serde(rename = "avx1")]
    Avx,
    #[serde(rename = "avx2")]
    Avx2,
    #[serde(rename = "avx2vnni")]
    Avx2Vnni,
    #[serde(rename = "avx512knl")]
    Avx512Knl,
    #[serde(rename = "avx512skx")]
    Avx512Skx,
    #[serde(rename = "avx512icl")]
    Avx512Icl,
    #[serde(rename = "avx512spr")]
    Avx512Spr,
    #[serde(rename = "avx10.2")]
    Avx10_2,
    #[serde(rename = "neon")]
    Neon,
    #[serde(rename = "wasm")]
    Wasm,
}

impl Isa {
    /// Every ISA, weakest first.
    pub const ALL: [Isa; 13] = [
        Isa::Sse2,
        Isa::Sse41,
        Isa::Sse42,
        Isa::Avx,
        Isa::Avx2,
        Isa::Avx2Vnni,
        Isa::Avx512Knl,
        Isa::Avx512Skx,
        Isa::Avx512Icl,
        Isa::Avx512Spr,
        Isa::Avx10_2,
        Isa::Neon,
        Isa::Wasm,
    ];

    /// Display name of the ISA (`"SSE4.1"`, `"SKX"`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            Isa::Sse2 => "SSE2",
            Isa::Sse41 => "SSE4.1",
            Isa::Sse42 => "SSE4.2",
            Isa::Avx => "AVX",
            Isa::Avx2 => "AVX2",
            Isa::Avx2Vnni => "AVX2VNNI",
            Isa::Avx512Knl => "KNL",
            Isa::Avx512Skx => "SKX",
            Isa::Avx512Icl => "ICL",
            Isa::Avx512Spr => "SPR",
            Isa::Avx10_2 => "AVX10.2",
            Isa::Neon => "NEON",
            Isa::Wasm => "WASM",
        }
    }

    /// Prefix used by target names of this ISA (`"avx2"` in `avx2-i32x8`).
    pub fn target_prefix(self) -> &'static str {
        match self {
            Isa::Sse2 => "sse2",
            Isa::Sse41 => "sse4.1",
            Isa::Sse42 => "sse4.2",
            Isa::Avx => "avx1",
            Isa::Avx2 => "avx2",
            Isa::Avx2Vnni => "avx2vnni",
            Isa::Avx512Knl => "avx512knl",
            Isa::Avx512Skx => "avx512skx",
            Isa::Avx512Icl => "avx512icl",
            Isa::Avx512Spr => "avx512spr",
            Isa::Avx10_2 => "avx10.2",
            Isa::Neon => "neon",
            Isa::Wasm => "wasm",
        }
    }

    /// Canonical target name for the ISA, e.g. `"avx2-i32x8"`.
    pub fn target_str(self) -> &'static str {
        self.default_target().name()
    }

    /// The target chosen when only the ISA is known.
    pub fn default_target(self) -> VectorTarget {
        let name = match self {
            Isa::Sse2 => "sse2-i32x4",
            Isa::Sse41 => "sse4.1-i32x4",
            Isa::Sse42 => "sse4.2-i32x4",
            Isa::Avx => "avx1-i32x8",
            Isa::Avx2 => "avx2-i32x8",
            Isa::Avx2Vnni => "avx2vnni-i32x8",
            Isa::Avx512Knl => "avx512knl-x16",
            Isa::Avx512Skx => "avx512skx-x16",
            Isa::Avx512Icl => "avx512icl-x16",
            Isa::Avx512Spr => "avx512spr-x16",
            Isa::Avx10_2 => "avx10.2-x16",
            Isa::Neon => "neon-i32x4",
            Isa::Wasm => "wasm-i32x4",
        };
        VectorTarget::lookup(name).unwrap_or(VectorTarget::from_entry(&TARGETS[0]))
    }

    /// Parse a target name and return its ISA.
    pub fn from_target_str(name: &str) -> Result<Isa> {
        name.parse::<VectorTarget>().map(|t| t.isa())
    }

    /// Lower-case mangling string, suitable for symbol names.
    pub fn isa_string(self) -> String {
        self.as_str().to_ascii_lowercase().replace('.', "")
    }

    /// Processor family of the ISA.
    pub fn family(self) -> IsaFamily {
        match self {
            Isa::Neon => IsaFamily::Arm,
            Isa::Wasm => IsaFamily::Wasm,
            _ => IsaFamily::X86,
        }
    }

    /// Whether this is one of the AVX-512 flavours (including AVX10).
    pub fn is_avx512(self) -> bool {
        matches!(
            self,
            Isa::Avx512Knl | Isa::Avx512Skx | Isa::Avx512Icl | Isa::Avx512Spr | Isa::Avx10_2
        )
    }

    /// Pick the strongest ISA from a set of supported ones.
    pub fn best_available(supported: impl IntoIterator<Item = Isa>) -> Option<Isa> {
        supported.into_iter().max()
    }
}

impl fmt::Display for Isa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Isa {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self> {
        Isa::ALL
            .into_iter()
            .find(|isa| isa.as_str().eq_ignore_ascii_case(s) || isa.target_prefix() == s)
            .ok_or_else(|| TargetError::UnknownIsa { name: s.into() })
    }
}

struct TargetEntry {
    name: &'static str,
    isa: Isa,
    element_bits: u32,
    lanes: u32,
}

const fn entry(name: &'static str, isa: Isa, element_bits: u32, lanes: u32) -> TargetEntry {
    TargetEntry {
        name,
        isa,
        element_bits,
        lanes,
    }
}

#[rustfmt::skip]
const TARGETS: &[TargetEntry] = &[
    entry("sse2-i32x4", Isa::Sse2, 32, 4),
    entry("sse2-i32x8", Isa::Sse2, 32, 8),
    entry("sse4.1-i8x16", Isa::Sse41, 8, 16),
    entry("sse4.1-i16x8", Isa::Sse41, 16, 8),
    entry("sse4.1-i32x4", Isa::Sse41, 32, 4),
    entry("sse4.1-i32x8", Isa::Sse41, 32, 8),
    entry("sse4.2-i8x16", Isa::Sse42, 8, 16),
    entry("sse4.2-i16x8", Isa::Sse42, 16, 8),
    entry("sse4.2-i32x4", Isa::Sse42, 32, 4),
    entry("sse4.2-i32x8", Isa::Sse42, 32, 8),
    entry("avx1-i32x4", Isa::Avx, 32, 4),
    entry("avx1-i32x8", Isa::Avx, 32, 8),
    entry("avx1-i32x16", Isa::Avx, 32, 16),
    entry("avx1-i64x4", Isa::Avx, 64, 4),
    entry("avx2-i8x32", Isa::Avx2, 8, 32),
    entry("avx2-i16x16", Isa::Avx2, 16, 16),
    entry("avx2-i32x4", Isa::Avx2, 32, 4),
    entry("avx2-i32x8", Isa::Avx2, 32, 8),
    entry("avx2-i32x16", Isa::Avx2, 32, 16),
    entry("avx2-i64x4", Isa::Avx2, 64, 4),
    entry("avx2vnni-i32x4", Isa::Avx2Vnni, 32, 4),
    entry("avx2vnni-i32x8", Isa::Avx2Vnni, 32, 8),
    entry("avx2vnni-i32x16", Isa::Avx2Vnni, 32, 16),
    entry("avx512knl-x16", Isa::Avx512Knl, 32, 16),
    entry("avx512skx-x4", Isa::Avx512Skx, 32, 4),
    entry("avx512skx-x8", Isa::Avx512Skx, 32, 8),
    entry("avx512skx-x16", Isa::Avx512Skx, 32, 16),
    entry("avx512skx-x32", Isa::Avx512Skx, 16, 32),
    entry("avx512skx-x64", Isa::Avx512Skx, 8, 64),
    entry("avx512icl-x4", Isa::Avx512Icl, 32, 4),
    entry("avx512icl-x8", Isa::Avx512Icl, 32, 8),
    entry("avx512icl-x16", Isa::Avx512Icl, 32, 16),
    entry("avx512icl-x32", Isa::Avx512Icl, 16, 32),
    entry("avx512icl-x64", Isa::Avx512Icl, 8, 64),
    entry("avx512spr-x4", Isa::Avx512Spr, 32, 4),
    entry("avx512spr-x8", Isa::Avx512Spr, 32, 8),
    entry("avx512spr-x16", Isa::Avx512Spr, 32, 16),
    entry("avx512spr-x32", Isa::Avx512Spr, 16, 32),
    entry("avx512spr-x64", Isa::Avx512Spr, 8, 64),
    entry("avx10.2-x4", Isa::Avx10_2, 32, 4),
    entry("avx10.2-x8", Isa::Avx10_2, 32, 8),
    entry("avx10.2-x16", Isa::Avx10_2, 32, 16),
    entry("avx10.2-x32", Isa::Avx10_2, 16, 32),
    entry("avx10.2-x64", Isa::Avx10_2, 8, 64),
    entry("neon-i8x16", Isa::Neon, 8, 16),
    entry("neon-i16x8", Isa::Neon, 16, 8),
    entry("neon-i32x4", Isa::Neon, 32, 4),
    entry("neon-i32x8", Isa::Neon, 32, 8),
    entry("wasm-i32x4", Isa::Wasm, 32, 4),
];

/// A supported (ISA, element width, lane count) combination.
///
/// Only the combinations in the built-in table exist; parsing any other
/// name fails with [`TargetError::UnknownTarget`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub struct VectorTarget {
    name: &'static str,
    isa: Isa,
    element_bits: u32,
    lanes: u32,
}

impl VectorTarget {
    fn from_entry(e: &TargetEntry) -> Self {
        Self {
            name: e.name,
            isa: e.isa,
            element_bits: e.element_bits,
            lanes: e.lanes,
        }
    }

    fn lookup(name: &str) -> Option<Self> {
        TARGETS
            .iter()
            .find(|e| e.name == name)
            .map(VectorTarget::from_entry)
    }

    /// All supported targets in table order.
    pub fn all() -> impl Iterator<Item = VectorTarget> {
        TARGETS.iter().map(VectorTarget::from_entry)
    }

    /// Comma-separated list of every supported target name.
    pub fn supported_names() -> String {
        TARGETS.iter().map(|e| e.name).collect::<Vec<_>>().join(", ")
    }

    /// Canonical target name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Instruction set of the target.
    pub fn isa(&self) -> Isa {
        self.isa
    }

    /// Width in bits of the element type the target is tuned for.
    pub fn element_bits(&self) -> u32 {
        self.element_bits
    }

    /// Number of program instances (lanes) compiled per gang.
    pub fn lanes(&self) -> u32 {
        self.lanes
    }
}

impl fmt::Display for VectorTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl FromStr for VectorTarget {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_ascii_lowercase();
        if let Some(t) = VectorTarget::lookup(&name) {
            return Ok(t);
        }
        // `sse4-*` is the historical spelling of the SSE4.2 targets.
        if let Some(rest) = name.strip_prefix("sse4-") {
            if let Some(t) = VectorTarget::lookup(&format!("sse4.2-{rest}")) {
                return Ok(t);
            }
        }
        // A bare ISA prefix selects that ISA's default target.
        if let Some(isa) = Isa::ALL.into_iter().find(|i| i.target_prefix() == name) {
            return Ok(isa.default_target());
        }
        Err(TargetError::UnknownTarget { name: s.into() })
    }
}

impl TryFrom<String> for VectorTarget {
    type Error = TargetError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

// `name` is `'static`; deserialize through `FromStr` from an owned string.
impl<'de> Deserialize<'de> for VectorTarget {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

impl From<VectorTarget> for String {
    fn from(value: VectorTarget) -> Self {
        value.name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isa_string_round_trip() {
        for isa in Isa::ALL {
            assert_eq!(isa.as_str().parse::<Isa>().unwrap(), isa);
            assert_eq!(Isa::from_target_str(isa.target_str()).unwrap(), isa);
        }
    }

    #[test]
    fn isa_order_is_weakest_first() {
        assert!(Isa::Sse2 < Isa::Sse41);
        assert!(Isa::Sse42 < Isa::Avx);
        assert!(Isa::Avx2 < Isa::Avx2Vnni);
        assert!(Isa::Avx512Skx < Isa::Avx512Icl);
        assert!(Isa::Avx512Spr < Isa::Avx10_2);
        let mut sorted = Isa::ALL;
        sorted.sort();
        assert_eq!(sorted, Isa::ALL);
    }

    #[test]
    fn best_available_picks_strongest() {
        let best = Isa::best_available([Isa::Sse2, Isa::Avx2, Isa::Sse42, Isa::Avx]);
        assert_eq!(best, Some(Isa::Avx2));
        assert_eq!(Isa::best_available([]), None);
    }

    #[test]
    fn every_target_name_parses_to_itself() {
        for target in VectorTarget::all() {
            let parsed: VectorTarget = target.name().parse().unwrap();
            assert_eq!(parsed, target);
            assert!(target.lanes() <= MAX_VECTOR_WIDTH);
        }
    }

    #[test]
    fn legacy_and_bare_names() {
        let t: VectorTarget = "sse4-i32x4".parse().unwrap();
        assert_eq!(t.name(), "sse4.2-i32x4");
        let t: VectorTarget = "avx2".parse().unwrap();
        assert_eq!(t.name(), "avx2-i32x8");
        let t: VectorTarget = "AVX512SKX-X32".parse().unwrap();
        assert_eq!(t.element_bits(), 16);
        assert_eq!(t.lanes(), 32);
    }

    #[test]
    fn unknown_target_rejected() {
        let err = "avx3-i32x8".parse::<VectorTarget>().unwrap_err();
        assert!(matches!(err, TargetError::UnknownTarget { .. }));
        assert!("wasm-i32x16".parse::<VectorTarget>().is_err());
    }

    #[test]
    fn families() {
        assert_eq!(Isa::Avx10_2.family(), IsaFamily::X86);
        assert_eq!(Isa::Neon.family(), IsaFamily::Arm);
        assert_eq!(Isa::Wasm.family(), IsaFamily::Wasm);
        assert!(Isa::Avx512Knl.is_avx512());
        assert!(!Isa::Avx2Vnni.is_avx512());
    }

    #[test]
    fn serde_uses_target_names() {
        let t: VectorTarget = "neon-i16x8".parse().unwrap();
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, "\"neon-i16x8\"");
        let back: VectorTarget = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
        assert_eq!(serde_json::to_string(&Isa::Sse41).unwrap(), "\"sse4.1\"");
    }

    #[test]
    fn deserializes_from_owned_input() {
        let t: VectorTarget =
            serde_json::from_value(serde_json::json!("avx2-i32x8")).unwrap();
        assert_eq!(t.name(), "avx2-i32x8");
        assert_eq!(t.isa(), Isa::Avx2);

        let legacy: VectorTarget = serde_json::from_reader("\"sse4-i32x4\"".as_bytes()).unwrap();
        assert_eq!(legacy.name(), "sse4.2-i32x4");

        let err = serde_json::from_value::<VectorTarget>(serde_json::json!("avx3-i32x8"))
            .unwrap_err()
            .to_string();
        assert!(err.contains("avx3-i32x8"), "{err}");
    }
}
