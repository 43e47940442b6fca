//! Architecture, operating system and relocation settings of a target.
//!
//! These combine into the backend [`Triple`] handed to the toolkit.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TargetError};
use crate::isa::IsaFamily;

/// Target system architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Arch {
    X86,
    #[serde(rename = "x86-64")]
    X86_64,
    Arm,
    Aarch64,
    Wasm32,
    Wasm64,
}

impl Arch {
    /// Every architecture.
    pub const ALL: [Arch; 6] = [
        Arch::X86,
        Arch::X86_64,
        Arch::Arm,
        Arch::Aarch64,
        Arch::Wasm32,
        Arch::Wasm64,
    ];

    /// Command-line spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Arch::X86 => "x86",
            Arch::X86_64 => "x86-64",
            Arch::Arm => "arm",
            Arch::Aarch64 => "aarch64",
            Arch::Wasm32 => "wasm32",
            Arch::Wasm64 => "wasm64",
        }
    }

    /// Whether pointers are 32 bits wide.
    pub fn is_32bit(self) -> bool {
        matches!(self, Arch::X86 | Arch::Arm | Arch::Wasm32)
    }

    /// The ISA family code for this architecture is drawn from.
    pub fn family(self) -> IsaFamily {
        match self {
            Arch::X86 | Arch::X86_64 => IsaFamily::X86,
            Arch::Arm | Arch::Aarch64 => IsaFamily::Arm,
            Arch::Wasm32 | Arch::Wasm64 => IsaFamily::Wasm,
        }
    }

    /// Default architecture for an ISA family.
    pub fn default_for(family: IsaFamily) -> Arch {
        match family {
            IsaFamily::X86 => Arch::X86_64,
            IsaFamily::Arm => Arch::Aarch64,
            IsaFamily::Wasm => Arch::Wasm32,
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Arch {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "x86" | "i686" | "i386" => Ok(Arch::X86),
            "x86-64" | "x86_64" | "amd64" => Ok(Arch::X86_64),
            "arm" | "armv7" => Ok(Arch::Arm),
            "aarch64" | "arm64" => Ok(Arch::Aarch64),
            "wasm32" => Ok(Arch::Wasm32),
            "wasm64" => Ok(Arch::Wasm64),
            _ => Err(TargetError::UnknownArch { name: s.into() }),
        }
    }
}

/// Operating system the generated code runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetOs {
    Windows,
    #[default]
    Linux,
    #[serde(rename = "freebsd")]
    FreeBsd,
    #[serde(rename = "macos")]
    MacOs,
    Android,
    Ios,
    Ps4,
    /// WebAssembly in a browser or standalone runtime.
    Web,
    /// Bare-metal or otherwise unspecified environment.
    Custom,
}

impl TargetOs {
    /// Command-line spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            TargetOs::Windows => "windows",
            TargetOs::Linux => "linux",
            TargetOs::FreeBsd => "freebsd",
            TargetOs::MacOs => "macos",
            TargetOs::Android => "android",
            TargetOs::Ios => "ios",
            TargetOs::Ps4 => "ps4",
            TargetOs::Web => "web",
            TargetOs::Custom => "custom",
        }
    }

    /// OS of the machine running the compiler.
    pub fn host() -> TargetOs {
        if cfg!(target_os = "windows") {
            TargetOs::Windows
        } else if cfg!(target_os = "macos") {
            TargetOs::MacOs
        } else if cfg!(target_os = "freebsd") {
            TargetOs::FreeBsd
        } else if cfg!(target_os = "android") {
            TargetOs::Android
        } else if cfg!(target_os = "ios") {
            TargetOs::Ios
        } else {
            TargetOs::Linux
        }
    }
}

impl fmt::Display for TargetOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetOs {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "windows" => Ok(TargetOs::Windows),
            "linux" => Ok(TargetOs::Linux),
            "freebsd" => Ok(TargetOs::FreeBsd),
            "macos" => Ok(TargetOs::MacOs),
            "android" => Ok(TargetOs::Android),
            "ios" => Ok(TargetOs::Ios),
            "ps4" => Ok(TargetOs::Ps4),
            "web" => Ok(TargetOs::Web),
            "custom" => Ok(TargetOs::Custom),
            _ => Err(TargetError::UnknownOs { name: s.into() }),
        }
    }
}

/// Calling convention used for exported functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallingConv {
    /// Not chosen yet; resolved from the target when the context activates.
    #[default]
    Uninitialized,
    Default,
    X86VectorCall,
}

/// Position-independence level of generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PicLevel {
    /// Not specified; the backend decides.
    #[default]
    Default,
    NotPic,
    SmallPic,
    BigPic,
}

/// Code model (addressing-range assumption for relocations).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CodeModel {
    /// Not specified; the backend decides.
    #[default]
    Default,
    Small,
    Large,
}

/// Backend target triple (architecture, vendor, OS, environment).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub arch: String,
    pub vendor: String,
    pub os: String,
    /// ABI environment (e.g. `gnu`, `msvc`); absent for bare triples.
    pub environment: Option<String>,
}

impl Triple {
    fn new(arch: &str, vendor: &str, os: &str, environment: Option<&str>) -> Self {
        Self {
            arch: arch.into(),
            vendor: vendor.into(),
            os: os.into(),
            environment: environment.map(Into::into),
        }
    }

    /// Derive the triple for an (architecture, OS) pair.
    ///
    /// Fails with [`TargetError::UnsupportedOs`] when the pair has no backend.
    pub fn derive(arch: Arch, os: TargetOs) -> Result<Triple> {
        let unsupported = || TargetError::UnsupportedOs {
            arch: arch.to_string(),
            os: os.to_string(),
        };
        let triple = match (arch, os) {
            (Arch::X86, TargetOs::Windows) => Triple::new("i686", "pc", "windows", Some("msvc")),
            (Arch::X86_64, TargetOs::Windows) => {
                Triple::new("x86_64", "pc", "windows", Some("msvc"))
            }
            (Arch::Aarch64, TargetOs::Windows) => {
                Triple::new("aarch64", "pc", "windows", Some("msvc"))
            }
            (Arch::X86, TargetOs::Linux | TargetOs::Custom) => {
                Triple::new("i686", "unknown", "linux", Some("gnu"))
            }
            (Arch::X86_64, TargetOs::Linux | TargetOs::Custom) => {
                Triple::new("x86_64", "unknown", "linux", Some("gnu"))
            }
            (Arch::Arm, TargetOs::Linux | TargetOs::Custom) => {
                Triple::new("armv7", "unknown", "linux", Some("gnueabihf"))
            }
            (Arch::Aarch64, TargetOs::Linux | TargetOs::Custom) => {
                Triple::new("aarch64", "unknown", "linux", Some("gnu"))
            }
            (Arch::X86, TargetOs::FreeBsd) => Triple::new("i686", "unknown", "freebsd", None),
            (Arch::X86_64, TargetOs::FreeBsd) => {
                Triple::new("x86_64", "unknown", "freebsd", None)
            }
            (Arch::Aarch64, TargetOs::FreeBsd) => {
                Triple::new("aarch64", "unknown", "freebsd", None)
            }
            (Arch::X86_64, TargetOs::MacOs) => Triple::new("x86_64", "apple", "macosx", None),
            (Arch::Aarch64, TargetOs::MacOs) => Triple::new("arm64", "apple", "macosx", None),
            (Arch::Aarch64, TargetOs::Ios) => Triple::new("arm64", "apple", "ios", None),
            (Arch::X86, TargetOs::Android) => {
                Triple::new("i686", "unknown", "linux", Some("android"))
            }
            (Arch::X86_64, TargetOs::Android) => {
                Triple::new("x86_64", "unknown", "linux", Some("android"))
            }
            (Arch::Arm, TargetOs::Android) => {
                Triple::new("armv7", "unknown", "linux", Some("androideabi"))
            }
            (Arch::Aarch64, TargetOs::Android) => {
                Triple::new("aarch64", "unknown", "linux", Some("android"))
            }
            (Arch::X86_64, TargetOs::Ps4) => Triple::new("x86_64", "scei", "ps4", None),
            (Arch::Wasm32, TargetOs::Web | TargetOs::Custom) => {
                Triple::new("wasm32", "unknown", "unknown", None)
            }
            (Arch::Wasm64, TargetOs::Web | TargetOs::Custom) => {
                Triple::new("wasm64", "unknown", "unknown", None)
            }
            _ => return Err(unsupported()),
        };
        Ok(triple)
    }

    /// Whether the triple targets a Windows environment.
    pub fn is_windows(&self) -> bool {
        self.os == "windows"
    }

    /// Whether the triple targets an Apple platform.
    pub fn is_apple(&self) -> bool {
        self.vendor == "apple"
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.arch, self.vendor, self.os)?;
        if let Some(env) = &self.environment {
            write!(f, "-{env}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arch_parse_and_width() {
        assert_eq!("x86-64".parse::<Arch>().unwrap(), Arch::X86_64);
        assert_eq!("arm64".parse::<Arch>().unwrap(), Arch::Aarch64);
        assert!("mips".parse::<Arch>().is_err());
        assert!(Arch::X86.is_32bit());
        assert!(!Arch::Aarch64.is_32bit());
        assert_eq!(Arch::Wasm64.family(), IsaFamily::Wasm);
        for arch in Arch::ALL {
            assert_eq!(arch.as_str().parse::<Arch>().unwrap(), arch);
        }
    }

    #[test]
    fn linux_triples() {
        let t = Triple::derive(Arch::X86_64, TargetOs::Linux).unwrap();
        assert_eq!(t.to_string(), "x86_64-unknown-linux-gnu");
        let t = Triple::derive(Arch::Arm, TargetOs::Linux).unwrap();
        assert_eq!(t.to_string(), "armv7-unknown-linux-gnueabihf");
    }

    #[test]
    fn apple_and_windows_triples() {
        let t = Triple::derive(Arch::Aarch64, TargetOs::MacOs).unwrap();
        assert_eq!(t.to_string(), "arm64-apple-macosx");
        assert!(t.is_apple());
        let t = Triple::derive(Arch::X86_64, TargetOs::Windows).unwrap();
        assert_eq!(t.to_string(), "x86_64-pc-windows-msvc");
        assert!(t.is_windows());
    }

    #[test]
    fn wasm_triple_has_no_environment() {
        let t = Triple::derive(Arch::Wasm32, TargetOs::Web).unwrap();
        assert_eq!(t.to_string(), "wasm32-unknown-unknown");
    }

    #[test]
    fn unsupported_pairs() {
        assert!(matches!(
            Triple::derive(Arch::Wasm32, TargetOs::Windows),
            Err(TargetError::UnsupportedOs { .. })
        ));
        assert!(Triple::derive(Arch::X86_64, TargetOs::Ios).is_err());
        assert!(Triple::derive(Arch::X86, TargetOs::Ps4).is_err());
    }
}
