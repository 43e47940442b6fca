//! Small language-level tags shared by the front end and code generation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Storage class of a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageClass {
    #[default]
    None,
    Extern,
    Static,
    Typedef,
    /// `extern "C"`.
    ExternC,
    /// `extern "SYCL"`.
    ExternSycl,
}

impl StorageClass {
    pub fn is_none(self) -> bool {
        self == StorageClass::None
    }

    pub fn is_extern(self) -> bool {
        self == StorageClass::Extern
    }

    pub fn is_static(self) -> bool {
        self == StorageClass::Static
    }

    pub fn is_typedef(self) -> bool {
        self == StorageClass::Typedef
    }

    pub fn is_extern_c(self) -> bool {
        self == StorageClass::ExternC
    }

    pub fn is_extern_sycl(self) -> bool {
        self == StorageClass::ExternSycl
    }

    /// Any of the three extern forms.
    pub fn is_any_extern(self) -> bool {
        matches!(
            self,
            StorageClass::Extern | StorageClass::ExternC | StorageClass::ExternSycl
        )
    }

    /// Source spelling; empty for [`StorageClass::None`].
    pub fn as_str(self) -> &'static str {
        match self {
            StorageClass::None => "",
            StorageClass::Extern => "extern",
            StorageClass::Static => "static",
            StorageClass::Typedef => "typedef",
            StorageClass::ExternC => "extern \"C\"",
            StorageClass::ExternSycl => "extern \"SYCL\"",
        }
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Memory address space of a pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressSpace {
    #[default]
    Default,
    Global,
    Constant,
    Local,
    Generic,
}

impl AddressSpace {
    /// Backend address-space number.
    pub fn index(self) -> u32 {
        match self {
            AddressSpace::Default => 0,
            AddressSpace::Global => 1,
            AddressSpace::Constant => 2,
            AddressSpace::Local => 3,
            AddressSpace::Generic => 4,
        }
    }
}

/// Overflow semantics of signed integer arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WrapSemantics {
    /// Signed overflow is undefined (`nsw`).
    #[default]
    Nsw,
    /// Signed overflow wraps.
    None,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extern_predicates() {
        assert!(StorageClass::ExternC.is_any_extern());
        assert!(StorageClass::ExternSycl.is_any_extern());
        assert!(StorageClass::Extern.is_extern());
        assert!(!StorageClass::ExternC.is_extern());
        assert!(!StorageClass::Static.is_any_extern());
        assert!(StorageClass::default().is_none());
    }

    #[test]
    fn storage_class_spelling() {
        assert_eq!(StorageClass::ExternC.to_string(), "extern \"C\"");
        assert_eq!(StorageClass::Typedef.to_string(), "typedef");
        assert_eq!(StorageClass::None.to_string(), "");
    }

    #[test]
    fn address_space_numbers() {
        assert_eq!(AddressSpace::default().index(), 0);
        assert_eq!(AddressSpace::Local.index(), 3);
        assert_eq!(AddressSpace::Generic.index(), 4);
    }
}
