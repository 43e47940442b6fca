//! Performance-warning kinds.
//!
//! A code path that falls back to a slow sequence raises one of these kinds
//! against the target. Each kind is reported at most once per target.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Set of performance pitfalls.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct PerfWarning: u32 {
        /// Unsigned integer to float conversion without a native instruction.
        const CVT_UINT_FLOAT = 0x1;
        /// Unsigned integer to float16 conversion without a native instruction.
        const CVT_UINT_FLOAT16 = 0x2;
        /// Integer division or modulus by a varying value.
        const DIV_MOD_INT = 0x4;
        /// Right shift by a varying amount.
        const VARIABLE_SHIFT_RIGHT = 0x8;
    }
}

impl PerfWarning {
    /// Human-readable description of a single kind.
    pub fn describe(self) -> &'static str {
        if self == PerfWarning::CVT_UINT_FLOAT {
            "conversion from unsigned int to float is slow; use int if possible"
        } else if self == PerfWarning::CVT_UINT_FLOAT16 {
            "conversion from unsigned int to float16 is slow; use int if possible"
        } else if self == PerfWarning::DIV_MOD_INT {
            "division and modulus of varying integer types are slow"
        } else if self == PerfWarning::VARIABLE_SHIFT_RIGHT {
            "shift right by a varying amount is slow; use a uniform shift if possible"
        } else {
            "multiple performance pitfalls"
        }
    }
}

impl fmt::Display for PerfWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.iter_names().map(|(name, _)| name).collect();
        f.write_str(&names.join("|"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_values_are_stable() {
        assert_eq!(PerfWarning::CVT_UINT_FLOAT.bits(), 0x1);
        assert_eq!(PerfWarning::CVT_UINT_FLOAT16.bits(), 0x2);
        assert_eq!(PerfWarning::DIV_MOD_INT.bits(), 0x4);
        assert_eq!(PerfWarning::VARIABLE_SHIFT_RIGHT.bits(), 0x8);
    }

    #[test]
    fn display_lists_names() {
        let set = PerfWarning::DIV_MOD_INT | PerfWarning::CVT_UINT_FLOAT;
        assert_eq!(set.to_string(), "CVT_UINT_FLOAT|DIV_MOD_INT");
        assert!(PerfWarning::DIV_MOD_INT.describe().contains("modulus"));
    }
}
