//! Data-layout model.
//!
//! Parses the LLVM-style layout string a backend reports for a target
//! machine and answers size, alignment and struct-offset queries.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{Result, TargetError};

/// Scalar types whose storage the layout describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScalarType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    F16,
    F32,
    F64,
    Ptr,
}

/// Byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Endianness {
    Little,
    Big,
}

/// Field offsets of a struct laid out with natural ABI alignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructLayout {
    /// Byte offset of each field.
    pub offsets: Vec<u64>,
    /// Total size including tail padding.
    pub size: u64,
    /// Alignment of the struct.
    pub align: u64,
}

/// A parsed data layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataLayout {
    source: String,
    pub endianness: Endianness,
    /// Pointer size in bits (address space 0).
    pub pointer_bits: u32,
    /// Pointer ABI alignment in bits.
    pub pointer_align: u32,
    /// Stack alignment in bits, 0 when unspecified.
    pub stack_align: u32,
    /// Native integer widths.
    pub native_ints: Vec<u32>,
    int_align: BTreeMap<u32, u32>,
    float_align: BTreeMap<u32, u32>,
}

impl DataLayout {
    /// Parse a layout string.
    pub fn parse(layout: &str) -> Result<Self> {
        let invalid = |detail: String| TargetError::InvalidDataLayout {
            layout: layout.to_string(),
            detail,
        };
        let num = |s: &str| -> Result<u32> {
            s.parse::<u32>()
                .map_err(|_| invalid(format!("'{s}' is not a number")))
        };

        let mut dl = DataLayout {
            source: layout.to_string(),
            endianness: Endianness::Little,
            pointer_bits: 64,
            pointer_align: 64,
            stack_align: 0,
            native_ints: Vec::new(),
            int_align: BTreeMap::from([(1, 8), (8, 8), (16, 16), (32, 32), (64, 32)]),
            float_align: BTreeMap::from([(16, 16), (32, 32), (64, 64), (128, 128)]),
        };

        for spec in layout.split('-').filter(|s| !s.is_empty()) {
            let mut parts = spec.split(':');
            let head = parts.next().unwrap_or_default();
            let rest: Vec<&str> = parts.collect();
            match head.chars().next() {
                Some('e') if head == "e" => dl.endianness = Endianness::Little,
                Some('E') if head == "E" => dl.endianness = Endianness::Big,
                Some('p') => {
                    // Only the default address space matters here.
                    let space = &head[1..];
                    if !space.is_empty() && space != "0" {
                        continue;
                    }
                    let [size, abi, ..] = rest.as_slice() else {
                        return Err(invalid(format!("pointer spec '{spec}' is incomplete")));
                    };
                    dl.pointer_bits = num(*size)?;
                    dl.pointer_align = num(*abi)?;
                }
                Some('i') | Some('f') => {
                    let bits = num(&head[1..])?;
                    let Some(abi) = rest.first() else {
                        return Err(invalid(format!("alignment spec '{spec}' is incomplete")));
                    };
                    let table = if head.starts_with('i') {
                        &mut dl.int_align
                    } else {
                        &mut dl.float_align
                    };
                    table.insert(bits, num(*abi)?);
                }
                Some('n') if head != "ni" => {
                    dl.native_ints = std::iter::once(&head[1..])
                        .chain(rest.iter().copied())
                        .map(num)
                        .collect::<Result<_>>()?;
                }
                Some('S') => dl.stack_align = num(&head[1..])?,
                // Mangling, vector, aggregate, function-pointer and non-integral specs.
                Some('m' | 'v' | 'a' | 'F' | 'n' | 'A' | 'P' | 'G') => {}
                _ => return Err(invalid(format!("unrecognized spec '{spec}'"))),
            }
        }
        Ok(dl)
    }

    /// The string this layout was parsed from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Storage size in bytes.
    pub fn size_of(&self, ty: ScalarType) -> u64 {
        match ty {
            ScalarType::Bool | ScalarType::I8 => 1,
            ScalarType::I16 | ScalarType::F16 => 2,
            ScalarType::I32 | ScalarType::F32 => 4,
            ScalarType::I64 | ScalarType::F64 => 8,
            ScalarType::Ptr => u64::from(self.pointer_bits / 8),
        }
    }

    /// ABI alignment in bytes.
    pub fn abi_align(&self, ty: ScalarType) -> u64 {
        let bits = match ty {
            ScalarType::Bool | ScalarType::I8 => self.int_bits_align(8),
            ScalarType::I16 => self.int_bits_align(16),
            ScalarType::I32 => self.int_bits_align(32),
            ScalarType::I64 => self.int_bits_align(64),
            ScalarType::F16 => self.float_align.get(&16).copied().unwrap_or(16),
            ScalarType::F32 => self.float_align.get(&32).copied().unwrap_or(32),
            ScalarType::F64 => self.float_align.get(&64).copied().unwrap_or(64),
            ScalarType::Ptr => self.pointer_align,
        };
        u64::from(bits / 8).max(1)
    }

    fn int_bits_align(&self, bits: u32) -> u32 {
        // Unlisted widths take the alignment of the next larger listed width.
        self.int_align
            .range(bits..)
            .next()
            .map(|(_, align)| *align)
            .unwrap_or(bits)
    }

    /// Lay out `fields` in order with natural padding.
    pub fn struct_layout(&self, fields: &[ScalarType]) -> StructLayout {
        let mut offsets = Vec::with_capacity(fields.len());
        let mut offset = 0u64;
        let mut align = 1u64;
        for &field in fields {
            let a = self.abi_align(field);
            offset = offset.next_multiple_of(a);
            offsets.push(offset);
            offset += self.size_of(field);
            align = align.max(a);
        }
        StructLayout {
            offsets,
            size: offset.next_multiple_of(align),
            align,
        }
    }
}

impl fmt::Display for DataLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for DataLayout {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self> {
        DataLayout::parse(s)
    }
}
