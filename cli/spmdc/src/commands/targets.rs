//! `spmdc targets` and `spmdc cpus`: target and CPU listings.

use std::fmt::Write as _;

use anyhow::{bail, Result};
use spmd_target::cpu::best_available_isa;
use spmd_target::{Cpu, VectorTarget};

/// Render the vector-target table, optionally for one ISA family.
pub fn render_targets(family: Option<&str>) -> Result<String> {
    if let Some(f) = family {
        if !["x86", "arm", "wasm"].contains(&f) {
            bail!("unknown ISA family '{f}' (expected x86, arm or wasm)");
        }
    }
    let host = best_available_isa();
    let mut out = String::new();
    for target in VectorTarget::all() {
        let isa = target.isa();
        if family.is_some_and(|f| isa.family().to_string() != f) {
            continue;
        }
        let marker = if Some(isa) == host && target == isa.default_target() {
            " (host default)"
        } else {
            ""
        };
        writeln!(
            out,
            "  {:<18} {:<12} {:>2} x i{}{marker}",
            target.name(),
            isa.as_str(),
            target.lanes(),
            target.element_bits()
        )?;
    }
    Ok(out)
}

/// Render the CPU table.
pub fn render_cpus() -> Result<String> {
    let mut out = String::new();
    for cpu in Cpu::all() {
        let aliases = if cpu.aliases().is_empty() {
            String::new()
        } else {
            format!(" (alias {})", cpu.aliases().join(", "))
        };
        writeln!(
            out,
            "  {:<18} {:<5} up to {}{aliases}",
            cpu.name(),
            cpu.family().to_string(),
            cpu.max_isa()
        )?;
    }
    Ok(out)
}

pub fn list(family: Option<&str>) -> Result<()> {
    println!("Vector targets:");
    println!();
    print!("{}", render_targets(family)?);
    println!();
    println!("Use 'spmdc describe <target>' for details.");
    Ok(())
}

pub fn cpus() -> Result<()> {
    println!("CPUs:");
    println!();
    print!("{}", render_cpus()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_every_target() {
        let out = render_targets(None).unwrap();
        assert_eq!(out.lines().count(), VectorTarget::all().count());
        assert!(out.contains("avx512skx-x16"));
        assert!(out.contains("neon-i32x4"));
    }

    #[test]
    fn filters_by_family() {
        let out = render_targets(Some("arm")).unwrap();
        assert!(out.contains("neon-i8x16"));
        assert!(!out.contains("sse2"));
        assert!(render_targets(Some("mips")).is_err());
    }

    #[test]
    fn lists_cpus_with_aliases() {
        let out = render_cpus().unwrap();
        assert!(out.contains("skylake-avx512"));
        assert!(out.contains("alias skx"));
    }
}
