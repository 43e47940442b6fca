//! `spmdc check`: drive a context through activation from a config file.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use spmd_core::context::{MathLib, Phase};
use spmd_core::{load_config, CompilationContext};
use spmd_target::{BackendToolkit, CallingConv};

use super::describe::{render, TargetReport};
use super::Format;

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct CheckReport<'a> {
    config: &'a Path,
    phase: Phase,
    math_lib: MathLib,
    calling_convention: CallingConv,
    suppressed_lines: usize,
    dump_stages: &'a [u32],
    skip_stages: &'a [u32],
    target: TargetReport,
}

/// Load `path`, activate a context with it and report the result.
///
/// Fails when the file cannot be read, when a name in it is unknown, or when
/// the target cannot be built.
pub fn run(path: &Path, toolkit: Box<dyn BackendToolkit>, format: Option<&str>) -> Result<String> {
    let format = Format::parse(format)?;
    let config =
        load_config(path).with_context(|| format!("failed to load {}", path.display()))?;
    let mut ctx: CompilationContext = config
        .build_context(toolkit)
        .with_context(|| format!("invalid configuration in {}", path.display()))?;

    let target = ctx.target()?;
    let out = match format {
        Format::Json => {
            let report = CheckReport {
                config: path,
                phase: ctx.phase(),
                math_lib: ctx.settings().math_lib,
                calling_convention: ctx.calling_conv(),
                suppressed_lines: ctx.suppressions().len(),
                dump_stages: &config.codegen.dump_stages,
                skip_stages: &config.codegen.skip_stages,
                target: TargetReport::new(target, ctx.opt()),
            };
            let mut json = serde_json::to_string_pretty(&report)?;
            json.push('\n');
            json
        }
        Format::Human => {
            let mut out = String::new();
            writeln!(out, "{}: ok ({})", path.display(), ctx.phase())?;
            writeln!(out, "  Math library:     {:?}", ctx.settings().math_lib)?;
            writeln!(out, "  Calling conv:     {:?}", ctx.calling_conv())?;
            writeln!(out, "  Suppressed lines: {}", ctx.suppressions().len())?;
            writeln!(out)?;
            out.push_str(&render(target, ctx.opt(), Format::Human)?);
            out
        }
    };
    ctx.tear_down();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spmd_target::BuiltinToolkit;

    fn write_config(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("spmd.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn valid_config_reports_active_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "[target]\ntarget = \"avx2-i32x8\"\nos = \"windows\"\n\n[[diagnostics.suppress]]\nfile = \"a.ispc\"\nline = 4\n",
        );
        let out = run(&path, Box::new(BuiltinToolkit), Some("json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["phase"], "active");
        assert_eq!(value["calling-convention"], "x86-vector-call");
        assert_eq!(value["suppressed-lines"], 1);
        assert_eq!(value["target"]["target"], "avx2-i32x8");
    }

    #[test]
    fn human_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[target]\ntarget = \"neon-i32x4\"\nos = \"linux\"\n");
        let out = run(&path, Box::new(BuiltinToolkit), None).unwrap();
        assert!(out.contains(": ok (active)"));
        assert!(out.contains("=== Target: neon-i32x4 ==="));
    }

    #[test]
    fn invalid_target_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "[target]\ntarget = \"avx512skx-x16\"\ncpu = \"core2\"\nos = \"linux\"\n",
        );
        let err = run(&path, Box::new(BuiltinToolkit), None).unwrap_err();
        assert!(format!("{err:#}").contains("invalid configuration"));
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(&dir.path().join("nope.toml"), Box::new(BuiltinToolkit), None).unwrap_err();
        assert!(format!("{err:#}").contains("failed to load"));
    }
}
