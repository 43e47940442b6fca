//! TOML driver configuration.
//!
//! A `spmd.toml` file describes one compiler invocation: the target request,
//! the optimization switches and the run-level settings. Every key is
//! optional.
//!
//! ```toml
//! [target]
//! target = "avx2-i32x8"
//! os = "linux"
//!
//! [opt]
//! level = "full"
//! disable-gathers = true
//!
//! [codegen]
//! opt-flags = ["fast-math"]
//! dump-stages = [10]
//!
//! [[diagnostics.suppress]]
//! file = "kernel.ispc"
//! line = 42
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use spmd_target::{BackendToolkit, CallingConv, OptConfig, TargetRequest};

use crate::context::{
    AstDump, CodegenOptLevel, CompilationContext, DebugInfoType, MathLib, Settings,
};
use crate::error::ConfigError;
use crate::lang::WrapSemantics;

/// Code-generation settings (`[codegen]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CodegenSection {
    pub math_lib: MathLib,
    pub codegen_opt_level: CodegenOptLevel,
    pub include_stdlib: bool,
    pub run_cpp: bool,
    pub only_cpp: bool,
    pub omit_frame_pointer: bool,
    pub slim_binary: bool,
    pub signed_int_wrap: WrapSemantics,
    pub debug_info: DebugInfoType,
    pub dwarf_version: u32,
    pub mangle_functions_with_target: bool,
    pub enable_llvm_intrinsics: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_alignment: Option<u32>,
    pub dllexport: bool,
    pub multi_target: bool,
    pub calling_conv: CallingConv,
    pub time_trace: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub darwin_version_min: Option<String>,
    /// Optimization switches by command-line name, applied after `[opt]`.
    pub opt_flags: Vec<String>,
    pub dump_stages: Vec<u32>,
    pub skip_stages: Vec<u32>,
}

impl Default for CodegenSection {
    fn default() -> Self {
        let s = Settings::default();
        Self {
            math_lib: s.math_lib,
            codegen_opt_level: s.codegen_opt_level,
            include_stdlib: s.include_stdlib,
            run_cpp: s.run_cpp,
            only_cpp: s.only_cpp,
            omit_frame_pointer: s.omit_frame_pointer,
            slim_binary: s.slim_binary,
            signed_int_wrap: s.signed_int_wrap,
            debug_info: s.debug_info,
            dwarf_version: s.dwarf_version,
            mangle_functions_with_target: s.mangle_functions_with_target,
            enable_llvm_intrinsics: s.enable_llvm_intrinsics,
            force_alignment: s.force_alignment,
            dllexport: s.dllexport,
            multi_target: s.multi_target,
            calling_conv: s.calling_conv,
            time_trace: s.time_trace,
            darwin_version_min: s.darwin_version_min,
            opt_flags: Vec::new(),
            dump_stages: Vec::new(),
            skip_stages: Vec::new(),
        }
    }
}

/// A silenced source line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suppression {
    pub file: String,
    pub line: u32,
}

/// Diagnostic settings (`[diagnostics]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DiagnosticsSection {
    pub debug_print: bool,
    pub ast_dump: AstDump,
    pub warnings_as_errors: bool,
    pub disable_line_wrap: bool,
    pub emit_perf_warnings: bool,
    pub disable_warnings: bool,
    pub quiet: bool,
    pub force_color: bool,
    pub emit_instrumentation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_limit: Option<u32>,
    pub suppress: Vec<Suppression>,
}

impl Default for DiagnosticsSection {
    fn default() -> Self {
        let s = Settings::default();
        Self {
            debug_print: s.debug_print,
            ast_dump: s.ast_dump,
            warnings_as_errors: s.warnings_as_errors,
            disable_line_wrap: s.disable_line_wrap,
            emit_perf_warnings: s.emit_perf_warnings,
            disable_warnings: s.disable_warnings,
            quiet: s.quiet,
            force_color: s.force_color,
            emit_instrumentation: s.emit_instrumentation,
            error_limit: s.error_limit,
            suppress: Vec::new(),
        }
    }
}

/// Search paths and preprocessor arguments (`[paths]`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PathsSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    pub include_paths: Vec<PathBuf>,
    pub cpp_args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dump_file_path: Option<PathBuf>,
}

/// Complete driver configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DriverConfig {
    pub target: TargetRequest,
    pub opt: OptConfig,
    pub codegen: CodegenSection,
    pub diagnostics: DiagnosticsSection,
    pub paths: PathsSection,
}

impl DriverConfig {
    /// Run-level settings described by this configuration.
    pub fn settings(&self) -> Settings {
        let c = &self.codegen;
        let d = &self.diagnostics;
        let p = &self.paths;
        Settings {
            math_lib: c.math_lib,
            codegen_opt_level: c.codegen_opt_level,
            include_stdlib: c.include_stdlib,
            run_cpp: c.run_cpp,
            only_cpp: c.only_cpp,
            debug_print: d.debug_print,
            ast_dump: d.ast_dump,
            omit_frame_pointer: c.omit_frame_pointer,
            slim_binary: c.slim_binary,
            warnings_as_errors: d.warnings_as_errors,
            signed_int_wrap: c.signed_int_wrap,
            disable_line_wrap: d.disable_line_wrap,
            emit_perf_warnings: d.emit_perf_warnings,
            disable_warnings: d.disable_warnings,
            quiet: d.quiet,
            force_color: d.force_color,
            emit_instrumentation: d.emit_instrumentation,
            debug_info: c.debug_info,
            dwarf_version: c.dwarf_version,
            mangle_functions_with_target: c.mangle_functions_with_target,
            enable_llvm_intrinsics: c.enable_llvm_intrinsics,
            force_alignment: c.force_alignment,
            dllexport: c.dllexport,
            multi_target: c.multi_target,
            error_limit: d.error_limit,
            time_trace: c.time_trace,
            darwin_version_min: c.darwin_version_min.clone(),
            calling_conv: c.calling_conv,
            cwd: p.cwd.clone(),
            include_paths: p.include_paths.clone(),
            cpp_args: p.cpp_args.clone(),
            dump_file_path: p.dump_file_path.clone(),
        }
    }

    /// Optimization switches with `opt-flags` applied on top of `[opt]`.
    pub fn resolved_opt(&self) -> Result<OptConfig, ConfigError> {
        let mut opt = self.opt.clone();
        for flag in &self.codegen.opt_flags {
            opt.apply_flag(flag)?;
        }
        Ok(opt)
    }

    /// Fill in a configuring context.
    pub fn apply(&self, ctx: &mut CompilationContext) -> Result<(), ConfigError> {
        *ctx.opt_mut()? = self.resolved_opt()?;
        *ctx.configure()? = self.settings();
        for s in &self.diagnostics.suppress {
            ctx.suppress_warning(s.line, s.file.as_str())?;
        }
        for &stage in &self.codegen.dump_stages {
            ctx.add_dump_stage(stage)?;
        }
        for &stage in &self.codegen.skip_stages {
            ctx.add_skip_stage(stage)?;
        }
        Ok(())
    }

    /// Build an active context, or fail before any source is read.
    pub fn build_context(
        &self,
        toolkit: Box<dyn BackendToolkit>,
    ) -> Result<CompilationContext, ConfigError> {
        let mut ctx = CompilationContext::new(toolkit);
        self.apply(&mut ctx)?;
        ctx.activate(self.target.clone())?;
        Ok(ctx)
    }
}

/// Load a driver configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<DriverConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

/// Parse a driver configuration from a TOML string.
pub fn parse_config(toml_str: &str) -> Result<DriverConfig, ConfigError> {
    let config: DriverConfig = toml::from_str(toml_str)?;
    Ok(config)
}

/// Serialize a driver configuration to pretty TOML.
pub fn config_to_toml(config: &DriverConfig) -> Result<String, ConfigError> {
    let toml_str = toml::to_string_pretty(config)?;
    Ok(toml_str)
}

/// Default configuration for the host, as TOML.
pub fn template() -> Result<String, ConfigError> {
    config_to_toml(&DriverConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Phase;
    use crate::error::ContextError;
    use spmd_target::{BuiltinToolkit, OptLevel, TargetError, TargetOs};

    #[test]
    fn parse_minimal() {
        let config = parse_config(
            r#"
[target]
target = "avx2-i32x8"
os = "linux"

[opt]
level = "full"
disable-gathers = true
"#,
        )
        .unwrap();
        assert_eq!(config.target.target.name(), "avx2-i32x8");
        assert_eq!(config.target.os, TargetOs::Linux);
        assert_eq!(config.opt.level, OptLevel::Full);
        assert!(config.opt.disable_gathers);
        assert!(config.opt.unroll_loops);
        assert!(config.codegen.include_stdlib);
        assert!(config.diagnostics.emit_perf_warnings);
    }

    #[test]
    fn unknown_target_name_is_rejected() {
        let err = parse_config("[target]\ntarget = \"avx3-i32x8\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn round_trip() {
        let mut config = DriverConfig::default();
        config.target = TargetRequest::new("neon-i32x4".parse().unwrap()).with_os(TargetOs::Android);
        config.opt.fast_math = true;
        config.codegen.force_alignment = Some(64);
        config.codegen.opt_flags = vec!["disable-fma".into()];
        config.diagnostics.suppress.push(Suppression {
            file: "a.ispc".into(),
            line: 3,
        });
        config.paths.include_paths.push(PathBuf::from("include"));

        let toml_str = config_to_toml(&config).unwrap();
        let parsed = parse_config(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn template_parses() {
        let parsed = parse_config(&template().unwrap()).unwrap();
        assert_eq!(parsed, DriverConfig::default());
    }

    #[test]
    fn settings_follow_sections() {
        let config = parse_config(
            r#"
[codegen]
math-lib = "fast"
slim-binary = true
force-alignment = 32

[diagnostics]
quiet = true
error-limit = 5

[paths]
cpp-args = ["-DN=4"]
"#,
        )
        .unwrap();
        let s = config.settings();
        assert_eq!(s.math_lib, MathLib::Fast);
        assert!(s.slim_binary);
        assert_eq!(s.force_alignment, Some(32));
        assert!(s.quiet);
        assert_eq!(s.error_limit, Some(5));
        assert_eq!(s.cpp_args, vec!["-DN=4".to_string()]);
    }

    #[test]
    fn opt_flags_apply_after_opt_section() {
        let config = parse_config(
            r#"
[opt]
fast-math = false

[codegen]
opt-flags = ["fast-math", "disable-scatters"]
"#,
        )
        .unwrap();
        let opt = config.resolved_opt().unwrap();
        assert!(opt.fast_math);
        assert!(opt.disable_scatters);
    }

    #[test]
    fn unknown_opt_flag_is_an_error() {
        let config = parse_config("[codegen]\nopt-flags = [\"turbo\"]\n").unwrap();
        assert!(matches!(
            config.resolved_opt(),
            Err(ConfigError::Target(TargetError::UnknownOptFlag { .. }))
        ));
    }

    #[test]
    fn build_context_activates() {
        let config = parse_config(
            r#"
[target]
target = "avx512skx-x16"
os = "linux"

[codegen]
dump-stages = [10, 20]

[[diagnostics.suppress]]
file = "k.ispc"
line = 9
"#,
        )
        .unwrap();
        let ctx = config.build_context(Box::new(BuiltinToolkit)).unwrap();
        assert_eq!(ctx.phase(), Phase::Active);
        assert_eq!(ctx.target().unwrap().vector_width(), 16);
        assert!(ctx.dumps_stage(20));
        assert!(ctx.suppressions().is_suppressed(9, "k.ispc"));
    }

    #[test]
    fn build_context_rejects_incompatible_cpu() {
        let config = parse_config(
            r#"
[target]
target = "avx512skx-x16"
cpu = "core2"
os = "linux"
"#,
        )
        .unwrap();
        let err = config.build_context(Box::new(BuiltinToolkit)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Context(ContextError::InvalidTarget { .. })
        ));
    }

    #[test]
    fn out_of_range_stage_is_an_error() {
        let config = parse_config("[codegen]\nskip-stages = [5000]\n").unwrap();
        let err = config.build_context(Box::new(BuiltinToolkit)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Context(ContextError::StageOutOfRange { stage: 5000, .. })
        ));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spmd.toml");
        std::fs::write(&path, "[target]\ntarget = \"sse4.2-i32x4\"\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.target.target.name(), "sse4.2-i32x4");

        let missing = load_config(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }
}
