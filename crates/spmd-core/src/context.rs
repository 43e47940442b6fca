//! Global compilation context.
//!
//! One [`CompilationContext`] exists per compiler invocation. It is created
//! in [`Phase::Configuring`], where the driver fills in [`Settings`] and the
//! [`OptConfig`]. [`CompilationContext::activate`] builds the target and
//! freezes everything except the warning-suppression map, the pass
//! dump/skip sets and the arena. [`CompilationContext::tear_down`] releases
//! the arena, the target and the backend toolkit, in that order.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use spmd_target::{
    BackendToolkit, BuiltinToolkit, CallingConv, CodegenPolicy, OptConfig, PerfWarning, Target,
    TargetOs, TargetRequest,
};

use crate::arena::Bookkeeper;
use crate::error::{ContextError, Result};
use crate::lang::WrapSemantics;
use crate::source::{SourcePos, WarningSuppressions};

/// Pass number of the stage before any optimization.
pub const PRE_OPT_NUMBER: u32 = 0;
/// Pass number of the first optimization stage.
pub const INIT_OPT_NUMBER: u32 = 10;
/// Largest valid pass number.
pub const LAST_OPT_NUMBER: u32 = 1000;

/// Lifecycle phase of a [`CompilationContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Settings may change; no target yet.
    Configuring,
    /// Target built; configuration frozen.
    Active,
    /// Everything released.
    TornDown,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Configuring => "configuring",
            Phase::Active => "active",
            Phase::TornDown => "torn down",
        };
        f.write_str(name)
    }
}

/// Math library used for transcendental functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MathLib {
    /// The compiler's own implementation.
    #[default]
    Default,
    /// Faster, less precise approximations.
    Fast,
    /// Intel SVML.
    Svml,
    /// The system libm, called once per lane.
    System,
}

/// Backend code-generation optimization level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CodegenOptLevel {
    None,
    #[default]
    Aggressive,
}

/// Which ASTs to dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AstDump {
    #[default]
    None,
    User,
    All,
}

/// Debug information format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DebugInfoType {
    #[default]
    None,
    Dwarf,
    CodeView,
}

/// Run-level toggles of one compiler invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    pub math_lib: MathLib,
    pub codegen_opt_level: CodegenOptLevel,
    /// Compile the standard library into the module.
    pub include_stdlib: bool,
    /// Run the preprocessor.
    pub run_cpp: bool,
    /// Stop after preprocessing.
    pub only_cpp: bool,
    pub debug_print: bool,
    pub ast_dump: AstDump,
    pub omit_frame_pointer: bool,
    /// Emit one object with dispatch only, no per-target copies of helpers.
    pub slim_binary: bool,
    pub warnings_as_errors: bool,
    /// Semantics of signed integer overflow.
    pub signed_int_wrap: WrapSemantics,
    pub disable_line_wrap: bool,
    pub emit_perf_warnings: bool,
    pub disable_warnings: bool,
    pub quiet: bool,
    pub force_color: bool,
    pub emit_instrumentation: bool,
    pub debug_info: DebugInfoType,
    pub dwarf_version: u32,
    /// Append the target suffix to exported function names.
    pub mangle_functions_with_target: bool,
    pub enable_llvm_intrinsics: bool,
    /// Alignment in bytes forced on every vector memory access.
    pub force_alignment: Option<u32>,
    pub dllexport: bool,
    pub multi_target: bool,
    /// Stop after this many errors.
    pub error_limit: Option<u32>,
    pub time_trace: bool,
    pub darwin_version_min: Option<String>,
    /// Calling convention; resolved from the target when uninitialized.
    pub calling_conv: CallingConv,
    pub cwd: Option<PathBuf>,
    pub include_paths: Vec<PathBuf>,
    pub cpp_args: Vec<String>,
    pub dump_file_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            math_lib: MathLib::Default,
            codegen_opt_level: CodegenOptLevel::Aggressive,
            include_stdlib: true,
            run_cpp: true,
            only_cpp: false,
            debug_print: false,
            ast_dump: AstDump::None,
            omit_frame_pointer: false,
            slim_binary: false,
            warnings_as_errors: false,
            signed_int_wrap: WrapSemantics::Nsw,
            disable_line_wrap: false,
            emit_perf_warnings: true,
            disable_warnings: false,
            quiet: false,
            force_color: false,
            emit_instrumentation: false,
            debug_info: DebugInfoType::None,
            dwarf_version: 3,
            mangle_functions_with_target: false,
            enable_llvm_intrinsics: false,
            force_alignment: None,
            dllexport: false,
            multi_target: false,
            error_limit: None,
            time_trace: false,
            darwin_version_min: None,
            calling_conv: CallingConv::Uninitialized,
            cwd: None,
            include_paths: Vec::new(),
            cpp_args: Vec::new(),
            dump_file_path: None,
        }
    }
}

/// Process-wide state of one compilation.
pub struct CompilationContext {
    phase: Phase,
    // Field order is drop order: objects, then the target, then the toolkit.
    arena: Bookkeeper,
    target: Option<Target>,
    toolkit: Option<Box<dyn BackendToolkit>>,
    opt: OptConfig,
    settings: Settings,
    suppressions: WarningSuppressions,
    dump_stages: BTreeSet<u32>,
    skip_stages: BTreeSet<u32>,
}

impl fmt::Debug for CompilationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompilationContext")
            .field("phase", &self.phase)
            .field("target", &self.target)
            .field("toolkit", &self.toolkit.as_ref().map(|t| t.name()))
            .field("opt", &self.opt)
            .field("settings", &self.settings)
            .field("arena", &self.arena)
            .finish_non_exhaustive()
    }
}

impl CompilationContext {
    /// A context in [`Phase::Configuring`] with default settings.
    pub fn new(toolkit: Box<dyn BackendToolkit>) -> Self {
        log::debug!("compilation context created with the {} toolkit", toolkit.name());
        Self {
            phase: Phase::Configuring,
            arena: Bookkeeper::new(),
            target: None,
            toolkit: Some(toolkit),
            opt: OptConfig::default(),
            settings: Settings::default(),
            suppressions: WarningSuppressions::new(),
            dump_stages: BTreeSet::new(),
            skip_stages: BTreeSet::new(),
        }
    }

    /// A context using [`BuiltinToolkit`].
    pub fn with_builtin_toolkit() -> Self {
        Self::new(Box::new(BuiltinToolkit))
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn require(&self, expected: Phase, operation: &'static str) -> Result<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(ContextError::WrongPhase {
                operation,
                phase: self.phase,
            })
        }
    }

    fn require_live(&self, operation: &'static str) -> Result<()> {
        if self.phase == Phase::TornDown {
            Err(ContextError::WrongPhase {
                operation,
                phase: self.phase,
            })
        } else {
            Ok(())
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Mutable settings; only while configuring.
    pub fn configure(&mut self) -> Result<&mut Settings> {
        self.require(Phase::Configuring, "changing settings")?;
        Ok(&mut self.settings)
    }

    pub fn opt(&self) -> &OptConfig {
        &self.opt
    }

    /// Mutable optimization switches; only while configuring.
    pub fn opt_mut(&mut self) -> Result<&mut OptConfig> {
        self.require(Phase::Configuring, "changing optimization options")?;
        Ok(&mut self.opt)
    }

    /// Build the target and enter [`Phase::Active`].
    ///
    /// An invalid target is fatal: the error is returned and the context
    /// stays in [`Phase::Configuring`].
    pub fn activate(&mut self, request: TargetRequest) -> Result<&Target> {
        self.require(Phase::Configuring, "activating")?;
        let name = request.target.to_string();
        let toolkit = self.toolkit.as_deref().ok_or(ContextError::WrongPhase {
            operation: "activating",
            phase: self.phase,
        })?;
        let target = Target::create(request, toolkit).map_err(|source| {
            log::error!("cannot compile for target '{name}': {source}");
            ContextError::InvalidTarget {
                target: name,
                source,
            }
        })?;

        if self.settings.calling_conv == CallingConv::Uninitialized {
            self.settings.calling_conv = target.calling_convention();
        }
        log::info!("compilation context active for {target}");
        self.phase = Phase::Active;
        let target: &Target = self.target.insert(target);
        Ok(target)
    }

    /// The active target.
    pub fn target(&self) -> Result<&Target> {
        self.require(Phase::Active, "querying the target")?;
        self.target.as_ref().ok_or(ContextError::WrongPhase {
            operation: "querying the target",
            phase: self.phase,
        })
    }

    /// OS of the active target.
    pub fn target_os(&self) -> Result<TargetOs> {
        self.target().map(Target::os)
    }

    pub fn calling_conv(&self) -> CallingConv {
        self.settings.calling_conv
    }

    /// Policy view over the active target and the frozen options.
    pub fn policy(&self) -> Result<CodegenPolicy<'_>> {
        Ok(self.target()?.policy(&self.opt))
    }

    /// The object arena; registration is allowed once active.
    pub fn arena(&self) -> Result<&Bookkeeper> {
        self.require(Phase::Active, "allocating compiler objects")?;
        Ok(&self.arena)
    }

    /// Silence warnings on `line` of `file`.
    pub fn suppress_warning(&mut self, line: u32, file: impl Into<String>) -> Result<()> {
        self.require_live("suppressing warnings")?;
        self.suppressions.suppress(line, file);
        Ok(())
    }

    pub fn suppressions(&self) -> &WarningSuppressions {
        &self.suppressions
    }

    /// Whether a diagnostic at `pos` should be dropped.
    pub fn is_warning_suppressed(&self, pos: &SourcePos) -> bool {
        self.settings.disable_warnings || self.suppressions.covers(pos)
    }

    fn check_stage(stage: u32) -> Result<()> {
        if (PRE_OPT_NUMBER..=LAST_OPT_NUMBER).contains(&stage) {
            Ok(())
        } else {
            Err(ContextError::StageOutOfRange {
                stage,
                min: PRE_OPT_NUMBER,
                max: LAST_OPT_NUMBER,
            })
        }
    }

    /// Dump the module after optimization stage `stage`.
    pub fn add_dump_stage(&mut self, stage: u32) -> Result<()> {
        self.require_live("selecting dump stages")?;
        Self::check_stage(stage)?;
        self.dump_stages.insert(stage);
        Ok(())
    }

    /// Skip optimization stage `stage`.
    pub fn add_skip_stage(&mut self, stage: u32) -> Result<()> {
        self.require_live("selecting skipped stages")?;
        Self::check_stage(stage)?;
        self.skip_stages.insert(stage);
        Ok(())
    }

    pub fn dumps_stage(&self, stage: u32) -> bool {
        self.dump_stages.contains(&stage)
    }

    pub fn skips_stage(&self, stage: u32) -> bool {
        self.skip_stages.contains(&stage)
    }

    /// Report a performance pitfall at most once per kind.
    ///
    /// Returns whether the warning was emitted. Nothing is emitted when
    /// performance warnings or all warnings are off, when `pos` is
    /// suppressed, when the kind does not apply to the target, or when it
    /// has already been reported.
    pub fn perf_warning(&self, kind: PerfWarning, pos: &SourcePos, message: &str) -> bool {
        let Ok(target) = self.target() else {
            return false;
        };
        if !self.settings.emit_perf_warnings || self.is_warning_suppressed(pos) {
            return false;
        }
        if !target.take_warning(kind) {
            return false;
        }
        log::warn!("{pos}: performance warning: {message}");
        true
    }

    /// Whether the target can use intrinsic `name`; reports it at `pos` when not.
    pub fn check_intrinsic_support(&self, name: &str, pos: &SourcePos) -> Result<bool> {
        let target = self.target()?;
        let supported = target.check_intrinsic_support(name);
        if !supported && !self.is_warning_suppressed(pos) {
            log::error!("{pos}: intrinsic '{name}' is not supported on {target}");
        }
        Ok(supported)
    }

    /// Release the arena, the target and the toolkit.
    ///
    /// Returns the number of arena objects destroyed. Calling it again does
    /// nothing.
    pub fn tear_down(&mut self) -> usize {
        if self.phase == Phase::TornDown {
            return 0;
        }
        let released = self.arena.release_all();
        self.target = None;
        self.toolkit = None;
        self.phase = Phase::TornDown;
        log::info!("compilation context torn down ({released} objects released)");
        released
    }
}

impl Drop for CompilationContext {
    fn drop(&mut self) {
        self.tear_down();
    }
}
