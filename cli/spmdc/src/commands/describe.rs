//! `spmdc describe`: target descriptor and resolved code-generation policy.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use anyhow::{Context, Result};
use serde::Serialize;
use spmd_target::{
    AccessStrategy, BackendToolkit, CallingConv, CodegenPolicy, MaskedStoreStrategy, OptConfig,
    Target, TargetRequest, TargetSummary,
};

use super::Format;

/// Command-line inputs of `describe`.
#[derive(Debug, Default)]
pub struct DescribeRequest<'a> {
    pub target: Option<&'a str>,
    pub cpu: Option<&'a str>,
    pub arch: Option<&'a str>,
    pub os: Option<&'a str>,
    pub opt_flags: &'a [String],
}

impl DescribeRequest<'_> {
    fn to_target_request(&self) -> Result<TargetRequest> {
        let mut request = match self.target {
            Some(name) => TargetRequest::new(name.parse()?),
            None => TargetRequest::default(),
        };
        if let Some(cpu) = self.cpu {
            request = request.with_cpu(cpu);
        }
        if let Some(arch) = self.arch {
            request = request.with_arch(arch.parse()?);
        }
        if let Some(os) = self.os {
            request = request.with_os(os.parse()?);
        }
        Ok(request)
    }

    fn to_opt(&self) -> Result<OptConfig> {
        let mut opt = OptConfig::default();
        for flag in self.opt_flags {
            opt.apply_flag(flag)?;
        }
        Ok(opt)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct PolicyReport {
    gather: AccessStrategy,
    scatter: AccessStrategy,
    masked_store: MaskedStoreStrategy,
    fma: bool,
    coalescing: bool,
    zmm: bool,
    fast_masked_vload: bool,
    unroll_loops: bool,
    asserts: bool,
    force_32bit_addressing: bool,
}

impl PolicyReport {
    fn new(policy: &CodegenPolicy<'_>) -> Self {
        Self {
            gather: policy.gather_strategy(),
            scatter: policy.scatter_strategy(),
            masked_store: policy.masked_store_strategy(),
            fma: policy.use_fma(),
            coalescing: policy.use_coalescing(),
            zmm: policy.use_zmm(),
            fast_masked_vload: policy.fast_masked_vload(),
            unroll_loops: policy.unroll_loops(),
            asserts: policy.asserts_enabled(),
            force_32bit_addressing: policy.force_32bit_addressing(),
        }
    }
}

/// Machine-readable description of a target under a set of switches.
#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct TargetReport {
    #[serde(flatten)]
    summary: TargetSummary,
    opt_level: String,
    calling_convention: CallingConv,
    function_attributes: BTreeMap<String, String>,
    policy: PolicyReport,
    perf_warnings: Vec<&'static str>,
}

impl TargetReport {
    pub fn new(target: &Target, opt: &OptConfig) -> Self {
        let mut function_attributes = BTreeMap::new();
        target.mark_function(&mut function_attributes, opt.disable_zmm);
        let perf_warnings = target
            .relevant_warnings()
            .iter()
            .map(|w| w.describe())
            .collect();
        Self {
            summary: target.summary(),
            opt_level: opt.level.to_string(),
            calling_convention: target.calling_convention(),
            function_attributes,
            policy: PolicyReport::new(&target.policy(opt)),
            perf_warnings,
        }
    }
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "yes"
    } else {
        "no"
    }
}

/// Render a target in the requested format.
pub fn render(target: &Target, opt: &OptConfig, format: Format) -> Result<String> {
    let report = TargetReport::new(target, opt);
    if format == Format::Json {
        let mut json = serde_json::to_string_pretty(&report)?;
        json.push('\n');
        return Ok(json);
    }

    let s = &report.summary;
    let p = &s.profile;
    let mut out = String::new();
    writeln!(out, "=== Target: {} ===", s.target)?;
    writeln!(out, "  ISA:          {} ({})", s.isa, target.isa().family())?;
    writeln!(out, "  CPU:          {}", s.cpu)?;
    writeln!(out, "  Architecture: {}", s.arch)?;
    writeln!(out, "  OS:           {}", s.os)?;
    writeln!(out, "  Triple:       {}", s.triple)?;
    writeln!(out, "  Features:     {}", target.feature_string())?;
    writeln!(out, "  Suffix:       {}", s.suffix)?;
    writeln!(out, "  Calling conv: {:?}", report.calling_convention)?;
    if let Some(dl) = &s.data_layout {
        writeln!(out, "  Data layout:  {dl}")?;
    }
    writeln!(out)?;

    writeln!(out, "--- Vector geometry ---")?;
    writeln!(
        out,
        "  Gang size {} x {} bits, native width {}, alignment {} bytes",
        p.vector_width, p.data_type_width, p.native_vector_width, p.native_vector_alignment
    )?;
    writeln!(
        out,
        "  Mask: {} bit(s) per lane, free masking: {}",
        p.mask_bit_count,
        yes_no(p.masking_is_free)
    )?;
    writeln!(out)?;

    writeln!(out, "--- Capabilities ---")?;
    let caps = serde_json::to_value(target.capabilities())?;
    let mut present = Vec::new();
    let mut absent = Vec::new();
    if let Some(map) = caps.as_object() {
        for (name, value) in map {
            if value.as_bool() == Some(true) {
                present.push(name.as_str());
            } else {
                absent.push(name.as_str());
            }
        }
    }
    writeln!(out, "  Present: {}", present.join(", "))?;
    writeln!(out, "  Absent:  {}", absent.join(", "))?;
    writeln!(out)?;

    writeln!(out, "--- Policy ({}) ---", report.opt_level)?;
    let policy = &report.policy;
    writeln!(out, "  Gather:        {:?}", policy.gather)?;
    writeln!(out, "  Scatter:       {:?}", policy.scatter)?;
    writeln!(out, "  Masked store:  {:?}", policy.masked_store)?;
    writeln!(out, "  FMA:           {}", yes_no(policy.fma))?;
    writeln!(out, "  Coalescing:    {}", yes_no(policy.coalescing))?;
    writeln!(out, "  ZMM registers: {}", yes_no(policy.zmm))?;
    writeln!(out, "  32-bit offsets: {}", yes_no(policy.force_32bit_addressing))?;
    writeln!(out, "  Asserts:       {}", yes_no(policy.asserts))?;
    if !report.function_attributes.is_empty() {
        writeln!(out, "  Attributes:")?;
        for (key, value) in &report.function_attributes {
            writeln!(out, "    {key} = {value}")?;
        }
    }

    if !report.perf_warnings.is_empty() {
        writeln!(out)?;
        writeln!(out, "--- Performance warnings ---")?;
        for w in &report.perf_warnings {
            writeln!(out, "  {w}")?;
        }
    }
    Ok(out)
}

/// Build the requested target and render it.
pub fn run(
    request: &DescribeRequest<'_>,
    toolkit: &dyn BackendToolkit,
    format: Option<&str>,
) -> Result<String> {
    let format = Format::parse(format)?;
    let target_request = request.to_target_request()?;
    let name = target_request.target.name();
    let opt = request.to_opt()?;
    let target = Target::create(target_request, toolkit)
        .with_context(|| format!("cannot describe target '{name}'"))?;
    render(&target, &opt, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spmd_target::BuiltinToolkit;

    fn describe(request: &DescribeRequest<'_>, format: &str) -> Result<String> {
        run(request, &BuiltinToolkit, Some(format))
    }

    #[test]
    fn human_output_names_the_target() {
        let request = DescribeRequest {
            target: Some("avx2-i32x8"),
            os: Some("linux"),
            ..Default::default()
        };
        let out = describe(&request, "human").unwrap();
        assert!(out.contains("=== Target: avx2-i32x8 ==="));
        assert!(out.contains("x86_64-unknown-linux-gnu"));
        assert!(out.contains("Gather:        Native"));
    }

    #[test]
    fn json_reflects_overrides() {
        let flags = vec!["disable-gathers".to_string()];
        let request = DescribeRequest {
            target: Some("avx512skx-x16"),
            os: Some("linux"),
            opt_flags: &flags,
            ..Default::default()
        };
        let out = describe(&request, "json").unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["target"], "avx512skx-x16");
        assert_eq!(value["policy"]["gather"], "scalarized");
        assert_eq!(value["policy"]["scatter"], "native");
        assert_eq!(value["policy"]["masked-store"], "native");
        assert_eq!(value["vector-width"], 16);
    }

    #[test]
    fn unknown_target_fails() {
        let request = DescribeRequest {
            target: Some("avx3-i32x8"),
            ..Default::default()
        };
        assert!(describe(&request, "human").is_err());
    }

    #[test]
    fn incompatible_cpu_fails() {
        let request = DescribeRequest {
            target: Some("avx2-i32x8"),
            cpu: Some("core2"),
            os: Some("linux"),
            ..Default::default()
        };
        let err = describe(&request, "human").unwrap_err();
        assert!(format!("{err:#}").contains("cannot describe target 'avx2-i32x8'"));
    }

    #[test]
    fn unknown_opt_flag_fails() {
        let flags = vec!["turbo".to_string()];
        let request = DescribeRequest {
            target: Some("sse2-i32x4"),
            opt_flags: &flags,
            ..Default::default()
        };
        assert!(describe(&request, "json").is_err());
    }
}
