//! spmdc: inspect SPMD compiler targets and driver configurations.

mod commands;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "spmdc", version, about = "SPMD compiler target inspector")]
struct Cli {
    /// Log construction details
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List vector targets
    Targets {
        /// Only targets of this ISA family (x86, arm, wasm)
        #[arg(long)]
        family: Option<String>,
    },
    /// List known CPUs
    Cpus,
    /// Describe one target and the code-generation policy it resolves to
    Describe {
        /// Target name (e.g., avx2-i32x8); the host's best target if omitted
        target: Option<String>,
        /// CPU name or alias
        #[arg(long)]
        cpu: Option<String>,
        /// Architecture (x86, x86-64, arm, aarch64, wasm32, wasm64)
        #[arg(long)]
        arch: Option<String>,
        /// Target OS (linux, windows, macos, ...)
        #[arg(long)]
        os: Option<String>,
        /// Optimization switch by name; repeatable
        #[arg(long = "opt", value_name = "FLAG")]
        opt_flags: Vec<String>,
        /// Backend toolkit (builtin, llvm)
        #[arg(long, default_value = "builtin")]
        backend: String,
        /// Output format (human, json)
        #[arg(long)]
        format: Option<String>,
    },
    /// Build a context from a driver configuration and report it
    Check {
        /// Configuration file
        #[arg(default_value = "spmd.toml")]
        config: PathBuf,
        /// Backend toolkit (builtin, llvm)
        #[arg(long, default_value = "builtin")]
        backend: String,
        /// Output format (human, json)
        #[arg(long)]
        format: Option<String>,
    },
    /// Print a default driver configuration
    Template,
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Targets { family } => commands::targets::list(family.as_deref()),
        Commands::Cpus => commands::targets::cpus(),
        Commands::Describe {
            target,
            cpu,
            arch,
            os,
            opt_flags,
            backend,
            format,
        } => {
            let request = commands::describe::DescribeRequest {
                target: target.as_deref(),
                cpu: cpu.as_deref(),
                arch: arch.as_deref(),
                os: os.as_deref(),
                opt_flags: &opt_flags,
            };
            let toolkit = commands::toolkit(&backend)?;
            let out = commands::describe::run(&request, &*toolkit, format.as_deref())?;
            print!("{out}");
            Ok(())
        }
        Commands::Check {
            config,
            backend,
            format,
        } => {
            let toolkit = commands::toolkit(&backend)?;
            let out = commands::check::run(&config, toolkit, format.as_deref())?;
            print!("{out}");
            Ok(())
        }
        Commands::Template => {
            print!("{}", spmd_core::template()?);
            Ok(())
        }
    }
}
