//! Faber code generator CLI

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use faber_ast::Unit;
use faber_compiler::{
    config::presets, BackendFactory, CompilerConfig, DiagnosticSeverity, Pipeline, Target,
};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "faberc")]
#[command(about = "Generate TypeScript, Python, Rust, Zig and C++ from resolved Faber units")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate files for one or more units
    Compile(CompileArgs),

    /// Print one target's output to stdout
    Emit(EmitArgs),

    /// Show available targets
    Targets,

    /// Create default configuration file
    InitConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "faber.toml")]
        output: PathBuf,
    },

    /// Validate configuration file
    ValidateConfig {
        /// Configuration file path
        path: PathBuf,
    },
}

#[derive(Args)]
struct CompileArgs {
    /// Resolved units, as JSON
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory; overrides the configured one
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Targets to generate; the configured targets when omitted
    #[arg(short, long = "target")]
    targets: Vec<String>,

    /// Spaces per indentation level
    #[arg(long)]
    indent: Option<usize>,

    /// Leave out imports, includes and helper definitions
    #[arg(long)]
    no_preamble: bool,
}

#[derive(Args)]
struct EmitArgs {
    /// Resolved unit, as JSON
    input: PathBuf,

    /// Target language
    #[arg(short, long, default_value = "faber")]
    target: String,

    /// Spaces per indentation level
    #[arg(long)]
    indent: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Compile(args) => handle_compile(args, cli.config).await,
        Commands::Emit(args) => handle_emit(args, cli.config).await,
        Commands::Targets => handle_targets(),
        Commands::InitConfig { output } => handle_init_config(&output),
        Commands::ValidateConfig { path } => handle_validate_config(&path),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<CompilerConfig> {
    let config = match path {
        Some(path) => CompilerConfig::from_file(path)?,
        None => CompilerConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn parse_targets(names: &[String]) -> anyhow::Result<Vec<Target>> {
    names
        .iter()
        .map(|name| name.parse::<Target>().with_context(|| format!("unknown target `{name}`")))
        .collect()
}

async fn read_unit(path: &Path) -> anyhow::Result<Unit> {
    let source = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    Unit::from_json(&source).with_context(|| format!("decoding {}", path.display()))
}

async fn handle_compile(args: CompileArgs, config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let mut config = load_config(config_path.as_deref())?;

    if !args.targets.is_empty() {
        config.targets = parse_targets(&args.targets)?;
    }
    if let Some(output) = args.output {
        config.output_dir = output;
    }
    if args.indent.is_some() {
        config.indent = args.indent;
    }
    if args.no_preamble {
        config.emit_preamble = false;
    }
    config.validate()?;

    let out_dir = config.output_dir.clone();
    let pipeline = std::sync::Arc::new(Pipeline::new(config));

    let mut tasks = Vec::new();
    for input in args.inputs {
        let unit = read_unit(&input).await?;
        let pipeline = pipeline.clone();
        let out_dir = out_dir.clone();
        tasks.push(tokio::task::spawn_blocking(move || {
            let report = pipeline.generate_configured(&unit);
            let written = pipeline.write(&report, &out_dir)?;
            anyhow::Ok((report, written))
        }));
    }

    let mut failures = 0;
    for task in tasks {
        let (report, written) = task.await??;
        for outcome in &report.outcomes {
            for diagnostic in &outcome.diagnostics {
                match diagnostic.severity {
                    DiagnosticSeverity::Error => error!(target_lang = %outcome.target, "{}", diagnostic.message),
                    DiagnosticSeverity::Warning => warn!(target_lang = %outcome.target, "{}", diagnostic.message),
                    DiagnosticSeverity::Info => info!(target_lang = %outcome.target, "{}", diagnostic.message),
                }
            }
            if let Err(err) = &outcome.output {
                error!("{}: {}: {}", report.unit, outcome.target, err);
                failures += 1;
            }
        }
        info!("{}: wrote {} files in {:?}", report.unit, written.len(), report.total);
    }

    if failures > 0 {
        bail!("{failures} target(s) failed");
    }
    Ok(())
}

async fn handle_emit(args: EmitArgs, config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(config_path.as_deref())?;
    let target: Target = args.target.parse()?;
    let unit = read_unit(&args.input).await?;

    let mut options = config.options_for(target);
    if args.indent.is_some() {
        options.indent = args.indent;
    }

    let backend = BackendFactory::for_target(target)?;
    let code = backend.generate_unit(&unit, &options)?;
    for diagnostic in backend.validate_output(&code) {
        warn!("{}", diagnostic.message);
    }
    print!("{code}");
    Ok(())
}

fn handle_targets() -> anyhow::Result<()> {
    println!("Available targets:");
    for name in BackendFactory::available_backends() {
        let backend = BackendFactory::create_backend(name)?;
        let info = backend.target_info();
        println!("  {:<12} .{:<4} {:?}", info.name, info.file_extension, info.memory);
    }
    Ok(())
}

fn handle_init_config(output: &Path) -> anyhow::Result<()> {
    info!("Creating configuration file at {}", output.display());

    let mut config = CompilerConfig::default();
    config.set_target_config(Target::TypeScript, presets::typescript_compact());
    config.to_file(output)?;

    info!("Configuration file created successfully!");
    Ok(())
}

fn handle_validate_config(path: &Path) -> anyhow::Result<()> {
    info!("Validating configuration file {}", path.display());

    let config = CompilerConfig::from_file(path)?;
    config.validate()?;

    info!("Configuration file is valid!");
    Ok(())
}
