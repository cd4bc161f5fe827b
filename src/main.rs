use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use object_assembly::{
    config_stub, load_config, validate_config, AssemblyEngine, AssemblyPlan, AssemblyReport,
    ConstantContainer, ContainerRegistry, ConversionPolicy, EngineOptions, JsonAccessor,
    MissingKeyPolicy,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "oasm", version, about = "Declarative object assembly")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Enrich JSON targets from constant containers
    Assemble(AssembleArgs),
    /// Validate a config and print its compiled plan
    Check(CheckArgs),
    /// Print a starter config
    Stub(StubArgs),
}

#[derive(Parser, Debug)]
struct AssembleArgs {
    /// Path to the assembly config JSON
    #[arg(long)]
    config: PathBuf,

    /// Container data: {"namespace": {"key": source, ...}, ...}
    #[arg(long)]
    data: PathBuf,

    /// Target JSON: a single object or an array of objects
    #[arg(long)]
    input: PathBuf,

    /// Target type name declared in the config
    #[arg(long = "type", value_name = "TYPE")]
    target_type: String,

    /// Output path for the assembled targets (stdout when omitted)
    #[arg(long, value_name = "PATH")]
    out: Option<PathBuf>,

    /// Output path for the machine-readable report
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,

    /// Only run operations tagged with this group (repeatable)
    #[arg(long = "group", value_name = "GROUP")]
    groups: Vec<String>,

    /// Keep null placeholders for missing batch keys
    #[arg(long)]
    placeholder_missing: bool,

    /// Treat conversion failures as errors that stop the operation
    #[arg(long)]
    abort_on_conversion: bool,
}

#[derive(Parser, Debug)]
struct CheckArgs {
    /// Path to the assembly config JSON
    #[arg(long)]
    config: PathBuf,
}

#[derive(Parser, Debug)]
struct StubArgs {
    /// Write the stub here instead of stdout
    #[arg(long, value_name = "PATH")]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Assemble(args) => cmd_assemble(args),
        Commands::Check(args) => cmd_check(args),
        Commands::Stub(args) => cmd_stub(args),
    }
}

fn cmd_assemble(args: AssembleArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    validate_config(&config)?;
    let plan = Arc::new(AssemblyPlan::build(&config));
    let registry = Arc::new(load_containers(&args.data)?);

    let input: Value = read_json(&args.input)?;
    let single = !input.is_array();
    let mut targets = match input {
        Value::Array(items) => items,
        other => vec![other],
    };

    let mut options = EngineOptions::default();
    if args.placeholder_missing {
        options = options.with_missing_key(MissingKeyPolicy::Placeholder);
    }
    if args.abort_on_conversion {
        options = options.with_conversion(ConversionPolicy::Abort);
    }
    let engine = AssemblyEngine::new(plan, registry, JsonAccessor::new()).with_options(options);

    let report = if args.groups.is_empty() {
        engine.assemble(&args.target_type, &mut targets)?
    } else {
        engine.assemble_groups(&args.target_type, &mut targets, &args.groups)?
    };

    let output = if single {
        targets.into_iter().next().unwrap_or(Value::Null)
    } else {
        Value::Array(targets)
    };
    match &args.out {
        Some(path) => write_json(path, &output)?,
        None => println!(
            "{}",
            serde_json::to_string_pretty(&output).context("serialize targets")?
        ),
    }
    if let Some(path) = &args.report {
        write_json(path, &report)?;
    }
    print_summary(&report);

    if report.has_errors() {
        return Err(anyhow!(
            "assembly of {} finished with {} error(s)",
            report.target_type,
            report.errors().count()
        ));
    }
    Ok(())
}

fn cmd_check(args: CheckArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    validate_config(&config)?;
    let plan = AssemblyPlan::build(&config);
    for type_name in plan.type_names() {
        let target = plan.target(type_name)?;
        println!("{type_name}");
        for (stage_index, stage) in target.stages(None).iter().enumerate() {
            for operation in stage {
                println!(
                    "  [stage {stage_index}] {} ({:?}, {} rule(s))",
                    operation.label(),
                    operation.handler,
                    operation.rules.len()
                );
                for rule in operation.rules.iter() {
                    println!("      {rule}");
                }
            }
        }
    }
    Ok(())
}

fn cmd_stub(args: StubArgs) -> Result<()> {
    let stub = config_stub()?;
    match &args.out {
        Some(path) => {
            std::fs::write(path, format!("{stub}\n"))
                .with_context(|| format!("write {}", path.display()))?;
        }
        None => println!("{stub}"),
    }
    Ok(())
}

/// Build one constant container per top-level namespace of the data file.
fn load_containers(path: &Path) -> Result<ContainerRegistry> {
    let data: Value = read_json(path)?;
    let namespaces = data
        .as_object()
        .ok_or_else(|| anyhow!("{} must hold a JSON object of namespaces", path.display()))?;
    let registry = ContainerRegistry::new();
    for (namespace, entries) in namespaces {
        let container = ConstantContainer::from_json(namespace.as_str(), entries)
            .with_context(|| format!("load container data from {}", path.display()))?;
        registry.register(container);
    }
    Ok(registry)
}

fn print_summary(report: &AssemblyReport) {
    eprintln!(
        "{}: {} target(s), {} lookup(s), {} write(s), {} warning(s), {} error(s)",
        report.target_type,
        report.targets,
        report.lookups,
        report.writes,
        report.warnings().count(),
        report.errors().count()
    );
    for issue in &report.issues {
        let target = issue
            .target
            .map(|index| format!("target {index}"))
            .unwrap_or_else(|| "all targets".to_string());
        let operation = issue.operation.as_deref().unwrap_or("-");
        eprintln!(
            "  {:?} {} [{operation}] {target}: {}",
            issue.severity, issue.code, issue.message
        );
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("serialize JSON")?;
    std::fs::write(path, format!("{json}\n")).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let value = serde_json::from_str(&content).with_context(|| format!("parse {}", path.display()))?;
    Ok(value)
}
