use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};

use poplan_cli::config::{self, ConfigFile, OutputFormat, PoplanConfig};
use poplan_cli::replay;
use poplan_cli::report::PlanReport;
use poplan_cli::scenario::{self, Scenario};

#[derive(Parser)]
#[command(name = "poplan", version, about = "Partial-order HTN plan refinement")]
struct Cli {
    /// Tracing filter (overrides POPLAN_LOG, RUST_LOG and the config file)
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default poplan config file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Parse and validate a scenario file without running it
    Check {
        /// Path to the scenario TOML file
        file: PathBuf,
    },
    /// Replay a scenario's actions and print the resulting plan
    Run {
        /// Path to the scenario TOML file
        file: PathBuf,
        /// Output format (overrides POPLAN_OUTPUT and the config file)
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
    },
    /// Print shell completions
    Completions {
        shell: clap_complete::Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cli_format = match &cli.command {
        Commands::Run { format, .. } => *format,
        _ => None,
    };
    let resolved = PoplanConfig::resolve(cli_format, cli.log.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&resolved.log_filter)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config::DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init { force } => cmd_init(force)?,
        Commands::Check { file } => cmd_check(&file)?,
        Commands::Run { file, .. } => cmd_run(&file, resolved.format)?,
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "poplan", &mut std::io::stdout());
        }
    }
    Ok(())
}

/// Execute `poplan init`: write the default config file.
fn cmd_init(force: bool) -> Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = ConfigFile::default();
    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  output.format  = {}", cfg.output.format);
    println!("  logging.filter = {}", cfg.logging.filter);
    Ok(())
}

fn load_scenario(file: &Path) -> Result<Scenario> {
    scenario::load_scenario(file).with_context(|| format!("invalid scenario {}", file.display()))
}

/// Execute `poplan check`: parse and validate only.
fn cmd_check(file: &Path) -> Result<()> {
    let scenario = load_scenario(file)?;

    println!("Scenario {} is valid.", scenario.problem.name);
    println!();
    println!("  Operators:   {}", scenario.operators.len());
    println!("  Composites:  {}", scenario.composites.len());
    println!("  Actions:     {}", scenario.actions.len());
    Ok(())
}

/// Execute `poplan run`: replay the scenario and print the plan.
fn cmd_run(file: &Path, format: OutputFormat) -> Result<()> {
    let scenario = load_scenario(file)?;
    let replay = replay::run(&scenario)?;
    let report = PlanReport::from_replay(&replay);

    match format {
        OutputFormat::Text => print!("{}", report.render_text()),
        OutputFormat::Json => println!("{}", report.to_json()?),
    }
    Ok(())
}
