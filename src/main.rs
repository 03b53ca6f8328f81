//! Workflow Contract CLI
//!
//! Runs the lint workflow checks against a workspace.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use workflow_contract::{
    load_lint_crates, run_contract_check, run_smoke_check, HarnessConfig, SmokeMode,
    SmokeOutcome, SystemRunner, Validate,
};

#[derive(Parser)]
#[command(name = "workflow-contract")]
#[command(about = "Checks the rolling release lint workflow", long_about = None)]
#[command(version)]
struct Cli {
    /// Workspace root (defaults to the current directory)
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    /// Harness config file (defaults to workflow-contract.toml in the workspace)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the declared lint crates
    List,

    /// Check that every declared lint crate is a workspace package
    Contract,

    /// Run the lint build job under act
    Smoke {
        /// Skip instead of failing when act or its container runtime is unusable
        #[arg(long)]
        opportunistic: bool,

        /// Directory to export artifacts under (defaults to a temporary directory)
        #[arg(long)]
        artifact_dir: Option<PathBuf>,
    },

    /// Run the contract check, then the smoke check
    Check {
        /// Skip instead of failing when act or its container runtime is unusable
        #[arg(long)]
        opportunistic: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> workflow_contract::Result<()> {
    let workspace_root = match cli.workspace {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    let config = match &cli.config {
        Some(path) => HarnessConfig::load_file(&workspace_root, path)?,
        None => HarnessConfig::load(&workspace_root)?,
    };

    for warning in config.validate().into_result()? {
        tracing::warn!(%warning, "harness configuration");
    }

    let runner = SystemRunner::new();

    match cli.command {
        Commands::List => {
            let crates = load_lint_crates(&config.workflow_path(), &config.workflow.lookup())?;
            for name in crates.iter() {
                println!("{}", name);
            }
        }
        Commands::Contract => {
            let report = run_contract_check(&config, &runner).await?;
            println!(
                "ok: {} lint crates resolve against {} workspace packages",
                report.declared.len(),
                report.workspace_packages
            );
        }
        Commands::Smoke {
            opportunistic,
            artifact_dir,
        } => {
            let crates = load_lint_crates(&config.workflow_path(), &config.workflow.lookup())?;
            smoke(&config, &runner, &crates, opportunistic, artifact_dir).await?;
        }
        Commands::Check { opportunistic } => {
            let report = run_contract_check(&config, &runner).await?;
            println!(
                "ok: {} lint crates resolve against {} workspace packages",
                report.declared.len(),
                report.workspace_packages
            );
            smoke(&config, &runner, &report.declared, opportunistic, None).await?;
        }
    }

    Ok(())
}

async fn smoke(
    config: &HarnessConfig,
    runner: &SystemRunner,
    crates: &workflow_contract::LintCrateList,
    opportunistic: bool,
    artifact_dir: Option<PathBuf>,
) -> workflow_contract::Result<()> {
    let opt_in = std::env::var(&config.emulator.opt_in_var).ok();
    let mode = SmokeMode::resolve(&config.emulator, opt_in.as_deref(), opportunistic);

    // Held until the run is judged so the artifacts can be inspected
    let temp;
    let artifact_root = match artifact_dir {
        Some(dir) => dir,
        None => {
            temp = tempfile::TempDir::new()?;
            temp.path().to_path_buf()
        }
    };

    match run_smoke_check(config, mode, crates, runner, &artifact_root).await? {
        SmokeOutcome::Skipped { reason } => println!("skipped: {}", reason),
        SmokeOutcome::Passed(report) => {
            println!("ok: act exported {} artefacts", report.artifacts.len());
            for artifact in &report.artifacts {
                println!("  {}", artifact.display());
            }
        }
    }

    Ok(())
}
