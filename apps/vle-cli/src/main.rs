use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;
use vle_sim::{ExperimentResult, ObservationTable, catalog, load_yaml};

#[derive(Parser)]
#[command(name = "vle-cli")]
#[command(about = "VLE CLI - Discrete-event simulation of ODE models", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate experiment file syntax and references
    Validate {
        /// Path to the experiment YAML file
        experiment_path: PathBuf,
    },
    /// Run an experiment and export its views
    Run {
        /// Path to the experiment YAML file
        experiment_path: PathBuf,
        /// Override the simulated duration
        #[arg(long)]
        duration: Option<f64>,
        /// Output directory, one file per view (optional, defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Export format
        #[arg(short, long, value_enum, default_value_t = Format::Csv)]
        format: Format,
    },
    /// List the built-in dynamics
    Catalog,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Csv,
    Json,
}

impl Format {
    fn extension(self) -> &'static str {
        match self {
            Format::Csv => "csv",
            Format::Json => "json",
        }
    }
}

fn main() -> ExperimentResult<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { experiment_path } => cmd_validate(&experiment_path),
        Commands::Run {
            experiment_path,
            duration,
            output,
            format,
        } => cmd_run(&experiment_path, duration, output.as_deref(), format),
        Commands::Catalog => {
            cmd_catalog();
            Ok(())
        }
    }
}

fn cmd_validate(experiment_path: &Path) -> ExperimentResult<()> {
    println!("Validating experiment: {}", experiment_path.display());
    let experiment = load_yaml(experiment_path)?;
    println!("✓ Experiment is valid");
    println!(
        "  {} models, {} couplings, {} views",
        experiment.models.len(),
        experiment.couplings.len(),
        experiment.views.len()
    );
    Ok(())
}

fn cmd_run(
    experiment_path: &Path,
    duration: Option<f64>,
    output: Option<&Path>,
    format: Format,
) -> ExperimentResult<()> {
    let mut experiment = load_yaml(experiment_path)?;
    if let Some(duration) = duration {
        experiment.duration = duration;
    }
    debug!(
        models = experiment.models.len(),
        views = experiment.views.len(),
        "experiment loaded"
    );
    eprintln!(
        "Running experiment: {} (begin = {}, duration = {})",
        experiment.name, experiment.begin, experiment.duration
    );

    let start = Instant::now();
    let tables = experiment.run()?;
    eprintln!(
        "✓ Simulation completed in {:.3}s",
        start.elapsed().as_secs_f64()
    );

    match output {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            for table in &tables {
                let path = dir.join(format!("{}.{}", table.view, format.extension()));
                std::fs::write(&path, render(table, format)?)?;
                eprintln!("  {} rows -> {}", table.len(), path.display());
            }
        }
        None => {
            for table in &tables {
                if tables.len() > 1 {
                    println!("# {}", table.view);
                }
                print!("{}", render(table, format)?);
            }
        }
    }
    Ok(())
}

fn render(table: &ObservationTable, format: Format) -> ExperimentResult<String> {
    Ok(match format {
        Format::Csv => table.to_csv(),
        Format::Json => table.to_json()? + "\n",
    })
}

fn cmd_catalog() {
    println!("Built-in dynamics:");
    for (name, description) in catalog::CATALOG {
        println!("  {:<18} {}", name, description);
    }
}
