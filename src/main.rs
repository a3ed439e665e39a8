/// Load the scouting exports, run the consolidation pipeline, and write one table per input
use clap::{Parser, Subcommand};
use scout_pipeline::config::PipelineConfig;
use scout_pipeline::io::{combine_registries, load_registry, load_stats, write_registry, write_table};
use scout_pipeline::plot::plot_explained_variance;
use scout_pipeline::{AuxTable, Pipeline, Result};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "scout_pipeline")]
#[command(about = "Consolidate per-player scouting stats into model-ready feature tables", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "pipeline.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process stat exports (one per playing position)
    Run {
        /// Per-90 stat export(s)
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
        /// Directory for `<stem>_processed.csv` outputs
        #[arg(short, long, default_value = "preprocessed_data")]
        out_dir: PathBuf,
        /// Age registry to join
        #[arg(long)]
        age: Option<PathBuf>,
        /// Valuation registry to join
        #[arg(long)]
        valuations: Option<PathBuf>,
        /// Valuation season to keep (overrides the config selector)
        #[arg(long)]
        season: Option<String>,
        /// Keep original feature names instead of projecting onto components
        #[arg(long)]
        no_reduce: bool,
        /// Also write the cumulative explained-variance chart
        #[arg(long)]
        plot: bool,
    },
    /// Merge per-league age/valuation exports into one registry
    Combine {
        /// Directory of league CSV exports
        #[arg(long)]
        dir: PathBuf,
        /// Output registry file
        #[arg(long, default_value = "combined_data/age-valuation.csv")]
        out: PathBuf,
    },
    /// Write the default config file
    Init,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let config = if Path::new(&cli.config).exists() {
        match PipelineConfig::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        PipelineConfig::default()
    };

    let result = match cli.command {
        Commands::Run {
            input,
            out_dir,
            age,
            valuations,
            season,
            no_reduce,
            plot,
        } => {
            let mut config = config;
            if no_reduce {
                config.reduction.enabled = false;
            }
            if let (Some(season), Some(selector)) = (season, config.auxiliary.valuation.selector.as_mut()) {
                selector.value = season;
            }
            commands::run(&config, &input, &out_dir, age.as_deref(), valuations.as_deref(), plot)
        }
        Commands::Combine { dir, out } => commands::combine(&dir, &out),
        Commands::Init => commands::init(&cli.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;

    pub fn init(config_path: &str) -> Result<()> {
        PipelineConfig::default().save(config_path)?;
        println!("Created default config at {}", config_path);
        Ok(())
    }

    pub fn combine(dir: &Path, out: &Path) -> Result<()> {
        let combined = combine_registries(dir)?;
        if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        write_registry(out, &combined, "Player")?;
        println!("Created {} with {} rows", out.display(), combined.len());
        Ok(())
    }

    pub fn run(
        config: &PipelineConfig,
        inputs: &[PathBuf],
        out_dir: &Path,
        age: Option<&Path>,
        valuations: Option<&Path>,
        plot: bool,
    ) -> Result<()> {
        // registries are loaded once and shared by every input
        let mut auxiliaries: Vec<AuxTable> = Vec::new();
        if let Some(path) = age {
            auxiliaries.push(load_registry(path, &config.auxiliary.age)?);
        }
        if let Some(path) = valuations {
            auxiliaries.push(load_registry(path, &config.auxiliary.valuation)?);
        }

        std::fs::create_dir_all(out_dir)?;
        let pipeline = Pipeline::new(config);
        for input in inputs {
            let stem = input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "players".to_string());
            println!("Processing {}...", input.display());

            let raw = load_stats(input, &config.columns)?;
            let output = pipeline.run(raw, &auxiliaries)?;

            let out_path = out_dir.join(format!("{}_processed.csv", stem));
            write_table(&out_path, &output.table, &config.columns.identity)?;
            println!("{}", output.summary);
            println!("Wrote {}", out_path.display());

            if let (true, Some(reduction)) = (plot, &output.reduction) {
                let chart = out_dir.join(format!("{}_explained_variance.png", stem));
                plot_explained_variance(
                    &chart,
                    &reduction.components.cumulative_ratio(),
                    config.reduction.target_variance,
                )?;
                println!("Wrote {}", chart.display());
            }
        }
        Ok(())
    }
}
