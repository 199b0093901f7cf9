//! CLI for teledrbg — random records seeded from live system telemetry.

mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "teledrbg")]
#[command(about = "teledrbg — reseed-per-round random records from live system telemetry")]
#[command(version = teledrbg_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run independent generator lineages and append one 32-byte record per lineage
    Generate {
        /// JSON run configuration; flags below override its values
        #[arg(long)]
        config: Option<String>,

        /// Number of independent lineages (records) to produce
        #[arg(long)]
        lineages: Option<usize>,

        /// Generator rounds per lineage
        #[arg(long)]
        rounds: Option<usize>,

        /// Destination file (opened in append mode)
        #[arg(long)]
        output: Option<String>,

        /// Non-secret personalization tag folded into every seed
        #[arg(long)]
        tag: Option<String>,

        /// Worker threads (default: one per CPU)
        #[arg(long)]
        workers: Option<usize>,

        /// Skip the process-table fingerprint
        #[arg(long)]
        no_process_table: bool,

        /// Skip GPU temperature
        #[arg(long)]
        no_gpu: bool,

        /// CPU load sampling window in milliseconds
        #[arg(long)]
        cpu_sample_ms: Option<u64>,

        /// Abort a lineage if one telemetry query takes longer than this
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Print one telemetry snapshot as JSON
    Telemetry {
        /// Skip the process-table fingerprint
        #[arg(long)]
        no_process_table: bool,
    },

    /// Print one entropy digest and the seed string assembled from it
    Digest {
        /// Personalization tag to append to the seed
        #[arg(long)]
        tag: Option<String>,
    },

    /// Check record framing of an output file and grade its bytes
    Inspect {
        /// Path to a record file
        path: String,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Generate {
            config,
            lineages,
            rounds,
            output,
            tag,
            workers,
            no_process_table,
            no_gpu,
            cpu_sample_ms,
            timeout_ms,
        } => commands::generate::run(commands::generate::GenerateCommandConfig {
            config_path: config.as_deref(),
            lineages,
            rounds,
            output: output.as_deref(),
            tag: tag.as_deref(),
            workers,
            no_process_table,
            no_gpu,
            cpu_sample_ms,
            timeout_ms,
        }),
        Commands::Telemetry { no_process_table } => commands::telemetry::run(no_process_table),
        Commands::Digest { tag } => commands::digest::run(tag.as_deref()),
        Commands::Inspect { path } => commands::inspect::run(&path),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
