// Copyright Catenary Transit Initiatives
// Command line entry point: one-shot analyses or the HTTP server

use anyhow::Context;
use clap::Parser;
use log::info;
use migratewatch::config::AnalysisConfig;
use migratewatch::ingest::load_data_dir;
use migratewatch::{AnalysisSession, ConflictSummary, ConflictZone};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

mod server;

const DEFAULT_PORT: u16 = 8080;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// RON file with analysis parameters
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory holding fish_migrations.csv and shipping_lanes.json
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    #[arg(long, global = true)]
    eps_km: Option<f64>,
    #[arg(long, global = true)]
    min_samples: Option<usize>,
    #[arg(long, global = true)]
    distance_threshold_km: Option<f64>,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Cluster, detect conflicts and print them with a summary
    Analyze,
    /// Cluster, detect conflicts and print them grouped by month
    Monthly,
    /// Suggest an adjusted route for one lane
    Suggest {
        #[arg(long)]
        lane_id: usize,
        #[arg(long)]
        buffer_km: Option<f64>,
    },
    /// Serve the analysis over HTTP
    Serve {
        #[arg(short, long, default_value = "127.0.0.1")]
        address: String,
        /// Falls back to $PORT, then 8080
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[derive(Serialize)]
struct AnalysisOutput<'a> {
    conflicts: &'a [ConflictZone],
    summary: ConflictSummary,
}

impl Args {
    /// Defaults, then the RON file, then `DATA_DIR`, then flags.
    fn resolve_config(&self) -> anyhow::Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_ron_file(path)?,
            None => AnalysisConfig::default(),
        };

        if let Ok(dir) = std::env::var("DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(eps_km) = self.eps_km {
            config.eps_km = eps_km;
        }
        if let Some(min_samples) = self.min_samples {
            config.min_samples = min_samples;
        }
        if let Some(threshold) = self.distance_threshold_km {
            config.distance_threshold_km = threshold;
        }

        config.validate()?;
        Ok(config)
    }
}

fn run_pipeline(session: &AnalysisSession, config: &AnalysisConfig) -> anyhow::Result<()> {
    let report = session.identify_clusters(config.eps_km, config.min_samples)?;
    info!(
        "Identified {} clusters, {} noise points",
        report.n_clusters, report.noise_points
    );

    let conflicts = session.detect_conflicts(config.distance_threshold_km)?;
    info!("Detected {} conflict zones", conflicts.len());
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let mut config = args.resolve_config()?;

    let contents = load_data_dir(&config.data_dir)
        .with_context(|| format!("loading data from {}", config.data_dir.display()))?;
    let session = AnalysisSession::from_contents(contents);

    match args.cmd {
        Command::Analyze => {
            run_pipeline(&session, &config)?;
            let conflicts = session.conflicts()?;
            print_json(&AnalysisOutput {
                conflicts: &conflicts,
                summary: session.conflict_summary()?,
            })
        }
        Command::Monthly => {
            run_pipeline(&session, &config)?;
            print_json(&session.monthly_stats()?)
        }
        Command::Suggest { lane_id, buffer_km } => {
            if let Some(buffer_km) = buffer_km {
                config.buffer_km = buffer_km;
            }
            run_pipeline(&session, &config)?;
            print_json(&session.suggest_route(lane_id, config.buffer_km)?)
        }
        Command::Serve { address, port } => {
            let port = match port {
                Some(port) => port,
                None => match std::env::var("PORT") {
                    Ok(raw) => raw
                        .parse()
                        .with_context(|| format!("PORT is not a valid port: {}", raw))?,
                    Err(_) => DEFAULT_PORT,
                },
            };

            // clustering and detection run on demand through the API
            server::run(Arc::new(session), Arc::new(config), address, port).await?;
            Ok(())
        }
    }
}
