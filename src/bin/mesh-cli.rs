use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;

use mesh_coordinator::config::loader::load_config;
use mesh_coordinator::config::Algorithm;
use mesh_coordinator::coordinator::MeshCoordinator;
use mesh_coordinator::lifecycle::seed_record;

#[derive(Parser)]
#[command(name = "mesh-cli")]
#[command(about = "Offline tooling for mesh coordinator configs", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "mesh.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the config file
    Check,
    /// Print the resolved config, defaults filled in, as JSON
    Show,
    /// Register the seeds and preview how selections spread across them
    Simulate {
        /// Service name to select from
        service: String,
        /// Number of selections
        #[arg(short = 'n', long, default_value_t = 100)]
        count: usize,
        /// Client key for consistent hashing
        #[arg(long)]
        client: Option<String>,
        /// Override the configured algorithm
        #[arg(long, value_parser = parse_algorithm)]
        algorithm: Option<Algorithm>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut config = load_config(&cli.config)?;

    match cli.command {
        Commands::Check => {
            println!(
                "{}: ok ({} seeded services, algorithm {})",
                cli.config.display(),
                config.services.len(),
                config.load_balancer.algorithm.as_str()
            );
        }
        Commands::Show => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Simulate {
            service,
            count,
            client,
            algorithm,
        } => {
            if let Some(algorithm) = algorithm {
                config.load_balancer.algorithm = algorithm;
            }
            let mesh = MeshCoordinator::new(config.clone())?;
            for seed in &config.services {
                mesh.register_service(seed_record(seed)?)?;
            }

            let mut picks: BTreeMap<String, usize> = BTreeMap::new();
            for _ in 0..count {
                let chosen = mesh.select_service(&service, client.as_deref())?;
                mesh.report_performance(&chosen.service_id, std::time::Duration::ZERO, true)?;
                *picks.entry(chosen.service_id).or_default() += 1;
            }
            for (id, n) in picks {
                println!("{id:<24} {n:>6} ({:.1}%)", n as f64 * 100.0 / count.max(1) as f64);
            }
        }
    }
    Ok(())
}

fn parse_algorithm(value: &str) -> Result<Algorithm, String> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|_| format!("unknown algorithm '{value}'"))
}
