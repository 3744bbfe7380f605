use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use swerve_zenoh_runtime::config::DrivetrainConfig;
use swerve_zenoh_runtime::swerve::Alliance;

/// Swerve drivetrain runtime over Zenoh
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Drivetrain config (JSON); built-in robot defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Starting alliance (blue or red), overrides the config file
    #[arg(short, long, value_parser = parse_alliance)]
    alliance: Option<Alliance>,
}

fn parse_alliance(s: &str) -> Result<Alliance, String> {
    match s.to_ascii_lowercase().as_str() {
        "blue" => Ok(Alliance::Blue),
        "red" => Ok(Alliance::Red),
        other => Err(format!("unknown alliance '{}', expected blue or red", other)),
    }
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match DrivetrainConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Config error: {}", e);
                std::process::exit(1);
            }
        },
        None => DrivetrainConfig::default(),
    };
    if let Some(alliance) = args.alliance {
        config.alliance = alliance;
    }

    if let Err(e) = swerve_zenoh_runtime::runtime::run(config).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
