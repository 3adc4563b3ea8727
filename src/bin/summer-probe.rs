use clap::{Parser, Subcommand};

use summer::diagnostics::{DEBUG_PATH_ALIVE, DEBUG_PATH_METRICS, DEBUG_PATH_READY};

#[derive(Parser)]
#[command(name = "summer-probe")]
#[command(about = "Query the diagnostics endpoints of a running summer server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Liveness probe
    Alive,
    /// Readiness probe (runs every health check)
    Ready,
    /// Dump Prometheus metrics
    Metrics,
}

impl Commands {
    fn path(&self) -> &'static str {
        match self {
            Commands::Alive => DEBUG_PATH_ALIVE,
            Commands::Ready => DEBUG_PATH_READY,
            Commands::Metrics => DEBUG_PATH_METRICS,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let url = format!("{}{}", cli.url.trim_end_matches('/'), cli.command.path());

    let res = reqwest::Client::new().get(&url).send().await?;
    let status = res.status();
    let body = res.text().await?;

    if status.is_success() {
        println!("{body}");
        Ok(())
    } else {
        eprintln!("Error: {url} returned status {status}");
        eprintln!("{body}");
        std::process::exit(1);
    }
}
