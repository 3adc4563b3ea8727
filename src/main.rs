//! Demo server.
//!
//! Serves `/get` and `/post`, which echo the flattened request as JSON,
//! plus the `/debug/*` diagnostics surface.

use std::path::PathBuf;

use axum::http::StatusCode;
use clap::Parser;
use tokio::net::TcpListener;

use summer::config::{load_config, AppConfig};
use summer::lifecycle::signals::shutdown_on_signal;
use summer::observability::logging::init_logging;
use summer::{App, BasicContext, HttpServer, Options, Shutdown};

#[derive(Parser)]
#[command(name = "summer")]
#[command(about = "Request-handling core with admission control and health probes", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

async fn echo(ctx: BasicContext) {
    match ctx.flatten().await {
        Ok(map) => {
            if let Err(e) = ctx.json(&map) {
                ctx.code(StatusCode::INTERNAL_SERVER_ERROR);
                ctx.text(e.to_string());
            }
        }
        Err(e) => {
            ctx.code(StatusCode::BAD_REQUEST);
            ctx.text(e.to_string());
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    init_logging(&config.observability)?;
    tracing::info!("summer v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        concurrency = config.concurrency,
        readiness_cascade = config.readiness_cascade,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    let mut app = App::new(
        BasicContext::factory(config.limits.max_body_size),
        Options::from(&config),
    );
    app.check_func("self", |_| async { Ok::<_, std::convert::Infallible>(()) });
    app.handle_func("/get", echo);
    app.handle_func("/post", echo);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(shutdown_on_signal(shutdown));

    HttpServer::new(config, app).run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
