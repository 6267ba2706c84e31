use clap::Parser;
use server::config::load_or_default;
use server::lobby::{AppState, cleanup_dead_rooms};
use server::routes::router;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Tic-tac-toe session server
#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "Pairs two players per room and referees their tic-tac-toe game", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the JSON config file
    #[arg(short, long, default_value = "ServerConfig.json")]
    config: PathBuf,

    /// Address to listen on, overrides the config file (host:port)
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
/// Activates error tracing, loads the config, spawns a watch dog task to eliminate eventual
/// dead rooms, then serves the routes.
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=trace", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true),
        )
        .init();

    let cli = Cli::parse();
    let mut config = load_or_default(&cli.config).await.inspect_err(|error| {
        tracing::error!(%error, "Initial load error.");
    })?;
    if let Some(bind) = cli.bind {
        config.bind_address = bind;
    }
    let bind_address = config.bind_address.clone();
    let watchdog_interval = config.watchdog_interval();

    let app_state = Arc::new(AppState::new(config, cli.config));
    let watchdog_state = app_state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(watchdog_interval);
        loop {
            interval.tick().await;
            cleanup_dead_rooms(&watchdog_state).await;
        }
    });

    let app = router(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!(%bind_address, "Server listening.");

    axum::serve(listener, app).await?;
    Ok(())
}
