use autorest::{app, connect, load_from_file, parse_dsn, AppState, CrudEngine, StartupConfig};
use clap::Parser;
use tokio::net::TcpListener;

mod cli;
use cli::{Args, Command};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("autorest=info")),
        )
        .init();

    let args = Args::parse();
    let (mut config, from_dsn) = match &args.command {
        Command::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Command::Server { file } => (load_from_file(file).await?, false),
        Command::Boot { dsn } => (parse_dsn(dsn)?, true),
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    serve(config, from_dsn).await
}

async fn serve(config: StartupConfig, from_dsn: bool) -> Result<(), Box<dyn std::error::Error>> {
    tracing::debug!(descriptor = ?config.descriptor, "startup config");
    let driver = connect(&config.descriptor).await?;
    let mut engine = CrudEngine::new(driver);
    // A DSN without a table segment leaves the engine unrestricted.
    if !(from_dsn && config.tables.is_empty()) {
        engine.set_access(&config.tables).await?;
    }
    let state = AppState::new(engine);

    let listener = TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.engine.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
