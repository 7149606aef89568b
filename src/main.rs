use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use foodbuddy_settlement::adapters::{MemoryStore, PostgresStore};
use foodbuddy_settlement::cli::{self, Cli, Commands, DbCommands, PaymentCommands};
use foodbuddy_settlement::config::{Config, LogFormat};
use foodbuddy_settlement::gateway::{HttpPaymentGateway, PaymentGateway, SandboxGateway};
use foodbuddy_settlement::ports::Store;
use foodbuddy_settlement::{create_app, db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    init_tracing(config.log_format);

    match cli.command.unwrap_or(Commands::Serve { in_memory: false }) {
        Commands::Serve { in_memory } => serve(config, in_memory).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Payment(PaymentCommands::Finalize { session_id, status }) => {
            cli::handle_payment_finalize(&config, &session_id, status).await
        }
        Commands::Config => cli::handle_config_validate(&config),
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve(config: Config, in_memory: bool) -> anyhow::Result<()> {
    let store: Arc<dyn Store> = if in_memory {
        tracing::warn!("running on the in-memory store; data is lost on exit");
        Arc::new(MemoryStore::new())
    } else {
        let pool = db::create_pool(&config).await?;
        db::run_migrations(&pool).await?;
        Arc::new(PostgresStore::new(pool))
    };

    let gateway: Arc<dyn PaymentGateway> =
        match (&config.payment_gateway_url, &config.payment_gateway_key) {
            (Some(url), Some(key)) => {
                tracing::info!(url = %url, "payment gateway client initialized");
                Arc::new(HttpPaymentGateway::new(url.clone(), key.clone()))
            }
            _ => {
                tracing::warn!("PAYMENT_GATEWAY_URL not set, using the sandbox gateway");
                Arc::new(SandboxGateway)
            }
        };

    let state = AppState::new(
        store,
        gateway,
        &config.settings(),
        config.payment_webhook_secret.clone(),
        config.admin_api_key.clone(),
    );
    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}
