use clap::{Parser, Subcommand};
use loanlink::application::lifecycle::LifecycleManager;
use loanlink::application::payments::PaymentCoordinator;
use loanlink::config::{IssueTokenArgs, ServeArgs};
use loanlink::domain::ports::{ApplicationStoreRef, ClockRef, PaymentGatewayRef};
use loanlink::infrastructure::clock::SystemClock;
use loanlink::infrastructure::in_memory::InMemoryApplicationStore;
use loanlink::infrastructure::retry::RetryingStore;
use loanlink::infrastructure::stripe::StripeCheckoutGateway;
use loanlink::interfaces::http::{AppState, cors_layer, router};
use loanlink::telemetry;
use miette::{IntoDiagnostic, Result};
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve(ServeArgs),
    /// Mint a development session token and print it
    IssueToken(IssueTokenArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    telemetry::init_tracing(&cli.log_level, cli.log_json);

    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::IssueToken(args) => {
            let token = args
                .auth
                .authenticator()
                .issue(&args.identity())
                .into_diagnostic()?;
            println!("{token}");
            Ok(())
        }
    }
}

fn open_store(args: &ServeArgs) -> Result<ApplicationStoreRef> {
    #[cfg(feature = "storage-rocksdb")]
    if let Some(db_path) = &args.db_path {
        // Use persistent storage (RocksDB)
        let store =
            loanlink::infrastructure::rocksdb::RocksDbApplicationStore::open(db_path)
                .into_diagnostic()?;
        tracing::info!(path = %db_path.display(), "using RocksDB application store");
        return Ok(Arc::new(RetryingStore::new(store)));
    }

    #[cfg(not(feature = "storage-rocksdb"))]
    if args.db_path.is_some() {
        tracing::warn!(
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }

    Ok(Arc::new(RetryingStore::new(InMemoryApplicationStore::new())))
}

async fn serve(args: ServeArgs) -> Result<()> {
    let store = open_store(&args)?;
    let clock: ClockRef = Arc::new(SystemClock);
    let gateway: PaymentGatewayRef =
        Arc::new(StripeCheckoutGateway::new(args.stripe_settings()).into_diagnostic()?);

    let state = AppState {
        authenticator: Arc::new(args.auth.authenticator()),
        lifecycle: Arc::new(LifecycleManager::new(store.clone(), clock.clone())),
        payments: Arc::new(PaymentCoordinator::new(
            store,
            gateway,
            clock,
            args.payment_settings().into_diagnostic()?,
        )),
    };

    let cors = cors_layer(&args.client_origin).into_diagnostic()?;

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .into_diagnostic()?;
    tracing::info!(addr = %args.bind, "server listening");

    axum::serve(listener, router(state, cors))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .into_diagnostic()?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
