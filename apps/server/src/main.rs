use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use swapmeet_auth::AuthError;
use swapmeet_config::load as load_config;
use swapmeet_database::ConversationRepository;
use swapmeet_gateway::{create_router, GatewayState};
use swapmeet_runtime::{telemetry, BackendServices};
use tokio::net::TcpListener;
use tracing::info;

const SEED_PASSWORD: &str = "swapmeet-dev";

#[derive(Parser)]
#[command(name = "swapmeet-backend")]
#[command(about = "Swapmeet backend server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP/WebSocket server (default)
    Serve,
    /// Seed the database with demo traders and a shared conversation
    SeedData,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server().await,
        Commands::SeedData => seed_data().await,
    }
}

async fn run_server() -> anyhow::Result<()> {
    telemetry::init_tracing().context("failed to initialise tracing")?;

    info!("starting Swapmeet backend");

    let config = load_config().context("failed to load configuration")?;

    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let state = GatewayState::new(Arc::new(services.authenticator.clone()), services.hub.clone());
    let app = create_router(state);

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(swapmeet_runtime::shutdown_signal())
        .await
        .context("http server error")?;

    info!("backend shut down");
    Ok(())
}

async fn seed_data() -> anyhow::Result<()> {
    telemetry::init_tracing().context("failed to initialise tracing")?;

    info!("seeding database with demo data");

    let config = load_config().context("failed to load configuration")?;

    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let (alice_id, alice_token) = seed_user(&services, "alice@example.com", "Alice").await?;
    let (bob_id, bob_token) = seed_user(&services, "bob@example.com", "Bob").await?;

    let repository = ConversationRepository::new(services.db_pool.clone());
    let conversation = repository
        .create(Some("demo-listing"), &[alice_id, bob_id])
        .await
        .context("failed to create demo conversation")?;

    println!("Seeded demo data:");
    println!("- alice token: {alice_token}");
    println!("- bob token:   {bob_token}");
    println!("- conversation: {}", conversation.public_id);
    println!();
    println!("Connect with e.g. ws://127.0.0.1:7070/ws?token=<token>");

    Ok(())
}

/// Register a demo user, or log them in when seeding runs a second time.
async fn seed_user(
    services: &BackendServices,
    email: &str,
    name: &str,
) -> anyhow::Result<(i64, String)> {
    match services
        .authenticator
        .register_with_password(email, SEED_PASSWORD, Some(name))
        .await
    {
        Ok(_) | Err(AuthError::UserExists) => {}
        Err(err) => return Err(err).with_context(|| format!("failed to register {email}")),
    }

    let session = services
        .authenticator
        .login_with_password(email, SEED_PASSWORD)
        .await
        .with_context(|| format!("failed to log in {email}"))?;

    Ok((session.user_id, session.token))
}
