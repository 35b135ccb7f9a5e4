//! # Brainiacs Server
//!
//! Main binary that runs the Brainiacs services in one process:
//! - REST API (HTTP)
//! - WebSocket Gateway (real-time events)
//!
//! Both share one store handle and one fan-out channel, so a REST mutation
//! reaches every socket that listens on the board.

use brainiacs_api::{AppState, build_router};
use brainiacs_common::fanout::Fanout;
use brainiacs_common::models::UserProfile;
use brainiacs_db::{Database, repository::users};
use brainiacs_gateway::GatewayState;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;

const DEFAULT_LOG_FILTER: &str =
    "brainiacs_server=debug,brainiacs_api=debug,brainiacs_gateway=debug,brainiacs_db=debug,brainiacs_common=debug,tower_http=debug";

#[derive(Parser)]
#[command(name = "brainiacs", version, about = "Brainiacs collaboration backend")]
struct Cli {
    /// Emit logs as JSON lines instead of human-readable text.
    #[arg(long, global = true, env = "BRAINIACS_JSON_LOGS")]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the API and gateway listeners (default).
    Serve,
    /// Apply pending migrations and exit.
    Migrate,
    /// Seed a user profile. Profiles are normally owned by an external
    /// service; this exists for local development.
    AddUser {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        avatar: Option<String>,
    },
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = brainiacs_common::config::init()?;
    init_tracing(cli.json_logs);

    let db = Database::connect(config).await?;
    db.migrate().await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, db).await,
        Command::Migrate => {
            tracing::info!("Migrations applied");
            Ok(())
        }
        Command::AddUser {
            name,
            email,
            avatar,
        } => {
            let profile = UserProfile {
                id: uuid::Uuid::now_v7(),
                name,
                email,
                avatar,
            };
            users::create_user(&db.pool, &profile).await?;
            tracing::info!(user_id = %profile.id, email = %profile.email, "User created");
            println!("{}", profile.id);
            Ok(())
        }
    }
}

async fn serve(config: &brainiacs_common::config::AppConfig, db: Database) -> anyhow::Result<()> {
    tracing::info!("Starting Brainiacs v{}", env!("CARGO_PKG_VERSION"));

    // === Shared fan-out ===
    // The bridge between REST mutations and the gateway: the API publishes,
    // every gateway connection filters through the presence registry.
    let fanout = Fanout::new(config.gateway.broadcast_capacity);

    // === REST API Server ===
    let api_state = Arc::new(AppState {
        db,
        fanout,
        limits: config.limits.clone(),
    });
    let api_router = build_router((*api_state).clone());
    let api_addr = SocketAddr::new(config.server.host.parse()?, config.server.port);

    // === WebSocket Gateway ===
    let gateway_state = GatewayState::new(api_state, config.gateway.heartbeat_interval_ms);
    let gateway_router = brainiacs_gateway::build_router(gateway_state);
    let gateway_addr = SocketAddr::new(config.server.host.parse()?, config.server.gateway_port);

    tracing::info!("REST API listening on http://{api_addr}");
    tracing::info!("Gateway listening on ws://{gateway_addr}");

    // Run both servers concurrently
    tokio::try_join!(
        // REST API
        async {
            let listener = tokio::net::TcpListener::bind(api_addr).await?;
            axum::serve(listener, api_router).await?;
            Ok::<_, anyhow::Error>(())
        },
        // WebSocket Gateway
        async {
            let listener = tokio::net::TcpListener::bind(gateway_addr).await?;
            axum::serve(listener, gateway_router).await?;
            Ok::<_, anyhow::Error>(())
        },
    )?;

    Ok(())
}
