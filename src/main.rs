use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use leadline::config::ServerConfig;
use leadline::dispatch::{Collaborators, Dispatcher};
use leadline::lifecycle::LeadEngine;
use leadline::server::{AppState, create_router};
use leadline::store::{SqliteStore, Store};
use leadline::types::{Organization, User};

/// How long shutdown waits for queued side effects.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "leadline")]
#[command(about = "A multi-tenant CRM lead server", long_about = None)]
struct Cli {
    /// TOML configuration file; command-line flags take precedence
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database, optionally seeding an organization and its first user
    Init {
        #[command(flatten)]
        paths: PathArgs,

        /// Name of an organization to create
        #[arg(long)]
        organization: Option<String>,

        /// Name of the first user in the seeded organization [default: admin]
        #[arg(long, requires = "organization")]
        user: Option<String>,

        /// Email of the first user
        #[arg(long, requires = "organization")]
        email: Option<String>,
    },

    /// Start the server
    Serve {
        #[command(flatten)]
        paths: PathArgs,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long, short)]
        port: Option<u16>,
    },
}

#[derive(Args)]
struct PathArgs {
    /// Data directory for the database
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

fn load_config(path: Option<&PathBuf>, paths: PathArgs) -> anyhow::Result<ServerConfig> {
    let mut config = match path {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };
    if let Some(data_dir) = paths.data_dir {
        config.data_dir = data_dir;
    }
    Ok(config)
}

fn run_init(
    config: &ServerConfig,
    organization: Option<String>,
    user_name: Option<String>,
    email: Option<String>,
) -> anyhow::Result<()> {
    fs::create_dir_all(&config.data_dir)?;

    let db_path = config.db_path();
    let store = SqliteStore::new(&db_path)?;
    store.initialize()?;

    println!("Database ready at {}", db_path.display());

    let Some(name) = organization else {
        return Ok(());
    };

    let now = Utc::now();
    let org = Organization {
        id: Uuid::new_v4().to_string(),
        name: name.trim().to_string(),
        created_at: now,
    };
    if org.name.is_empty() {
        bail!("Organization name cannot be empty");
    }

    let user = User {
        id: Uuid::new_v4().to_string(),
        organization_id: org.id.clone(),
        name: user_name.unwrap_or_else(|| "admin".to_string()),
        email: email.map(|e| e.trim().to_lowercase()),
        created_at: now,
    };

    store.create_organization(&org)?;
    store.create_user(&user)?;

    println!();
    println!("========================================");
    println!("Created organization '{}'", org.name);
    println!();
    println!("  X-Organization-Id: {}", org.id);
    println!("  X-User-Id:         {}", user.id);
    println!();
    println!("========================================");
    println!();

    Ok(())
}

async fn run_serve(config: ServerConfig) -> anyhow::Result<()> {
    let db_path = config.db_path();
    if !db_path.exists() {
        bail!(
            "Database not found at {}. Run 'leadline init' first.",
            db_path.display()
        );
    }

    let store = Arc::new(SqliteStore::new(&db_path)?);
    store.initialize()?;

    let (dispatcher, worker) =
        Dispatcher::spawn(store.clone(), Collaborators::default(), &config.dispatch);
    let engine = Arc::new(LeadEngine::new(
        store.clone(),
        dispatcher,
        config.lifecycle.clone(),
    ));

    let state = Arc::new(AppState::new(store, engine));
    let app = create_router(state);
    let addr = config.socket_addr()?;

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router owned the last engine handle, so the worker now sees a closed queue.
    info!("Draining side-effect queue");
    match tokio::time::timeout(DRAIN_TIMEOUT, worker).await {
        Ok(Ok(())) => info!("Server shutdown complete"),
        Ok(Err(e)) => error!("Side-effect worker failed: {e}"),
        Err(_) => warn!("Side effects still pending after {:?}, exiting", DRAIN_TIMEOUT),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("leadline=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            paths,
            organization,
            user,
            email,
        } => {
            let config = load_config(cli.config.as_ref(), paths)?;
            run_init(&config, organization, user, email)?;
        }
        Commands::Serve { paths, host, port } => {
            let mut config = load_config(cli.config.as_ref(), paths)?;
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            run_serve(config).await?;
        }
    }

    Ok(())
}
