use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cluebook::auth::PasswordManager;
use cluebook::config::ServerConfig;
use cluebook::error::Error;
use cluebook::server::validation::validate_credentials;
use cluebook::server::{AppState, create_router};
use cluebook::store::{SqliteStore, Store};
use cluebook::types::NewUser;

#[cfg(unix)]
fn set_restrictive_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Failed to set permissions on {}: {e}", path.display());
    }
}

#[derive(Parser)]
#[command(name = "cluebook")]
#[command(about = "A mystery and clue notebook server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// TOML configuration file
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Host to bind to (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides the config file)
        #[arg(long, short)]
        port: Option<u16>,

        /// Data directory for the database (overrides the config file)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Initialize the server (create the database)
    Init {
        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
    },

    /// Create a user account
    CreateUser {
        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,

        #[arg(long)]
        username: String,

        #[arg(long)]
        password: String,

        /// Grant admin rights (clue management)
        #[arg(long)]
        admin: bool,
    },
}

fn db_path(data_dir: &Path) -> PathBuf {
    ServerConfig {
        data_dir: data_dir.to_path_buf(),
        ..ServerConfig::default()
    }
    .db_path()
}

fn run_init(data_dir: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(data_dir)?;

    let db_path = db_path(data_dir);
    let existed = db_path.exists();
    let store = SqliteStore::new(&db_path)?;
    store.initialize()?;

    #[cfg(unix)]
    set_restrictive_permissions(&db_path);

    if existed {
        println!("Database already initialized at {}", db_path.display());
    } else {
        println!("Initialized database at {}", db_path.display());
        println!("Create an account with 'cluebook admin create-user'.");
    }

    Ok(())
}

fn run_create_user(
    data_dir: &Path,
    username: &str,
    password: &str,
    is_admin: bool,
) -> anyhow::Result<()> {
    let db_path = db_path(data_dir);
    if !db_path.exists() {
        bail!("Server not initialized. Run 'cluebook admin init' first to create the database.");
    }

    if let Err(message) = validate_credentials(username, password) {
        bail!(message);
    }

    let store = SqliteStore::new(&db_path)?;
    let password_hash = PasswordManager::new().hash(password)?;
    let user = match store.create_user(&NewUser {
        username: username.to_string(),
        password_hash,
        is_admin,
    }) {
        Ok(user) => user,
        Err(Error::AlreadyExists) => bail!("User '{username}' already exists"),
        Err(e) => return Err(e.into()),
    };

    let role = if user.is_admin { "admin" } else { "user" };
    println!("Created {role} '{}' (id {})", user.username, user.id);
    Ok(())
}

async fn run_serve(config: ServerConfig) -> anyhow::Result<()> {
    let db_path = config.db_path();
    if !db_path.exists() {
        bail!("Server not initialized. Run 'cluebook admin init' first to create the database.");
    }

    let store = SqliteStore::new(&db_path)?;
    store.initialize()?;

    let purged = store.purge_expired_sessions()?;
    if purged > 0 {
        info!("Purged {purged} expired session(s)");
    }

    if config.is_development() {
        tracing::warn!("Running in development mode; error details are shown to clients");
    }
    if config.admin_signup_code.is_none() {
        info!("No admin signup code configured; admins must be created with 'cluebook admin create-user --admin'");
    }

    let addr = config.socket_addr()?;
    let state = Arc::new(AppState::new(Arc::new(store), config));
    let app = create_router(state);

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("cluebook=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init { data_dir } => run_init(&data_dir)?,
            AdminCommands::CreateUser {
                data_dir,
                username,
                password,
                admin,
            } => run_create_user(&data_dir, &username, &password, admin)?,
        },
        Commands::Serve {
            config,
            host,
            port,
            data_dir,
        } => {
            let mut config = match config {
                Some(path) => ServerConfig::load(&path)
                    .with_context(|| format!("failed to load config from {}", path.display()))?,
                None => ServerConfig::default(),
            };
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(data_dir) = data_dir {
                config.data_dir = data_dir;
            }

            run_serve(config).await?;
        }
    }

    Ok(())
}
