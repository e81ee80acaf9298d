//! # docstore CLI
//!
//! ## Usage
//!
//! ```bash
//! docstore --config ./config/docstore.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docstore init` | Create the SQLite database and run schema migrations |
//! | `docstore serve` | Start the HTTP server |
//! | `docstore get <id>` | Print one document as JSON |
//! | `docstore search "<query>"` | Print ranked hits as JSON |

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use docstore::config::{self, Config};
use docstore::migrate;
use docstore::server;
use docstore::service::DocumentService;

const DEFAULT_CONFIG_PATH: &str = "./config/docstore.toml";

/// docstore: a bearer-token protected document store with vector or
/// lexical search.
#[derive(Parser)]
#[command(name = "docstore", version, about)]
struct Cli {
    /// Path to the TOML configuration file. The default path may be absent,
    /// in which case built-in defaults apply.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the SQLite database and schema (idempotent).
    Init,

    /// Start the HTTP server.
    Serve,

    /// Print a document from the configured store.
    Get { id: String },

    /// Search through the configured retrieval strategy.
    Search {
        query: String,

        /// Maximum number of results (capped at `retrieval.max_limit`).
        #[arg(long)]
        limit: Option<usize>,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("docstore=info,docstore_core=info,tower_http=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load(path: &Path) -> anyhow::Result<Config> {
    config::load_config(path, path == Path::new(DEFAULT_CONFIG_PATH))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let cfg = load(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized at {}", cfg.db.path.display());
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Get { id } => {
            let service = DocumentService::from_config(&cfg).await;
            let result = service.get(&id).await;
            service.shutdown().await;
            println!("{}", serde_json::to_string_pretty(&result?)?);
        }
        Commands::Search { query, limit } => {
            let service = DocumentService::from_config(&cfg).await;
            let result = service.search(&query, limit).await;
            service.shutdown().await;
            println!("{}", serde_json::to_string_pretty(&result?)?);
        }
    }

    Ok(())
}
