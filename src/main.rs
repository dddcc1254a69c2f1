use std::sync::Arc;

/// Reset SIGPIPE to default behavior so piping (e.g. `cloudkeep activity | head`)
/// exits cleanly instead of panicking on broken pipe.
#[cfg(unix)]
fn reset_sigpipe() {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }
}

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cloudkeep::auth::{principal_from_token, Principal};
use cloudkeep::automation::{enforcer, queue};
use cloudkeep::config::types::{CloudkeepConfig, StoreBackendKind};
use cloudkeep::config::{load_config, parser::DEFAULT_CONFIG_FILE};
use cloudkeep::insights::recommend::{self, Mode};
use cloudkeep::output::formatter;
use cloudkeep::server::{self, AppState};
use cloudkeep::store::memory::MemoryStore;
use cloudkeep::store::models::ActivityLogEntry;
use cloudkeep::store::rest::RestStore;
use cloudkeep::store::schema::table;
use cloudkeep::store::sqlite::SqliteStore;
use cloudkeep::store::{select_as, Filter, Query, RowStore};

/// cloudkeep - automation and cost backend for multi-cloud dashboards
#[derive(Parser)]
#[command(name = "cloudkeep", version, about, long_about = None)]
struct Cli {
    /// Path to the YAML config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Address to bind (overrides config)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Enforce enabled automation rules once
    Enforce {
        /// Bearer token of the principal
        #[arg(long, env = "CLOUDKEEP_TOKEN")]
        token: String,
    },

    /// Drain queued operations and recommendation actions once
    Drain {
        /// Bearer token of the principal
        #[arg(long, env = "CLOUDKEEP_TOKEN")]
        token: String,

        /// Rows to process per queue
        #[arg(long)]
        max: Option<i64>,
    },

    /// Generate cost recommendations once
    Recommend {
        /// Bearer token of the principal
        #[arg(long, env = "CLOUDKEEP_TOKEN")]
        token: String,

        /// Analysis modes: idle, rightsizing, anomaly (default: all)
        #[arg(long = "mode")]
        modes: Vec<String>,
    },

    /// Show recent activity for a user
    Activity {
        /// User id
        #[arg(long)]
        user: String,

        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    #[cfg(unix)]
    reset_sigpipe();

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = load_config(&cli.config)?;
    let store = open_store(&config)?;

    match cli.command {
        Commands::Serve { ref bind } => cmd_serve(&config, store, bind.as_deref()).await,
        Commands::Enforce { ref token } => cmd_enforce(store.as_ref(), token).await,
        Commands::Drain { ref token, max } => {
            cmd_drain(store.as_ref(), token, max, config.queue.default_max).await
        }
        Commands::Recommend {
            ref token,
            ref modes,
        } => cmd_recommend(store.as_ref(), token, modes).await,
        Commands::Activity { ref user, limit } => cmd_activity(store.as_ref(), user, limit).await,
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn open_store(config: &CloudkeepConfig) -> Result<Arc<dyn RowStore>> {
    let settings = &config.store;
    let store: Arc<dyn RowStore> = match settings.backend {
        StoreBackendKind::Rest => Arc::new(RestStore::new(
            settings.url.as_deref().unwrap_or_default(),
            settings.service_key.as_deref().unwrap_or_default(),
        )),
        StoreBackendKind::Sqlite => Arc::new(
            SqliteStore::open(&settings.path)
                .with_context(|| format!("Failed to open store at {}", settings.path))?,
        ),
        StoreBackendKind::Memory => {
            tracing::warn!("Using the in-memory store; nothing will be persisted");
            Arc::new(MemoryStore::new())
        }
    };
    Ok(store)
}

fn principal(token: &str) -> Result<Principal> {
    let token = token.strip_prefix("Bearer ").unwrap_or(token);
    principal_from_token(token).context("Invalid token")
}

// ─── Commands ────────────────────────────────────────────────────────────────

async fn cmd_serve(
    config: &CloudkeepConfig,
    store: Arc<dyn RowStore>,
    bind: Option<&str>,
) -> Result<()> {
    let state = Arc::new(AppState {
        store,
        queue_default_max: config.queue.default_max,
    });
    server::serve(bind.unwrap_or(&config.server.bind), state).await
}

async fn cmd_enforce(store: &dyn RowStore, token: &str) -> Result<()> {
    let principal = principal(token)?;
    let summary = enforcer::enforce(store, &principal)
        .await
        .context("Rule enforcement failed")?;
    formatter::print_enforce_summary(&summary);
    Ok(())
}

async fn cmd_drain(
    store: &dyn RowStore,
    token: &str,
    max: Option<i64>,
    default_max: usize,
) -> Result<()> {
    let principal = principal(token)?;
    let max = queue::batch_size(max, default_max);
    match queue::drain(store, &principal, max).await {
        Ok(summary) => {
            formatter::print_drain_summary(&summary);
            Ok(())
        }
        Err(e) => {
            formatter::print_error(&format!("Queue run aborted: {}", e));
            Err(e.into())
        }
    }
}

async fn cmd_recommend(store: &dyn RowStore, token: &str, modes: &[String]) -> Result<()> {
    let principal = principal(token)?;
    let requested = (!modes.is_empty()).then_some(modes);
    let modes = Mode::resolve(requested);
    let today = chrono::Utc::now().date_naive();
    let summary = recommend::generate(store, &principal, &modes, today)
        .await
        .context("Recommendation run failed")?;
    formatter::print_generate_summary(&summary);
    Ok(())
}

async fn cmd_activity(store: &dyn RowStore, user: &str, limit: usize) -> Result<()> {
    let entries: Vec<ActivityLogEntry> = select_as(
        store,
        table::ACTIVITY_LOG,
        &Query::new(Filter::new().eq("actor", user))
            .order_by("created_at", false)
            .limit(limit),
    )
    .await
    .context("Failed to load activity log")?;
    formatter::print_activity(&entries);
    Ok(())
}
