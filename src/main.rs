use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use miriad_core::config::AgentConfig;
use miriad_core::ids::IdService;
use miriad_server::{OutputFormat, ServerContext};
use miriad_store::{Database, Stores};

#[derive(Parser)]
#[command(name = "miriad", about = "Long-lived coding agent with tiered persistent memory")]
struct Args {
    /// Run one prompt in batch mode and exit.
    #[arg(short = 'p', long = "prompt")]
    prompt: Option<String>,

    /// Run the NDJSON server on stdin/stdout.
    #[arg(long)]
    stdio: bool,

    /// Path to the SQLite database file. Defaults to ~/.miriad/agent.db.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Output format for batch mode.
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Enable debug logging.
    #[arg(long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    let db_path = args
        .db
        .unwrap_or_else(|| dirs_home().join(".miriad").join("agent.db"));
    let db = match Database::open(&db_path) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("failed to open database at {}: {e}", db_path.display());
            std::process::exit(1);
        }
    };

    let stores = Stores::new(db);
    let ids = Arc::new(IdService::new());
    let config = AgentConfig::from_env();
    let provider = miriad_llm::resolve_provider(&config.models);
    let registry = Arc::new(miriad_engine::tools::create_core_registry(&stores));

    tracing::info!(
        db = %db_path.display(),
        provider = provider.name(),
        model = provider.model(),
        "miriad starting"
    );

    let ctx = ServerContext {
        stores,
        ids,
        config,
        provider,
        registry,
    };

    let exit = if args.stdio {
        match miriad_server::run_stdio(ctx).await {
            Ok(()) => 0,
            Err(e) => {
                tracing::error!(error = %e, "server failed");
                1
            }
        }
    } else if let Some(prompt) = &args.prompt {
        let format = match args.format {
            Format::Text => OutputFormat::Text,
            Format::Json => OutputFormat::Json,
        };
        miriad_server::run_batch(ctx, prompt, format).await
    } else {
        eprintln!("nothing to do: pass -p \"<prompt>\" or --stdio");
        1
    };

    std::process::exit(exit);
}

/// stdout carries the NDJSON protocol, so logs go to stderr.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}
