mod actions;
mod error;
mod graph;
mod server;
mod service;
mod shell;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use dotenv::dotenv;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use actions::{
    ActionQueryDate, ActionQueryKnowledgeBase, ActionQueryTime, ActionQueryWeekday,
    ActionRegistry, ActionWeatherFormSubmit, Clock, SystemClock,
};
use graph::{GraphStore, KnowledgeBase, KnowledgeBaseSchema, Neo4jConfig, Neo4jStore};
use service::weather::{DEFAULT_FORECAST_URL, DEFAULT_GEOCODING_URL};
use service::{CalendarNormalizer, OpenMeteoClient, OpenMeteoConfig};

/// Custom action server for the assistant: time, date, weather and music knowledge base
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Address the action server binds to
    #[arg(long, env = "ACTION_SERVER_HOST", default_value = "0.0.0.0", global = true)]
    host: String,

    /// Port the action server binds to
    #[arg(short, long, env = "ACTION_SERVER_PORT", default_value_t = 5055, global = true)]
    port: u16,

    /// Neo4j Bolt URI; the knowledge base action is disabled without it
    #[arg(long, env = "NEO4J_URI", global = true)]
    neo4j_uri: Option<String>,

    /// Neo4j username
    #[arg(long, env = "NEO4J_USER", default_value = "neo4j", global = true)]
    neo4j_user: String,

    /// Neo4j password
    #[arg(long, env = "NEO4J_PASSWORD", default_value = "", hide_env_values = true, global = true)]
    neo4j_password: String,

    /// JSON file describing object types and their relations
    #[arg(long, env = "KB_SCHEMA_PATH", global = true)]
    kb_schema: Option<String>,

    /// Geocoding endpoint (Open-Meteo compatible)
    #[arg(long, env = "GEOCODING_API_URL", default_value = DEFAULT_GEOCODING_URL, global = true)]
    geocoding_url: String,

    /// Forecast endpoint (Open-Meteo compatible)
    #[arg(long, env = "WEATHER_API_URL", default_value = DEFAULT_FORECAST_URL, global = true)]
    weather_url: String,

    /// Timeout for outbound HTTP calls, in seconds
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 10, global = true)]
    http_timeout: u64,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the webhook action server (default)
    Serve,
    /// Invoke actions interactively from the terminal
    Shell,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let knowledge_base = connect_knowledge_base(&args).await?;
    let registry = build_registry(&args, knowledge_base.clone())?;

    close_after(knowledge_base, run(&args, registry)).await
}

/// Await `work`, then release the knowledge base whatever the outcome
async fn close_after<F>(knowledge_base: Option<Arc<KnowledgeBase>>, work: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    let result = work.await;

    if let Some(kb) = knowledge_base {
        kb.close().await;
    }

    result
}

async fn run(args: &Args, registry: ActionRegistry) -> Result<()> {
    match args.command.as_ref().unwrap_or(&Command::Serve) {
        Command::Serve => {
            let addr: SocketAddr = format!("{}:{}", args.host, args.port)
                .parse()
                .with_context(|| format!("Invalid listen address {}:{}", args.host, args.port))?;

            let state = server::AppState {
                registry: Arc::new(registry),
            };
            server::serve(addr, state, shutdown_signal()).await
        }
        Command::Shell => {
            print_banner();
            shell::run(&registry).await
        }
    }
}

/// Open the graph store when Neo4j is configured
async fn connect_knowledge_base(args: &Args) -> Result<Option<Arc<KnowledgeBase>>> {
    let Some(uri) = &args.neo4j_uri else {
        tracing::info!("NEO4J_URI not set, knowledge base action disabled");
        return Ok(None);
    };

    let schema = match &args.kb_schema {
        Some(path) => KnowledgeBaseSchema::from_json_file(path)?,
        None => KnowledgeBaseSchema::default(),
    };

    let config = Neo4jConfig {
        uri: uri.clone(),
        user: args.neo4j_user.clone(),
        password: args.neo4j_password.clone(),
    };
    let store: Arc<dyn GraphStore> = Arc::new(Neo4jStore::connect(&config).await?);

    let kb = KnowledgeBase::new(store, schema).context("Invalid knowledge base schema")?;
    tracing::info!(
        types = ?kb.schema().types.keys().collect::<Vec<_>>(),
        "Knowledge base ready"
    );

    Ok(Some(Arc::new(kb)))
}

/// Wire every action to its collaborators
fn build_registry(args: &Args, knowledge_base: Option<Arc<KnowledgeBase>>) -> Result<ActionRegistry> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let weather_client = Arc::new(
        OpenMeteoClient::new(OpenMeteoConfig {
            geocoding_url: args.geocoding_url.clone(),
            forecast_url: args.weather_url.clone(),
            timeout: Duration::from_secs(args.http_timeout),
        })
        .context("Failed to build HTTP client")?,
    );

    let mut registry = ActionRegistry::new();
    registry.register(Arc::new(ActionQueryTime::new(clock.clone())));
    registry.register(Arc::new(ActionQueryDate::new(clock.clone())));
    registry.register(Arc::new(ActionQueryWeekday::new(clock.clone())));
    registry.register(Arc::new(ActionWeatherFormSubmit::new(
        Arc::new(CalendarNormalizer::new(clock)),
        weather_client.clone(),
        weather_client,
    )));

    if let Some(kb) = knowledge_base {
        registry.register(Arc::new(ActionQueryKnowledgeBase::new(kb)));
    }

    Ok(registry)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

/// Print welcome banner
fn print_banner() {
    println!("\n{}", "╔══════════════════════════════════════════════════════════╗".bright_cyan());
    println!("{}", "║                                                          ║".bright_cyan());
    println!("{}", "║                 ASSISTANT ACTION SHELL                   ║".bright_cyan().bold());
    println!("{}", "║                                                          ║".bright_cyan());
    println!("{}", "║       Time, date, weather and knowledge base actions     ║".bright_cyan());
    println!("{}", "║                                                          ║".bright_cyan());
    println!("{}", "╚══════════════════════════════════════════════════════════╝".bright_cyan());
    println!();
}
