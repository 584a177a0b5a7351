use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use bidbridge::config::{load_config, BridgeConfig};
use bidbridge::context::ServerContext;
use bidbridge::errors::{BridgeError, Result};
use bidbridge::mcp::Domain;
use tracing_subscriber::EnvFilter;

/// MCP bridge for the bid-document backend tools.
#[derive(Parser)]
#[command(name = "bidbridge", about = "MCP bridge for the bid-document backend tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve a tool domain over stdio
    Serve {
        /// Tool domain to expose
        #[arg(value_enum)]
        domain: Domain,
        #[command(flatten)]
        backend: BackendArgs,
    },
    /// Print a domain's tool catalog as JSON
    Tools {
        /// Tool domain to describe
        #[arg(value_enum)]
        domain: Domain,
    },
    /// Run a single tool call and print the result envelope
    Call {
        /// Tool domain the tool belongs to
        #[arg(value_enum)]
        domain: Domain,
        /// Tool name
        tool: String,
        /// Tool arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,
        #[command(flatten)]
        backend: BackendArgs,
    },
}

/// Backend location overrides; these win over the config file and environment.
#[derive(Args)]
struct BackendArgs {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Interpreter executable
    #[arg(long)]
    python: Option<String>,
    /// Backend root directory
    #[arg(long)]
    backend_root: Option<PathBuf>,
    /// Interpreter entry script
    #[arg(long)]
    script: Option<PathBuf>,
    /// Per-call timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
}

impl BackendArgs {
    fn resolve(self) -> Result<BridgeConfig> {
        let mut config = load_config(self.config.as_deref())?;
        config.apply_env(|key| std::env::var(key).ok())?;
        if let Some(python) = self.python {
            config.python = python;
        }
        if let Some(root) = self.backend_root {
            config.backend_root = Some(root);
        }
        if let Some(script) = self.script {
            config.script = Some(script);
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "fatal");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Logs go to stderr only; stdout carries the protocol stream.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve { domain, backend } => {
            let ctx = build_context(domain, backend)?;
            tracing::info!(
                domain = %domain,
                interpreter = %ctx.interpreter.display(),
                working_dir = %ctx.working_dir.display(),
                timeout_ms = ctx.timeout.as_millis() as u64,
                "starting bridge"
            );
            let server = bidbridge::build_server(Arc::new(ctx));
            server.run().await?;
        }
        Commands::Tools { domain } => {
            let catalog = domain.catalog();
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({ "tools": catalog.list_tools() }))?
            );
        }
        Commands::Call {
            domain,
            tool,
            args,
            backend,
        } => {
            let arguments: serde_json::Value =
                serde_json::from_str(&args).map_err(|e| BridgeError::Config {
                    message: format!("--args is not valid JSON: {}", e),
                })?;
            let ctx = build_context(domain, backend)?;
            let dispatcher = bidbridge::build_dispatcher(Arc::new(ctx));
            let result = dispatcher.dispatch(&tool, Some(arguments)).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if result.is_error {
                process::exit(2);
            }
        }
    }
    Ok(())
}

fn build_context(domain: Domain, backend: BackendArgs) -> Result<ServerContext> {
    let config = backend.resolve()?;
    let base_dir = std::env::current_dir()?;
    ServerContext::resolve(domain, &config, &base_dir)
}
