use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mcp_adapters::config::{find_config_file, load_settings};
use mcp_adapters::{LifecycleManager, McpServer};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// mcp-adapters - MCP tool server with arXiv search and calculator tools
#[derive(Parser, Debug)]
#[command(name = "mcp-adapters")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "MCP tool server with arXiv search and calculator tools", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Show all environment variables
    #[arg(long, global = true)]
    env: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the MCP server
    Serve {
        /// Run in stdio mode
        #[arg(long, default_value_t = true)]
        stdio: bool,

        /// Run in HTTP/SSE mode (overrides --stdio)
        #[arg(long)]
        http: bool,

        /// Port for HTTP mode (defaults to MCP_SERVER_PORT or 5000)
        #[arg(long, short)]
        port: Option<u16>,

        /// Host to bind to for HTTP mode (defaults to MCP_SERVER_HOST or 127.0.0.1)
        #[arg(long)]
        host: Option<String>,
    },

    /// Print the registered tools as JSON
    #[command(alias = "ls")]
    Tools,

    /// Call a tool once and print its text result
    Call {
        /// Tool name
        name: String,

        /// Tool arguments as a JSON object
        #[arg(long, short, default_value = "{}")]
        args: String,

        /// Print dispatch statistics for the call to stderr
        #[arg(long)]
        stats: bool,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn print_env_vars() {
    println!("mcp-adapters - Environment Variables");
    println!();
    println!("arXiv:");
    println!("  ARXIV_DEFAULT_MAX_RESULTS      Papers returned per search (1-50, default: 5)");
    println!("  ARXIV_DEFAULT_MAX_TEXT_LENGTH  Characters of full text kept per paper (>= 100, default: unlimited)");
    println!("  ARXIV_MAX_CONCURRENCY          Papers processed at once (default: all candidates)");
    println!("  ARXIV_ITEM_TIMEOUT_SECS        Per-paper download and extraction deadline (default: 120)");
    println!("  ARXIV_SEARCH_RETRIES           Attempts for the search API call (default: 3)");
    println!("  ARXIV_API_URL                  arXiv query endpoint (default: http://export.arxiv.org/api/query)");
    println!();
    println!("Calculator:");
    println!("  CALCULATOR_ENABLED_OPERATIONS  Comma-separated operations (default: add,subtract,multiply,divide)");
    println!("  CALCULATOR_VERBOSE_ERRORS      Include operands in error messages (default: false)");
    println!();
    println!("Server:");
    println!("  MCP_SERVER_HOST                HTTP bind host (default: 127.0.0.1)");
    println!("  MCP_SERVER_PORT                HTTP bind port (default: 5000)");
    println!("  MCP_ADAPTERS_CONFIG            Configuration file path");
    println!();
    println!("Other Settings:");
    println!("  RUST_LOG                       Rust logging filter (e.g., mcp_adapters=debug)");
    std::process::exit(0);
}

fn init_tracing(cli: &Cli) {
    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = if cli.quiet { "error" } else { log_level };

    // stdout carries the stdio transport, so logs go to stderr
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("mcp_adapters={}", env_filter)),
        ))
        .with(
            cli.log_json
                .then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)),
        )
        .with(
            (!cli.log_json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.env {
        print_env_vars();
    }

    init_tracing(&cli);

    let config_path = match &cli.config {
        Some(path) => Some(path.clone()),
        None => find_config_file(),
    };
    if let Some(path) = &config_path {
        tracing::info!("Using config file: {}", path.display());
    }
    let settings = load_settings(config_path.as_deref()).context("invalid configuration")?;

    match cli.command {
        Some(Commands::Config) => {
            print!("{}", toml::to_string_pretty(&settings)?);
        }

        Some(Commands::Tools) => {
            let manager = LifecycleManager::start(settings).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&manager.dispatcher().list_tools())?
            );
            manager.shutdown();
        }

        Some(Commands::Call { name, args, stats }) => {
            let arguments: serde_json::Value =
                serde_json::from_str(&args).context("--args must be valid JSON")?;

            let manager = LifecycleManager::start(settings).await?;
            let dispatcher = manager.dispatcher();
            let result = dispatcher.dispatch(&name, arguments).await;
            println!("{}", result.text);
            if stats {
                eprintln!("{}", serde_json::to_string_pretty(&dispatcher.stats())?);
            }
            manager.shutdown();

            if result.is_error() {
                std::process::exit(1);
            }
        }

        Some(Commands::Serve {
            stdio,
            http,
            port,
            host,
        }) => {
            let host = host.unwrap_or_else(|| settings.server.host.clone());
            let port = port.unwrap_or(settings.server.port);

            let manager = LifecycleManager::start(settings).await?;
            let server = McpServer::new(manager.dispatcher())?;

            // Use HTTP mode if --http flag is provided, otherwise use --stdio flag
            let use_http = http || !stdio;

            if use_http {
                let addr = format!("{}:{}", host, port);
                let (bound_addr, handle) = server.run_http(&addr).await?;
                tracing::info!("MCP server listening on {}", bound_addr);

                tokio::select! {
                    joined = handle => {
                        joined.map_err(|e| anyhow::anyhow!("Server task failed: {}", e))?;
                    }
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Received Ctrl-C, shutting down");
                    }
                }
            } else {
                tokio::select! {
                    served = server.run() => served?,
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Received Ctrl-C, shutting down");
                    }
                }
            }

            manager.shutdown();
        }

        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
        }
    }

    Ok(())
}
