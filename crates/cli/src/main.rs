use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use dms_client::AUTH_TOKEN_ENV;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

mod config;
mod session;

use config::FileConfig;

#[derive(Parser)]
#[command(name = "dms-nav")]
#[command(about = "Navigate a document store's filing plans from the command line", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML file with [navigator] and [client] tables
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Bearer token (defaults to DMS_AUTH_TOKEN)
    #[arg(long, global = true)]
    token: Option<String>,

    /// Server base URL (overrides DMS_BASE_URL and the config file)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute command requests in order, one JSON response per line
    Run(RunArgs),

    /// Print the effective configuration
    Config,
}

#[derive(Args)]
struct RunArgs {
    /// Inline request object or array (mutually exclusive with --file)
    #[arg(long, conflicts_with = "file")]
    json: Option<String>,

    /// File with a request object, an array, or JSON lines
    #[arg(long)]
    file: Option<PathBuf>,

    /// Pretty-print JSON responses
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = FileConfig::load(cli.config.as_deref())?.with_overrides(cli.base_url.as_deref())?;
    match cli.command {
        Commands::Run(args) => run(args, &config, cli.token.as_deref()).await,
        Commands::Config => show_config(&config, cli.token.as_deref()),
    }
}

async fn run(args: RunArgs, config: &FileConfig, token: Option<&str>) -> Result<()> {
    let raw = read_requests(&args)?;
    let requests = session::parse_requests(&raw)?;
    let dispatcher = session::build_dispatcher(config, token)?;
    log::debug!("Running {} command(s) against {}", requests.len(), config.client.base_url);

    let mut failed = false;
    for request in requests {
        let response = dispatcher.dispatch(request).await;
        failed |= response.is_error();
        let output = if args.pretty {
            serde_json::to_string_pretty(&response)?
        } else {
            serde_json::to_string(&response)?
        };
        print_stdout(&output)?;
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

fn read_requests(args: &RunArgs) -> Result<String> {
    if let Some(raw) = &args.json {
        return Ok(raw.clone());
    }
    if let Some(path) = &args.file {
        return fs::read_to_string(path)
            .with_context(|| format!("Failed to read requests from {}", path.display()));
    }

    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read requests from stdin")?;
    Ok(buffer)
}

fn show_config(config: &FileConfig, token: Option<&str>) -> Result<()> {
    let credential = if token.is_some() {
        "flag"
    } else if std::env::var(AUTH_TOKEN_ENV).is_ok_and(|value| !value.trim().is_empty()) {
        "env"
    } else {
        "none"
    };
    let output = serde_json::json!({
        "navigator": config.navigator,
        "client": config.client,
        "credential": credential,
    });
    print_stdout(&serde_json::to_string_pretty(&output)?)
}

fn print_stdout(text: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}
