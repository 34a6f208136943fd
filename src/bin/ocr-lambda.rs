//! CLI binary for ocr-lambda.
//!
//! A thin shim over the library crate: `serve` runs the Lambda runtime loop,
//! `invoke` processes one request locally, `catalog` prints the error catalog.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ocr_lambda::runtime::{self, RuntimeClient};
use ocr_lambda::taxonomy::CATALOG;
use ocr_lambda::{
    DirectoryStore, GraphicsMode, InvocationContext, ObjectStore, PdfiumEngine, Processor,
    S3Store, ServiceConfig,
};
use serde_json::{json, Value};
use std::io::{self, Read};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run as a Lambda custom runtime (default inside Lambda)
  ocr-lambda serve

  # Extract one document from S3
  ocr-lambda invoke --s3-path s3://my-bucket/report.pdf --pretty

  # Replay a captured event, serving objects from a local directory
  ocr-lambda invoke --event event.json --local-root ./fixtures

  # Print the error catalog
  ocr-lambda catalog

ENVIRONMENT VARIABLES:
  OCR_LAMBDA_SERVICE_NAME        Value of ocr_service in failure envelopes
  OCR_LAMBDA_TIMEOUT_SECS        Invocation budget in seconds (default 840)
  OCR_LAMBDA_DEADLINE_MARGIN_MS  Reserve before the runtime deadline (default 2000)
  OCR_LAMBDA_S3_TIMEOUT_SECS     Object download timeout (default 60)
  OCR_LAMBDA_MEMORY_BUDGET_MB    Input + output budget (default 80% of function memory)
  OCR_LAMBDA_S3_ENDPOINT         Custom S3 endpoint (MinIO, localstack)
  OCR_LAMBDA_PDFIUM_DOWNLOAD     Allow downloading libpdfium when not found (true/false)
  AUTH_SECRET_ID                 Secrets Manager id whose accessKey must match the
                                 bearer token (serve only; unset disables the check)
  PDFIUM_LIB_PATH                Path to an existing libpdfium
  PDFIUM_AUTO_CACHE_DIR          Override the pdfium cache directory
  RUST_LOG                       Log filter (overrides --verbose)
"#;

/// Extract markdown, word boxes and metadata from PDFs stored in S3.
#[derive(Parser, Debug)]
#[command(
    name = "ocr-lambda",
    version,
    about = "Extract markdown, word boxes and metadata from PDFs stored in S3",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "OCR_LAMBDA_VERBOSE")]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve invocations from the Lambda Runtime API.
    Serve,

    /// Process a single request and print the response.
    Invoke(InvokeArgs),

    /// Print the error catalog as JSON.
    Catalog,
}

#[derive(clap::Args, Debug)]
struct InvokeArgs {
    /// Event JSON file, or `-` for stdin.
    #[arg(long, conflicts_with_all = ["s3_path", "graphics_mode"])]
    event: Option<String>,

    /// Document reference (s3://bucket/key).
    #[arg(long)]
    s3_path: Option<String>,

    /// Markdown mode: tables or text.
    #[arg(long)]
    graphics_mode: Option<String>,

    /// Serve s3://bucket/key from <DIR>/bucket/key instead of S3.
    #[arg(long, value_name = "DIR")]
    local_root: Option<PathBuf>,

    /// Pretty-print the response.
    #[arg(long)]
    pretty: bool,
}

fn init_logging(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    // CloudWatch timestamps every line and does not render colours.
    if std::env::var_os("AWS_LAMBDA_FUNCTION_NAME").is_some() {
        builder.with_ansi(false).without_time().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let command = match cli.command {
        Some(command) => command,
        None if std::env::var_os("AWS_LAMBDA_RUNTIME_API").is_some() => Command::Serve,
        None => bail!("no command given; run `ocr-lambda --help`"),
    };

    match command {
        Command::Serve => serve().await,
        Command::Invoke(args) => invoke(args).await,
        Command::Catalog => {
            println!("{}", serde_json::to_string_pretty(&CATALOG)?);
            Ok(())
        }
    }
}

async fn serve() -> Result<()> {
    let client = RuntimeClient::from_env().context("Lambda runtime API unavailable")?;

    let config = match ServiceConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            if let Err(post_err) = client.post_init_error(&e).await {
                error!("Failed to report init error: {}", post_err);
            }
            return Err(e).context("Failed to load configuration");
        }
    };
    info!(
        service = %config.service_name,
        timeout_secs = config.invocation_timeout_secs,
        memory_budget_bytes = config.memory_budget_bytes,
        "Starting"
    );

    let processor = Processor::from_config(config).await;
    runtime::run(&processor, &client)
        .await
        .context("Lambda runtime loop stopped")
}

async fn invoke(args: InvokeArgs) -> Result<()> {
    let event = read_event(&args)?;
    let config = ServiceConfig::from_env().context("Failed to load configuration")?;
    let engine = PdfiumEngine::from_config(&config);

    let response = match &args.local_root {
        Some(root) => {
            info!("Serving objects from {}", root.display());
            run_once(DirectoryStore::new(root), engine, config, event).await?
        }
        None => {
            let store = S3Store::from_config(&config).await;
            run_once(store, engine, config, event).await?
        }
    };

    let text = if args.pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    println!("{}", text);

    let failed = response.get("success") == Some(&Value::Bool(false))
        || response
            .get("statusCode")
            .and_then(Value::as_u64)
            .is_some_and(|status| status != 200);
    if failed {
        std::process::exit(2);
    }
    Ok(())
}

async fn run_once<St: ObjectStore>(
    store: St,
    engine: PdfiumEngine,
    config: ServiceConfig,
    event: Value,
) -> Result<Value> {
    let processor = Processor::new(store, engine, config);
    processor
        .handle_event(event, &InvocationContext::default())
        .await
        .context("Failed to build a response")
}

fn read_event(args: &InvokeArgs) -> Result<Value> {
    if let Some(source) = &args.event {
        let raw = if source == "-" {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read event from stdin")?;
            buf
        } else {
            std::fs::read_to_string(source)
                .with_context(|| format!("Failed to read event from {:?}", source))?
        };
        return serde_json::from_str(&raw).context("Event is not valid JSON");
    }

    let mut event = json!({});
    if let Some(path) = &args.s3_path {
        event["s3_path"] = json!(path);
    }
    if let Some(mode) = &args.graphics_mode {
        // Passed through as given; validation reports unknown modes.
        event["graphics_mode"] = json!(mode);
    }
    if args.s3_path.is_none() && args.graphics_mode.is_none() {
        bail!(
            "give --event or --s3-path (graphics modes: {})",
            GraphicsMode::expected()
        );
    }
    Ok(event)
}
