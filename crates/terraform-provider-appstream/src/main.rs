use anyhow::Context;
use appstream_aws::appstream_provider;
use appstream_plugin::{CancellationToken, ProviderSchema, serve};
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

const MAGIC_COOKIE_KEY: &str = "TF_PLUGIN_MAGIC_COOKIE";
const MAGIC_COOKIE_VALUE: &str =
    "d602bf8f470bc67ca7faa0386276bbdd4330efaf76d1a219cb4d6991ca9872b2";

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

#[derive(Parser)]
#[command(name = "terraform-provider-appstream", version)]
#[command(about = "Terraform provider for AWS AppStream 2.0", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, env = "TF_LOG")]
    log: Option<String>,

    /// Print the provider and resource schemas as JSON and exit
    #[arg(long)]
    schema: bool,
}

/// `TF_LOG` level if it names one, then `RUST_LOG`, then `info`
fn env_filter(log: Option<&str>) -> EnvFilter {
    log.map(str::to_lowercase)
        .filter(|level| LOG_LEVELS.contains(&level.as_str()))
        .map(EnvFilter::new)
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries the handshake, so logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter(cli.log.as_deref()))
        .with_ansi(false)
        .init();

    let cancel = CancellationToken::new();
    let provider = appstream_provider(cancel.clone());

    if cli.schema {
        println!("{}", schema_json(&provider.schema())?);
        return Ok(());
    }

    if std::env::var(MAGIC_COOKIE_KEY).ok().as_deref() != Some(MAGIC_COOKIE_VALUE) {
        eprintln!(
            "{} This binary is a Terraform plugin and is not meant to be executed directly.",
            "Error:".red().bold()
        );
        eprintln!(
            "{}",
            "Hint: run `terraform init` in a configuration that uses the appstream provider."
                .yellow()
        );
        std::process::exit(1);
    }

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, cancelling pending operations");
                cancel.cancel();
            }
        }
    });

    tracing::info!("terraform-provider-appstream {} starting", env!("CARGO_PKG_VERSION"));
    serve(provider, cancel)
        .await
        .context("plugin server failed")
}

fn schema_json(schema: &ProviderSchema) -> anyhow::Result<String> {
    serde_json::to_string_pretty(schema).context("failed to encode schema")
}
