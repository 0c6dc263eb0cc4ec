use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use relay::processor::DEFAULT_MAX_MESSAGE_CHARS;
use relay::{Interpolation, Processor, PromptTemplate};

#[derive(Parser, Debug)]
struct Args {
    #[clap(short, long, env = "RELAY_ADDRESS", default_value = "0.0.0.0:3001")]
    address: String,
    #[clap(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    #[clap(short, long, env = "GEMINI_MODEL", default_value = genai_client::DEFAULT_MODEL)]
    model: String,
    #[clap(long, env = "GEMINI_BASE_URL", default_value = genai_client::DEFAULT_BASE_URL)]
    base_url: String,
    #[clap(long, env = "RELAY_PROVIDER_TIMEOUT_SECS")]
    provider_timeout_secs: Option<u64>,
    #[clap(long, env = "RELAY_MAX_MESSAGE_CHARS", default_value_t = DEFAULT_MAX_MESSAGE_CHARS)]
    max_message_chars: usize,
    #[clap(long, env = "RELAY_INTERPOLATION", value_enum, default_value_t = Interpolation::Verbatim)]
    interpolation: Interpolation,
    #[clap(long, env = "RELAY_PERSONA_FILE")]
    persona_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    if dotenvy::dotenv().is_err() {
        tracing::debug!("No .env file loaded");
    }

    let args = Args::parse();
    tracing::info!(
        "Starting relay with model={} base_url={} max_message_chars={} interpolation={:?}",
        args.model,
        args.base_url,
        args.max_message_chars,
        args.interpolation
    );

    if args.api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY is not set, every chat request will get the fallback reply");
    }

    let client = genai_client::Client::new(genai_client::Config {
        api_key: args.api_key.clone(),
        model: args.model.clone(),
        base_url: args.base_url.clone(),
        timeout: args.provider_timeout_secs.map(Duration::from_secs),
    })?;
    tracing::info!("Provider client ready: {:?}", client);

    let prompt = match &args.persona_file {
        Some(path) => {
            let template = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading persona file {}", path.display()))?;
            PromptTemplate::from_template(template)?
        }
        None => PromptTemplate::default(),
    }
    .with_interpolation(args.interpolation);

    let proc =
        Processor::new(Arc::new(client), prompt).with_max_message_chars(args.max_message_chars);
    let app = relay::app(proc);

    tracing::info!("Listening on {}", &args.address);
    let listener = TcpListener::bind(&args.address)
        .await
        .with_context(|| format!("binding {}", args.address))?;

    axum::serve(listener, app).await?;
    tracing::info!("Server shutdown");

    Ok(())
}
