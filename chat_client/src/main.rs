use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::io::BufReader;

use chat_client::repl::{self, print_help, print_message};
use chat_client::{ChatSession, HttpClient};

#[derive(Parser, Debug)]
#[clap(version = "0.1.0", about = "Terminal chat with the Sahabat Jiwa assistant")]
struct Args {
    #[clap(short, long, env = "RELAY_ADDRESS", default_value = "127.0.0.1:3001")]
    relay_address: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    tracing::info!(
        "Starting chat client connected to relay on [{:?}]",
        args.relay_address
    );

    let client = Arc::new(HttpClient::new(&args.relay_address));
    tracing::debug!("Relay client: {:?}", client);
    let session = Arc::new(ChatSession::new(client));

    for message in session.messages() {
        print_message(&message);
    }
    print_help();

    repl::run(session, BufReader::new(tokio::io::stdin())).await?;

    tracing::info!("Chat client shutdown");
    Ok(())
}
