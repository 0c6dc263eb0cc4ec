use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::JoinSet;

use crate::session::{ChatSession, QUICK_REPLIES};
use crate::transcript::ChatMessage;

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Send(String),
    Quick(usize),
    History,
    Quit,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        let Some(command) = trimmed.strip_prefix('/') else {
            return Command::Send(line.to_string());
        };
        match command {
            "quit" | "exit" => Command::Quit,
            "history" => Command::History,
            _ => match command.parse::<usize>() {
                Ok(n) if (1..=QUICK_REPLIES.len()).contains(&n) => Command::Quick(n - 1),
                _ => Command::Unknown(trimmed.to_string()),
            },
        }
    }
}

pub fn print_message(message: &ChatMessage) {
    println!("{}", message.to_line());
}

pub fn print_help() {
    println!("Topik cepat:");
    for (i, topic) in QUICK_REPLIES.iter().enumerate() {
        println!("  /{} {}", i + 1, topic);
    }
    println!("  /history untuk melihat percakapan, /quit untuk keluar");
}

/// Reads commands until `/quit` or end of input, one task per send.
/// Returns only after every started round trip has settled.
pub async fn run<R>(session: Arc<ChatSession>, input: R) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut sends = JoinSet::new();
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        match Command::parse(&line) {
            Command::Quit => break,
            Command::History => session.messages().iter().for_each(print_message),
            Command::Unknown(command) => {
                println!("Perintah tidak dikenal: {}", command);
                print_help();
            }
            Command::Quick(index) => {
                let session = session.clone();
                sends.spawn(async move {
                    if let Some(reply) = session.quick_reply(index).await {
                        print_message(&reply);
                    }
                });
            }
            Command::Send(text) => {
                let session = session.clone();
                sends.spawn(async move {
                    if let Some(reply) = session.send_message(&text).await {
                        print_message(&reply);
                    }
                });
            }
        }
    }

    if !sends.is_empty() {
        tracing::info!("Waiting for {} pending replies", sends.len());
    }
    while let Some(settled) = sends.join_next().await {
        if let Err(e) = settled {
            tracing::error!("Send task failed: {:?}", e);
        }
    }

    Ok(())
}
