use anyhow::Result;
use clap::Parser;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::sleep;
use std::time::{Duration, Instant};

const API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug)]
enum LauncherError {
    SignalHandlerError,
    MockProviderError,
    RelayError,
    ChatClientError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProgramName {
    MockProvider,
    Relay,
    ChatClient,
}

impl ProgramName {
    fn get_error(&self) -> LauncherError {
        match self {
            ProgramName::MockProvider => LauncherError::MockProviderError,
            ProgramName::Relay => LauncherError::RelayError,
            ProgramName::ChatClient => LauncherError::ChatClientError,
        }
    }

    fn get_executable(&self, bin_dir: Option<&PathBuf>) -> PathBuf {
        let executable_name = match self {
            ProgramName::MockProvider => "mock_provider",
            ProgramName::Relay => "relay",
            ProgramName::ChatClient => "chat_client",
        };

        match bin_dir {
            Some(dir) => dir.join(executable_name),
            None => PathBuf::from(executable_name),
        }
    }
}

#[derive(Parser, Debug)]
struct Args {
    #[clap(long, default_value = "127.0.0.1")]
    relay_host: String,
    #[clap(long, default_value = "3001")]
    relay_port: u16,
    #[clap(long, default_value = "8090")]
    mock_port: u16,
    #[clap(long, short, env = API_KEY_ENV, hide_env_values = true)]
    api_key: Option<String>,
    /// Point the relay at a local mock provider instead of the real one.
    #[clap(long)]
    mock: bool,
    /// Directory holding the workspace binaries; `PATH` is searched when unset.
    #[clap(long)]
    bin_dir: Option<PathBuf>,
}

impl Args {
    fn relay_address(&self) -> String {
        format!("{}:{}", self.relay_host, self.relay_port)
    }

    fn get_arguments(&self, program_name: ProgramName) -> Vec<String> {
        match program_name {
            ProgramName::MockProvider => vec!["--port".to_string(), self.mock_port.to_string()],
            ProgramName::Relay => {
                let mut args = vec!["--address".to_string(), self.relay_address()];
                if self.mock {
                    args.push("--base-url".to_string());
                    args.push(format!("http://127.0.0.1:{}", self.mock_port));
                }
                args
            }
            ProgramName::ChatClient => {
                vec!["--relay-address".to_string(), self.relay_address()]
            }
        }
    }

    /// Environment for the child; keeps the key off the command line.
    fn get_env(&self, program_name: ProgramName) -> Vec<(&'static str, String)> {
        if program_name != ProgramName::Relay {
            return vec![];
        }
        match (&self.api_key, self.mock) {
            (Some(key), _) => vec![(API_KEY_ENV, key.clone())],
            (None, true) => vec![(API_KEY_ENV, "mock".to_string())],
            (None, false) => vec![],
        }
    }
}

fn main() -> Result<(), LauncherError> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    tracing::info!(
        "Launcher started with relay on {}, mock provider: {}",
        args.relay_address(),
        args.mock
    );
    if args.api_key.is_none() && !args.mock {
        tracing::warn!("{} is not set, the relay will answer with its fallback", API_KEY_ENV);
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .map_err(|_| LauncherError::SignalHandlerError)?;

    let mut servers = Vec::new();
    if args.mock {
        servers.push(spawn_program(&args, ProgramName::MockProvider)?);
        sleep(Duration::from_millis(100));
    }
    servers.push(spawn_program(&args, ProgramName::Relay)?);
    sleep(Duration::from_millis(200));

    let (_, mut chat_client) = spawn_program(&args, ProgramName::ChatClient)?;

    tracing::info!("Everything is up and running. Type /quit or press Ctrl-C to terminate.");

    let mut result = Ok(());
    while running.load(Ordering::SeqCst) {
        match chat_client.try_wait() {
            Ok(Some(status)) => {
                tracing::info!("Chat client exited with {}", status);
                break;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!("Cannot poll chat client: {:?}", e);
                result = Err(LauncherError::ChatClientError);
                break;
            }
        }

        let mut died = None;
        for (name, child) in servers.iter_mut() {
            if !matches!(child.try_wait(), Ok(None)) {
                died = Some(*name);
                break;
            }
        }
        if let Some(name) = died {
            tracing::error!("{:?} has died, shutting down", name);
            result = Err(name.get_error());
            break;
        }

        sleep(Duration::from_millis(100));
    }

    for (name, child) in servers
        .into_iter()
        .chain(std::iter::once((ProgramName::ChatClient, chat_client)))
    {
        if let Err(e) = terminate(name, child, Duration::from_millis(500)) {
            tracing::error!("Failed to terminate {:?}: {:?}", name, e);
        }
    }

    result
}

fn spawn_program(
    args: &Args,
    program_name: ProgramName,
) -> Result<(ProgramName, Child), LauncherError> {
    tracing::info!("Spawning {:?}", program_name);

    let child = Command::new(program_name.get_executable(args.bin_dir.as_ref()))
        .args(args.get_arguments(program_name))
        .envs(args.get_env(program_name))
        .spawn()
        .map_err(|e| {
            tracing::error!("Cannot start {:?}: {}", program_name, e);
            program_name.get_error()
        })?;

    Ok((program_name, child))
}

fn terminate(
    program_name: ProgramName,
    mut process: Child,
    timeout: Duration,
) -> Result<ExitStatus> {
    if let Some(status) = process.try_wait()? {
        return Ok(status);
    }

    tracing::info!("Terminating {:?}", program_name);

    let terminate_time = Instant::now();
    signal::kill(Pid::from_raw(process.id() as i32), Signal::SIGTERM)?;

    tracing::info!("Waiting for {:?} to gracefully shutdown", program_name);

    while terminate_time.elapsed() < timeout {
        if let Some(status) = process.try_wait()? {
            tracing::info!("{:?} terminated", program_name);
            return Ok(status);
        }
        sleep(Duration::from_millis(100));
    }

    tracing::info!("Killing {:?}", program_name);

    process.kill()?;
    let exit_status = process.wait()?;

    tracing::info!("{:?} killed", program_name);
    Ok(exit_status)
}
