use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::warn;

use teleclaw_core::config::{TeleclawConfig, COMMAND_MAX_AGE_HOURS, SHUTDOWN_GRACE_SECS};
use teleclaw_relay::{app, daemon, status};

#[derive(Parser)]
#[command(name = "teleclaw", version, about = "Remote-control relay for a terminal AI assistant")]
struct Cli {
    /// Path to teleclaw.toml (default: ~/.teleclaw/teleclaw.toml)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run and inspect the relay
    Relay {
        #[command(subcommand)]
        action: RelayAction,
    },
    /// Inspect and manage the command queue
    Commands {
        #[command(subcommand)]
        action: CommandsAction,
    },
    /// Manage the background daemon
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },
}

#[derive(Subcommand)]
enum RelayAction {
    /// Run the relay in the foreground
    Start,
    /// Stop a running relay
    Stop,
    /// Show sessions, queue, and daemon state
    Status,
    /// Collect expired sessions and old terminal commands
    Cleanup,
}

#[derive(Subcommand)]
enum CommandsAction {
    /// List every queued command
    List,
    /// Show queue counts
    Status,
    /// Drop terminal commands older than 24h
    Cleanup,
    /// Drop every command regardless of status
    Clear,
}

#[derive(Subcommand)]
enum DaemonAction {
    /// Start the relay detached in the background
    Start,
    /// Signal the daemon to drain and exit
    Stop,
    /// Stop then start
    Restart,
    /// Report whether the daemon is running
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "teleclaw=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = TeleclawConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({e}), using defaults");
        TeleclawConfig::default()
    });
    let state_dir = PathBuf::from(&config.relay.state_dir);
    let pid_path = state_dir.join("relay.pid");

    match cli.command {
        Command::Relay { action } => match action {
            RelayAction::Start => {
                config.validate()?;
                let app = Arc::new(app::RelayApp::build(config)?);
                daemon::run(app).await
            }
            RelayAction::Stop => stop_daemon(&pid_path).await,
            RelayAction::Status => status::print_relay_status(&config, &pid_path),
            RelayAction::Cleanup => status::run_cleanup(&config),
        },
        Command::Commands { action } => {
            let queue = teleclaw_queue::CommandQueue::open(state_dir.join("queue.json"))?;
            match action {
                CommandsAction::List => status::print_command_list(&queue),
                CommandsAction::Status => status::print_command_counts(&queue),
                CommandsAction::Cleanup => {
                    let removed = queue.cleanup(
                        chrono::Duration::hours(COMMAND_MAX_AGE_HOURS),
                        chrono::Utc::now(),
                    )?;
                    println!("removed {removed} old command(s)");
                    Ok(())
                }
                CommandsAction::Clear => {
                    let removed = queue.clear()?;
                    println!("cleared {removed} command(s)");
                    Ok(())
                }
            }
        }
        Command::Daemon { action } => match action {
            DaemonAction::Start => start_daemon(cli.config.as_deref(), &state_dir),
            DaemonAction::Stop => stop_daemon(&pid_path).await,
            DaemonAction::Restart => {
                stop_daemon(&pid_path).await?;
                start_daemon(cli.config.as_deref(), &state_dir)
            }
            DaemonAction::Status => {
                match daemon::read_pid(&pid_path).filter(|pid| daemon::process_alive(*pid)) {
                    Some(pid) => println!("daemon running (pid {pid})"),
                    None => println!("daemon not running"),
                }
                Ok(())
            }
        },
    }
}

fn start_daemon(config: Option<&str>, state_dir: &std::path::Path) -> anyhow::Result<()> {
    let pid = daemon::spawn_detached(config, state_dir)?;
    println!("daemon started (pid {pid})");
    Ok(())
}

async fn stop_daemon(pid_path: &std::path::Path) -> anyhow::Result<()> {
    let grace = Duration::from_secs(SHUTDOWN_GRACE_SECS + 5);
    if daemon::stop(pid_path, grace).await? {
        println!("daemon stopped");
    } else {
        println!("daemon not running");
    }
    Ok(())
}
