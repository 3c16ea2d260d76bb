//! Plain-text status output for the admin CLI.

use std::path::Path;

use chrono::Utc;

use teleclaw_core::config::{TeleclawConfig, COMMAND_MAX_AGE_HOURS};
use teleclaw_queue::CommandQueue;
use teleclaw_sessions::SessionStore;

use crate::daemon;

pub fn print_relay_status(config: &TeleclawConfig, pid_path: &Path) -> anyhow::Result<()> {
    let state_dir = Path::new(&config.relay.state_dir);
    let now = Utc::now();

    match daemon::read_pid(pid_path).filter(|pid| daemon::process_alive(*pid)) {
        Some(pid) => println!("daemon:    running (pid {pid})"),
        None => println!("daemon:    not running"),
    }

    let sessions = SessionStore::open(state_dir.join("sessions"))?;
    let live = sessions.count_live(now);
    let total = sessions.list().len();
    println!("sessions:  {live} live / {total} total");
    for record in sessions.list() {
        let state = if record.is_expired(now) { "expired" } else { "live" };
        println!(
            "  {}  {}  {}  pane={}  commands={}  [{state}]",
            record.token, record.transport, record.project, record.pane, record.command_count
        );
    }

    let queue = CommandQueue::open(state_dir.join("queue.json"))?;
    let (queued, executing, terminal) = queue.counts();
    println!("commands:  {queued} queued, {executing} executing, {terminal} terminal");
    Ok(())
}

pub fn run_cleanup(config: &TeleclawConfig) -> anyhow::Result<()> {
    let state_dir = Path::new(&config.relay.state_dir);
    let now = Utc::now();

    let sessions = SessionStore::open(state_dir.join("sessions"))?;
    let collected = sessions.gc(now);

    let queue = CommandQueue::open(state_dir.join("queue.json"))?;
    let removed = queue.cleanup(chrono::Duration::hours(COMMAND_MAX_AGE_HOURS), now)?;

    println!("removed {collected} expired session(s), {removed} old command(s)");
    Ok(())
}

pub fn print_command_list(queue: &CommandQueue) -> anyhow::Result<()> {
    let commands = queue.list();
    if commands.is_empty() {
        println!("queue is empty");
        return Ok(());
    }
    for cmd in commands {
        let retries = if cmd.retries > 0 {
            format!("  retries={}/{}", cmd.retries, cmd.max_retries)
        } else {
            String::new()
        };
        let error = cmd
            .error
            .as_deref()
            .map(|e| format!("  error={e}"))
            .unwrap_or_default();
        println!(
            "{}  [{}]  session={}  {}{retries}{error}",
            cmd.id, cmd.status, cmd.session_id, cmd.command
        );
    }
    Ok(())
}

pub fn print_command_counts(queue: &CommandQueue) -> anyhow::Result<()> {
    let (queued, executing, terminal) = queue.counts();
    println!("queued:    {queued}");
    println!("executing: {executing}");
    println!("terminal:  {terminal}");
    Ok(())
}
