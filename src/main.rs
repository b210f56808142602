use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{error, info};
use tokio::sync::mpsc;

mod engine;
mod env;
mod error;
mod installer;
mod networking;
mod notify;
mod resolver;
mod scheduler;
mod storage;
mod updater;
mod util;

#[cfg(test)]
mod testing;

use engine::models::{AccessToken, AddOnDescriptor};
use engine::state::PassState;
use engine::{PassOptions, UpdateEngine};
use networking::NetworkClient;
use notify::LogNotifier;
use scheduler::Scheduler;
use storage::{LocalFileStore, SettingsStore};

type Engine = UpdateEngine<NetworkClient, LocalFileStore, LogNotifier>;

#[derive(Parser, Debug)]
#[command(
    name = "addon-updater",
    author,
    version,
    about = "Checks registered add-ons for new GitHub releases and installs them"
)]
struct Cli {
    /// Settings file to use instead of the one in the data directory.
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Only log notices instead of also printing them.
    #[arg(long, short, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one pass over every registered add-on.
    Check {
        /// Only check this add-on; never installs.
        #[arg(long, conflicts_with = "install")]
        name: Option<String>,
        /// Install available updates even when auto-install is off.
        #[arg(long)]
        install: bool,
    },
    /// Check on startup, then periodically; press Enter to check immediately.
    Watch,
    /// Register an add-on.
    Add {
        name: String,
        repo_url: String,
        /// Token sent as a bearer credential to the GitHub API.
        #[arg(long)]
        token: Option<String>,
        /// Install folder; defaults to <plugins_root>/<name>.
        #[arg(long)]
        destination: Option<PathBuf>,
    },
    /// Deregister an add-on. Installed files are left in place.
    Remove { name: String },
    /// Show registered add-ons and their installed versions.
    List,
    /// Change polling and install settings.
    Set {
        #[arg(long)]
        check_period_minutes: Option<u64>,
        #[arg(long)]
        auto_install: Option<bool>,
        #[arg(long)]
        bump_on_partial_success: Option<bool>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let store = cli
        .settings
        .map(SettingsStore::new)
        .unwrap_or_else(SettingsStore::default_location);

    let notifier = LogNotifier::new(cli.quiet);
    match run(cli.command, &store, notifier).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, store: &SettingsStore, notifier: LogNotifier) -> Result<(), String> {
    match command {
        Command::Check { name: Some(name), .. } => {
            let settings = store.load().await.map_err(|e| e.to_string())?;
            let descriptor = settings
                .find(&name)
                .ok_or_else(|| format!("no add-on named {name}"))?;
            new_engine(notifier)
                .check_single(&PassOptions::from(&settings), descriptor)
                .await;
            Ok(())
        }
        Command::Check { name: None, install } => {
            let engine = new_engine(notifier);
            let updates = spawn_status_logger();
            run_scheduled_pass(&engine, store, install, &updates).await
        }
        Command::Watch => watch(store, notifier).await,
        Command::Add {
            name,
            repo_url,
            token,
            destination,
        } => {
            if name.trim().is_empty() || repo_url.trim().is_empty() {
                return Err("Name and repository URL required".into());
            }
            updater::parse_repository(&repo_url).map_err(|e| e.to_string())?;
            let mut settings = store.load().await.map_err(|e| e.to_string())?;
            if settings.find(&name).is_some() {
                return Err(format!("an add-on named {name} is already registered"));
            }
            let mut descriptor = AddOnDescriptor::new(name.trim(), repo_url.trim());
            descriptor.access_token = token.filter(|t| !t.is_empty()).map(AccessToken::new);
            descriptor.destination = destination;
            settings.plugins.push(descriptor);
            store.save(&settings).await.map_err(|e| e.to_string())?;
            println!("Registered {name}");
            Ok(())
        }
        Command::Remove { name } => {
            let mut settings = store.load().await.map_err(|e| e.to_string())?;
            let before = settings.plugins.len();
            settings.plugins.retain(|p| p.name != name);
            if settings.plugins.len() == before {
                return Err(format!("no add-on named {name}"));
            }
            store.save(&settings).await.map_err(|e| e.to_string())?;
            println!("Removed {name}");
            Ok(())
        }
        Command::List => {
            let settings = store.load().await.map_err(|e| e.to_string())?;
            if settings.plugins.is_empty() {
                println!("No add-ons registered ({})", store.path().display());
            }
            let root = settings.plugins_root();
            for plugin in &settings.plugins {
                println!(
                    "{}  Latest: {} | {} -> {}",
                    plugin.name,
                    plugin.installed_version.as_deref().unwrap_or("unknown"),
                    plugin.repo_url,
                    plugin.destination_in(&root).display()
                );
            }
            Ok(())
        }
        Command::Set {
            check_period_minutes,
            auto_install,
            bump_on_partial_success,
        } => {
            let mut settings = store.load().await.map_err(|e| e.to_string())?;
            if let Some(minutes) = check_period_minutes {
                if minutes == 0 {
                    return Err("check period must be at least one minute".into());
                }
                settings.check_period_minutes = minutes;
            }
            if let Some(enabled) = auto_install {
                settings.auto_install = enabled;
            }
            if let Some(enabled) = bump_on_partial_success {
                settings.bump_on_partial_success = enabled;
            }
            store.save(&settings).await.map_err(|e| e.to_string())
        }
    }
}

fn new_engine(notifier: LogNotifier) -> Engine {
    UpdateEngine::new(NetworkClient::new(), LocalFileStore, notifier)
}

fn spawn_status_logger() -> mpsc::UnboundedSender<PassState> {
    let (tx, mut rx) = mpsc::unbounded_channel::<PassState>();
    tokio::spawn(async move {
        while let Some(state) = rx.recv().await {
            info!("status: {}", state.label());
        }
    });
    tx
}

/// Load settings, run one pass, persist the recorded versions.
async fn run_scheduled_pass(
    engine: &Engine,
    store: &SettingsStore,
    force_install: bool,
    updates: &mpsc::UnboundedSender<PassState>,
) -> Result<(), String> {
    let mut settings = store.load().await.map_err(|e| e.to_string())?;
    let auto_install = settings.auto_install || force_install;
    engine.run_pass(&mut settings, auto_install, updates).await;
    store.save(&settings).await.map_err(|e| e.to_string())
}

async fn watch(store: &SettingsStore, notifier: LogNotifier) -> Result<(), String> {
    let settings = store.load().await.map_err(|e| e.to_string())?;
    let period = Duration::from_secs(settings.check_period_minutes * 60);
    let startup_delay = Duration::from_secs(settings.startup_delay_secs);
    info!(
        "watch: checking {} add-ons every {} minutes",
        settings.plugins.len(),
        settings.check_period_minutes
    );

    let (handle, mut scheduler) = Scheduler::channel();
    let _timer = scheduler::spawn_timer(handle.clone(), startup_delay, period);
    let _stdin = scheduler::spawn_stdin_trigger(handle);

    let engine = new_engine(notifier);
    let updates = spawn_status_logger();
    while let Some(trigger) = scheduler.next().await {
        info!("watch: {} pass", trigger.label());
        if let Err(err) = run_scheduled_pass(&engine, store, false, &updates).await {
            error!("watch: pass failed: {err}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_add_on_check_rejects_install_flag() {
        let err = Cli::try_parse_from(["addon-updater", "check", "--name", "tracker", "--install"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_global_quiet_after_subcommand() {
        let cli = Cli::try_parse_from(["addon-updater", "check", "--quiet"]).expect("parse");
        assert!(cli.quiet);
        assert!(matches!(cli.command, Command::Check { name: None, install: false }));
    }
}
