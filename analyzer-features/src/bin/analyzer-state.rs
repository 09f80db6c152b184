//! analyzer-state - drive the analyzer store from the command line
//!
//! Boots a store with the notification, daemon and application features over
//! a mock fapolicyd, runs the given commands in order and prints the
//! resulting feature states as JSON.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::{Parser, ValueEnum};
use futures::stream::BoxStream;
use futures::StreamExt;
use libredux::logging::LogFormat;
use libredux::{create_store_with_config, select_feature, Action, Store, StoreConfig};

use analyzer_features::application::{self, request_app_config, AppConfigState};
use analyzer_features::daemon::{
    self, request_daemon_start, request_daemon_status_update, request_daemon_stop, DaemonState, MockService,
};
use analyzer_features::notifications::{self, Notification, NotificationState, NotificationType};
use analyzer_features::{
    create_application_feature, create_daemon_feature, create_notification_feature, default_config_path, FeatureError,
};

const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "analyzer-state")]
#[command(about = "Run commands against the fapolicy analyzer store", long_about = None)]
struct Cli {
    /// Commands to run in order: start, stop, status, config or notify:<text>
    commands: Vec<Command>,

    /// Path to the store configuration file
    #[arg(short, long, env = "REDUX_CONFIG")]
    config: Option<PathBuf>,

    /// Path to the analyzer's UI configuration file
    #[arg(long)]
    ui_config: Option<PathBuf>,

    /// Log format (text, json or pretty); overrides the config file
    #[arg(long)]
    log_format: Option<LogFormat>,

    /// Initial state of the simulated fapolicyd
    #[arg(long, value_enum, default_value_t = MockState::Stopped)]
    service: MockState,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MockState {
    Running,
    Stopped,
    Missing,
}

impl MockState {
    fn service(self) -> MockService {
        match self {
            MockState::Running => MockService::running(),
            MockState::Stopped => MockService::stopped(),
            MockState::Missing => MockService::not_installed(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Start,
    Stop,
    Status,
    Config,
    Notify(String),
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(text) = s.strip_prefix("notify:") {
            return Ok(Command::Notify(text.to_string()));
        }
        match s {
            "start" => Ok(Command::Start),
            "stop" => Ok(Command::Stop),
            "status" => Ok(Command::Status),
            "config" => Ok(Command::Config),
            _ => Err(format!(
                "Invalid command: '{}'. Valid options: start, stop, status, config, notify:<text>",
                s
            )),
        }
    }
}

impl Command {
    /// The action to dispatch and the action types that answer it.
    fn action(&self) -> (Action, &'static [&'static str]) {
        match self {
            Command::Start => (
                request_daemon_start(),
                &[daemon::RECEIVED_DAEMON_START, daemon::ERROR_DAEMON_START],
            ),
            Command::Stop => (
                request_daemon_stop(),
                &[daemon::RECEIVED_DAEMON_STOP, daemon::ERROR_DAEMON_STOP],
            ),
            Command::Status => (
                request_daemon_status_update(),
                &[
                    daemon::RECEIVED_DAEMON_STATUS_UPDATE,
                    daemon::ERROR_DAEMON_STATUS_UPDATE,
                ],
            ),
            Command::Config => (
                request_app_config(),
                &[application::RECEIVED_APP_CONFIG, application::ERROR_APP_CONFIG],
            ),
            Command::Notify(text) => (
                notifications::add_notification(text.clone(), NotificationType::Info, None),
                &[],
            ),
        }
    }
}

#[derive(serde::Serialize)]
struct Snapshot {
    notification: Vec<Notification>,
    daemon: DaemonState,
    application: AppConfigState,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        let code = e.downcast_ref::<FeatureError>().map_or(1, FeatureError::exit_code);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => StoreConfig::load_from_path(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => StoreConfig::load()?,
    };

    let mut logging = config.logging_config(cli.verbose)?;
    if let Some(format) = cli.log_format {
        logging.format = format;
    }
    logging.init();

    let store = create_store_with_config(&config);
    let mut actions = store.actions().subscribe();

    let daemon_feature =
        create_daemon_feature(Arc::new(cli.service.service())).with_dependency(create_notification_feature());
    store.add_feature_module(daemon_feature)?;
    wait_for(&mut actions, &[daemon::INIT_DAEMON]).await?;

    let ui_config = match cli.ui_config {
        Some(path) => path,
        None => default_config_path()?,
    };
    store.add_feature_module(create_application_feature(ui_config))?;

    for command in &cli.commands {
        tracing::info!(?command, "running command");
        let (action, answers) = command.action();
        store.dispatch(action)?;
        if !answers.is_empty() {
            wait_for(&mut actions, answers).await?;
        }
    }

    let snapshot = snapshot(&store)?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    store.on_completed();
    Ok(())
}

/// Consumes actions until one of `types` shows up.
async fn wait_for(actions: &mut BoxStream<'static, Action>, types: &[&str]) -> anyhow::Result<()> {
    let found = tokio::time::timeout(SETTLE_TIMEOUT, async {
        while let Some(action) = actions.next().await {
            if types.contains(&action.action_type()) {
                return Some(action);
            }
        }
        None
    })
    .await
    .with_context(|| format!("timed out waiting for {}", types.join(" or ")))?;

    let action = found.ok_or_else(|| anyhow!("store closed while waiting for {}", types.join(" or ")))?;
    tracing::debug!(action = action.action_type(), "settled");
    Ok(())
}

fn snapshot(store: &Store) -> anyhow::Result<Snapshot> {
    let state = store.state();
    let notification = select_feature::<NotificationState>(notifications::NOTIFICATION_FEATURE, None)(&state)
        .ok_or_else(|| anyhow!("notification feature missing"))?;
    let daemon = select_feature::<DaemonState>(daemon::DAEMON_FEATURE, None)(&state)
        .ok_or_else(|| anyhow!("daemon feature missing"))?;
    let application = select_feature::<AppConfigState>(application::APPLICATION_FEATURE, None)(&state)
        .ok_or_else(|| anyhow!("application feature missing"))?;

    Ok(Snapshot {
        notification: notification.as_ref().clone(),
        daemon: daemon.as_ref().clone(),
        application: application.as_ref().clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!("start".parse::<Command>().unwrap(), Command::Start);
        assert_eq!("stop".parse::<Command>().unwrap(), Command::Stop);
        assert_eq!("status".parse::<Command>().unwrap(), Command::Status);
        assert_eq!("config".parse::<Command>().unwrap(), Command::Config);
        assert_eq!(
            "notify:policy deployed".parse::<Command>().unwrap(),
            Command::Notify("policy deployed".to_string())
        );
    }

    #[test]
    fn test_parse_invalid_command() {
        let error = "restart".parse::<Command>().unwrap_err();
        assert!(error.contains("Invalid command: 'restart'"));
    }

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::try_parse_from([
            "analyzer-state",
            "--service",
            "missing",
            "--log-format",
            "json",
            "--ui-config",
            "/tmp/analyzer.toml",
            "status",
        ])
        .unwrap();
        assert_eq!(cli.service, MockState::Missing);
        assert_eq!(cli.ui_config, Some(PathBuf::from("/tmp/analyzer.toml")));
        assert_eq!(cli.log_format, Some(LogFormat::Json));
        assert_eq!(cli.commands, vec![Command::Status]);
    }
}
