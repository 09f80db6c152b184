//! Application configuration feature
//!
//! Loads the `[ui]` table of the analyzer's TOML config on request. A read
//! or parse failure is reported as an error action and the view falls back
//! to the rules administration page.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use libredux::{
    create_action, handle_actions, Action, ActionObservable, ActionStreamExt, Epic, EpicResultExt, FeatureModule,
    Reducer,
};
use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, Result};

pub const APPLICATION_FEATURE: &str = "application";

pub const REQUEST_APP_CONFIG: &str = "REQUEST_APP_CONFIG";
pub const RECEIVED_APP_CONFIG: &str = "RECEIVED_APP_CONFIG";
pub const ERROR_APP_CONFIG: &str = "ERROR_APP_CONFIG";

/// Page the analyzer opens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageSelection {
    #[default]
    RulesAdmin,
    Profiler,
    TrustDatabaseAdmin,
    AnalyzeFromAudit,
    AnalyzeSyslog,
}

/// The `[ui]` table of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default)]
    pub initial_view: Option<PageSelection>,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    ui: UiConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AppConfigState {
    pub loading: bool,
    pub initial_view: PageSelection,
    pub error: Option<String>,
}

pub fn request_app_config() -> Action {
    Action::empty(REQUEST_APP_CONFIG)
}

pub fn received_app_config(config: UiConfig) -> Action {
    create_action::<UiConfig>(RECEIVED_APP_CONFIG).create(config)
}

pub fn error_app_config(error: impl Into<String>) -> Action {
    create_action::<String>(ERROR_APP_CONFIG).create(error.into())
}

/// `<config dir>/fapolicy-analyzer/fapolicy-analyzer.toml`
pub fn default_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| FeatureError::InvalidInput("no config directory on this platform".to_string()))?;
    Ok(config_dir.join("fapolicy-analyzer").join("fapolicy-analyzer.toml"))
}

/// Reads the `[ui]` table from `path`. A file without one yields defaults.
pub async fn load_ui_config(path: &Path) -> Result<UiConfig> {
    let content = tokio::fs::read_to_string(path).await?;
    let file: ConfigFile = toml::from_str(&content)?;
    Ok(file.ui)
}

pub fn application_reducer() -> Reducer<Arc<AppConfigState>> {
    handle_actions(
        [
            (
                REQUEST_APP_CONFIG,
                Reducer::from_update(|state: Option<&AppConfigState>, _: &Action| AppConfigState {
                    loading: true,
                    error: None,
                    ..state.cloned().unwrap_or_default()
                }),
            ),
            (
                RECEIVED_APP_CONFIG,
                Reducer::from_update(|_: Option<&AppConfigState>, action: &Action| AppConfigState {
                    loading: false,
                    initial_view: action
                        .payload::<UiConfig>()
                        .and_then(|ui| ui.initial_view)
                        .unwrap_or_default(),
                    error: None,
                }),
            ),
            (
                ERROR_APP_CONFIG,
                Reducer::from_update(|state: Option<&AppConfigState>, action: &Action| AppConfigState {
                    loading: false,
                    error: action.payload::<String>().cloned(),
                    ..state.cloned().unwrap_or_default()
                }),
            ),
        ],
        Some(Arc::new(AppConfigState::default())),
    )
}

/// Answers each config request with the file's `[ui]` table or an error.
pub fn application_epic(path: PathBuf) -> Epic {
    let path = Arc::new(path);
    Epic::from_actions(move |actions: ActionObservable| {
        let path = Arc::clone(&path);
        actions
            .subscribe()
            .of_type(REQUEST_APP_CONFIG)
            .flat_map(move |_| {
                let path = Arc::clone(&path);
                tracing::debug!(path = %path.display(), "loading app config");
                stream::once(async move { load_ui_config(&path).await.map(received_app_config) }).catch_to_action(
                    |error: FeatureError| {
                        tracing::warn!(%error, "app config unavailable");
                        error_app_config(error.to_string())
                    },
                )
            })
            .boxed()
    })
}

/// Creates the application feature reading its config from `path`.
pub fn create_application_feature(path: PathBuf) -> FeatureModule {
    FeatureModule::new(APPLICATION_FEATURE)
        .with_reducer(application_reducer())
        .with_epic(application_epic(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reduce_all(actions: &[Action]) -> Arc<AppConfigState> {
        let reducer = application_reducer();
        actions
            .iter()
            .fold(None, |state, action| reducer.reduce(state, action))
            .unwrap()
    }

    #[test]
    fn test_initial_state() {
        let state = reduce_all(&[Action::new(libredux::INIT_ACTION, APPLICATION_FEATURE.to_string())]);
        assert_eq!(*state, AppConfigState::default());
        assert_eq!(state.initial_view, PageSelection::RulesAdmin);
    }

    #[test]
    fn test_request_sets_loading_and_clears_error() {
        let state = reduce_all(&[error_app_config("missing"), request_app_config()]);
        assert!(state.loading);
        assert!(state.error.is_none());
    }

    #[test]
    fn test_received_sets_view() {
        let state = reduce_all(&[
            request_app_config(),
            received_app_config(UiConfig {
                initial_view: Some(PageSelection::Profiler),
            }),
        ]);
        assert!(!state.loading);
        assert_eq!(state.initial_view, PageSelection::Profiler);
    }

    #[test]
    fn test_received_without_view_falls_back_to_rules_admin() {
        let state = reduce_all(&[
            received_app_config(UiConfig {
                initial_view: Some(PageSelection::AnalyzeSyslog),
            }),
            received_app_config(UiConfig::default()),
        ]);
        assert_eq!(state.initial_view, PageSelection::RulesAdmin);
    }

    #[test]
    fn test_error_keeps_view() {
        let state = reduce_all(&[
            received_app_config(UiConfig {
                initial_view: Some(PageSelection::Profiler),
            }),
            request_app_config(),
            error_app_config("permission denied"),
        ]);
        assert!(!state.loading);
        assert_eq!(state.error.as_deref(), Some("permission denied"));
        assert_eq!(state.initial_view, PageSelection::Profiler);
    }

    #[test]
    fn test_parse_ui_table() {
        let file: ConfigFile = toml::from_str("[ui]\ninitial_view = \"analyze_from_audit\"\n").unwrap();
        assert_eq!(file.ui.initial_view, Some(PageSelection::AnalyzeFromAudit));

        let empty: ConfigFile = toml::from_str("[other]\nkey = 1\n").unwrap();
        assert_eq!(empty.ui, UiConfig::default());
    }

    #[test]
    fn test_default_config_path() {
        if let Ok(path) = default_config_path() {
            assert!(path.ends_with("fapolicy-analyzer/fapolicy-analyzer.toml"));
        }
    }
}
