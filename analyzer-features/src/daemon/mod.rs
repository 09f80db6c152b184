//! fapolicyd daemon feature
//!
//! Tracks whether the fapolicyd service is installed and running, and turns
//! start / stop / status requests into calls on a [`ServiceControl`].
//! Every request is answered with either a received or an error action.

use std::future::Future;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use libredux::{
    combine_epics, create_action, handle_actions, Action, ActionObservable, ActionStreamExt, Epic, EpicResultExt,
    FeatureModule, Reducer,
};
use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, Result};

pub mod mock;
pub mod service;

pub use mock::{MockService, MockServiceConfig};
pub use service::{ServiceControl, ServiceStatus};

pub const DAEMON_FEATURE: &str = "daemon";

pub const DAEMON_NOT_INSTALLED: &str = "The fapolicyd service is not installed";

pub const INIT_DAEMON: &str = "INIT_DAEMON";
pub const REQUEST_DAEMON_START: &str = "REQUEST_DAEMON_START";
pub const RECEIVED_DAEMON_START: &str = "RECEIVED_DAEMON_START";
pub const ERROR_DAEMON_START: &str = "ERROR_DAEMON_START";
pub const REQUEST_DAEMON_STOP: &str = "REQUEST_DAEMON_STOP";
pub const RECEIVED_DAEMON_STOP: &str = "RECEIVED_DAEMON_STOP";
pub const ERROR_DAEMON_STOP: &str = "ERROR_DAEMON_STOP";
pub const REQUEST_DAEMON_STATUS_UPDATE: &str = "REQUEST_DAEMON_STATUS_UPDATE";
pub const RECEIVED_DAEMON_STATUS_UPDATE: &str = "RECEIVED_DAEMON_STATUS_UPDATE";
pub const ERROR_DAEMON_STATUS_UPDATE: &str = "ERROR_DAEMON_STATUS_UPDATE";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DaemonState {
    pub status: ServiceStatus,
    pub error: Option<String>,
}

impl DaemonState {
    pub fn not_installed() -> Self {
        Self {
            status: ServiceStatus::Unknown,
            error: Some(DAEMON_NOT_INSTALLED.to_string()),
        }
    }
}

pub fn init_daemon() -> Action {
    Action::empty(INIT_DAEMON)
}

pub fn request_daemon_start() -> Action {
    Action::empty(REQUEST_DAEMON_START)
}

pub fn received_daemon_start(status: ServiceStatus) -> Action {
    create_action::<ServiceStatus>(RECEIVED_DAEMON_START).create(status)
}

pub fn error_daemon_start(error: impl Into<String>) -> Action {
    create_action::<String>(ERROR_DAEMON_START).create(error.into())
}

pub fn request_daemon_stop() -> Action {
    Action::empty(REQUEST_DAEMON_STOP)
}

pub fn received_daemon_stop(status: ServiceStatus) -> Action {
    create_action::<ServiceStatus>(RECEIVED_DAEMON_STOP).create(status)
}

pub fn error_daemon_stop(error: impl Into<String>) -> Action {
    create_action::<String>(ERROR_DAEMON_STOP).create(error.into())
}

pub fn request_daemon_status_update() -> Action {
    Action::empty(REQUEST_DAEMON_STATUS_UPDATE)
}

pub fn received_daemon_status_update(state: DaemonState) -> Action {
    create_action::<DaemonState>(RECEIVED_DAEMON_STATUS_UPDATE).create(state)
}

pub fn error_daemon_status_update(state: DaemonState) -> Action {
    create_action::<DaemonState>(ERROR_DAEMON_STATUS_UPDATE).create(state)
}

fn update<F>(apply: F) -> Reducer<Arc<DaemonState>>
where
    F: Fn(&mut DaemonState, &Action) + Send + Sync + 'static,
{
    Reducer::from_update(move |state: Option<&DaemonState>, action: &Action| {
        let mut next = state.cloned().unwrap_or_default();
        apply(&mut next, action);
        tracing::debug!(action = action.action_type(), state = ?next, "daemon state updated");
        next
    })
}

fn set_status(state: &mut DaemonState, action: &Action) {
    if let Some(status) = action.payload::<ServiceStatus>() {
        state.status = *status;
        state.error = None;
    }
}

fn set_error(state: &mut DaemonState, action: &Action) {
    if let Some(error) = action.payload::<String>() {
        state.error = Some(error.clone());
    }
}

fn replace(state: &mut DaemonState, action: &Action) {
    if let Some(payload) = action.payload::<DaemonState>() {
        *state = payload.clone();
    }
}

pub fn daemon_reducer() -> Reducer<Arc<DaemonState>> {
    handle_actions(
        [
            (RECEIVED_DAEMON_START, update(set_status)),
            (RECEIVED_DAEMON_STOP, update(set_status)),
            (ERROR_DAEMON_START, update(set_error)),
            (ERROR_DAEMON_STOP, update(set_error)),
            (RECEIVED_DAEMON_STATUS_UPDATE, update(replace)),
            (ERROR_DAEMON_STATUS_UPDATE, update(replace)),
        ],
        Some(Arc::new(DaemonState::default())),
    )
}

/// Service handle shared by the daemon epics.
pub type SharedService = Arc<dyn ServiceControl>;

async fn query_status(service: SharedService) -> Action {
    if !service.is_valid().await {
        tracing::debug!("fapolicyd is not installed");
        return error_daemon_status_update(DaemonState::not_installed());
    }

    match service.is_active().await {
        Ok(active) => received_daemon_status_update(DaemonState {
            status: active.into(),
            error: None,
        }),
        Err(error) => error_daemon_status_update(DaemonState {
            status: ServiceStatus::Unknown,
            error: Some(error.to_string()),
        }),
    }
}

async fn start_service(service: SharedService) -> Result<Action> {
    if !service.is_valid().await {
        return Err(FeatureError::NotInstalled);
    }
    service.start().await?;
    let active = service.is_active().await?;
    Ok(received_daemon_start(active.into()))
}

async fn stop_service(service: SharedService) -> Result<Action> {
    if !service.is_valid().await {
        return Err(FeatureError::NotInstalled);
    }
    service.stop().await?;
    let active = service.is_active().await?;
    Ok(received_daemon_stop(active.into()))
}

/// On feature init: report the service status, then announce the feature.
fn init_epic(service: SharedService) -> Epic {
    Epic::from_actions(move |actions: ActionObservable| {
        let service = Arc::clone(&service);
        actions
            .subscribe()
            .of_init_feature(DAEMON_FEATURE)
            .then(move |_| query_status(Arc::clone(&service)))
            .flat_map(|status| stream::iter([status, init_daemon()]))
            .boxed()
    })
}

fn status_epic(service: SharedService) -> Epic {
    Epic::from_actions(move |actions: ActionObservable| {
        let service = Arc::clone(&service);
        actions
            .subscribe()
            .of_type(REQUEST_DAEMON_STATUS_UPDATE)
            .then(move |_| query_status(Arc::clone(&service)))
            .boxed()
    })
}

/// Serves one request type. A failed call becomes `on_error`'s action; later
/// requests are still served.
fn request_epic<F, Fut>(service: SharedService, request: &'static str, call: F, on_error: fn(String) -> Action) -> Epic
where
    F: Fn(SharedService) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<Action>> + Send + 'static,
{
    Epic::from_actions(move |actions: ActionObservable| {
        let service = Arc::clone(&service);
        let call = call.clone();
        actions
            .subscribe()
            .of_type(request)
            .flat_map(move |_| {
                tracing::debug!(request, "calling fapolicyd");
                stream::once(call(Arc::clone(&service))).catch_to_action(move |error: FeatureError| {
                    tracing::warn!(request, %error, "fapolicyd request failed");
                    on_error(error.to_string())
                })
            })
            .boxed()
    })
}

pub fn daemon_epic(service: SharedService) -> Epic {
    combine_epics([
        init_epic(Arc::clone(&service)),
        request_epic(Arc::clone(&service), REQUEST_DAEMON_START, start_service, |e| error_daemon_start(e)),
        request_epic(Arc::clone(&service), REQUEST_DAEMON_STOP, stop_service, |e| error_daemon_stop(e)),
        status_epic(service),
    ])
}

/// Creates the daemon feature backed by `service`.
pub fn create_daemon_feature(service: SharedService) -> FeatureModule {
    FeatureModule::new(DAEMON_FEATURE)
        .with_reducer(daemon_reducer())
        .with_epic(daemon_epic(service))
}
