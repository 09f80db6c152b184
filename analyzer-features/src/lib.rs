//! Features of the fapolicy analyzer, built on libredux
//!
//! Each feature exposes a `create_*_feature` constructor returning a
//! [`libredux::FeatureModule`], plus its action creators and state types.

pub mod application;
pub mod daemon;
pub mod error;
pub mod notifications;

pub use application::{
    create_application_feature, default_config_path, AppConfigState, PageSelection, UiConfig, APPLICATION_FEATURE,
};
pub use daemon::{create_daemon_feature, DaemonState, MockService, ServiceControl, ServiceStatus, DAEMON_FEATURE};
pub use error::{FeatureError, Result};
pub use notifications::{
    add_notification, create_notification_feature, remove_notification, Notification, NotificationType,
    NOTIFICATION_FEATURE,
};
