//! User-facing notifications
//!
//! Notifications are kept in the order they were added. Ids come from a
//! process-wide counter and are never reused.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use libredux::{create_action, handle_actions, Action, ActionCreator, FeatureModule, Reducer};
use serde::{Deserialize, Serialize};

pub const NOTIFICATION_FEATURE: &str = "notification";

pub const ADD_NOTIFICATION: &str = "ADD_NOTIFICATION";
pub const REMOVE_NOTIFICATION: &str = "REMOVE_NOTIFICATION";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Error,
    Warn,
    #[default]
    Info,
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: u64,
    pub text: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub category: Option<String>,
}

pub type NotificationState = Vec<Notification>;

/// Monotonic id source for notifications.
#[derive(Debug, Default)]
pub struct NotificationIds {
    next: AtomicU64,
}

impl NotificationIds {
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }

    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Builds an add action with a fresh id from this source.
    pub fn add_notification(
        &self,
        text: impl Into<String>,
        notification_type: NotificationType,
        category: Option<String>,
    ) -> Action {
        add_notification_action().create(Notification {
            id: self.next_id(),
            text: text.into(),
            notification_type,
            category,
        })
    }
}

static IDS: NotificationIds = NotificationIds::new();

fn add_notification_action() -> ActionCreator<Notification> {
    create_action(ADD_NOTIFICATION)
}

fn remove_notification_action() -> ActionCreator<u64> {
    create_action(REMOVE_NOTIFICATION)
}

pub fn add_notification(
    text: impl Into<String>,
    notification_type: NotificationType,
    category: Option<String>,
) -> Action {
    IDS.add_notification(text, notification_type, category)
}

pub fn remove_notification(id: u64) -> Action {
    remove_notification_action().create(id)
}

fn handle_add_notification(state: Option<&NotificationState>, action: &Action) -> NotificationState {
    let mut next = state.cloned().unwrap_or_default();
    if let Some(notification) = action.payload::<Notification>() {
        next.push(notification.clone());
    }
    next
}

fn handle_remove_notification(state: Option<Arc<NotificationState>>, action: &Action) -> Option<Arc<NotificationState>> {
    let state = state.unwrap_or_default();
    let Some(id) = action.payload::<u64>() else {
        return Some(state);
    };
    if !state.iter().any(|n| n.id == *id) {
        return Some(state);
    }
    Some(Arc::new(state.iter().filter(|n| n.id != *id).cloned().collect()))
}

pub fn notification_reducer() -> Reducer<Arc<NotificationState>> {
    handle_actions(
        [
            (ADD_NOTIFICATION, Reducer::from_update(handle_add_notification)),
            (REMOVE_NOTIFICATION, Reducer::new(handle_remove_notification)),
        ],
        Some(Arc::new(NotificationState::new())),
    )
}

pub fn create_notification_feature() -> FeatureModule {
    FeatureModule::new(NOTIFICATION_FEATURE).with_reducer(notification_reducer())
}
