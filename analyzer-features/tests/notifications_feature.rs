//! Integration tests for the notification feature

use std::sync::Arc;

use libredux::{create_store, select_feature, Store};

use analyzer_features::notifications::{NotificationIds, NotificationState};
use analyzer_features::{
    add_notification, create_daemon_feature, create_notification_feature, remove_notification, MockService,
    NotificationType, NOTIFICATION_FEATURE,
};

fn notifications(store: &Store) -> Arc<NotificationState> {
    select_feature::<NotificationState>(NOTIFICATION_FEATURE, None)(&store.state()).unwrap()
}

#[test]
fn test_starts_empty() {
    let store = create_store();
    store.add_feature_module(create_notification_feature()).unwrap();
    assert!(notifications(&store).is_empty());
}

#[test]
fn test_add_then_remove() {
    let store = create_store();
    store.add_feature_module(create_notification_feature()).unwrap();

    store
        .dispatch(add_notification("Deployed", NotificationType::Success, None))
        .unwrap();
    store
        .dispatch(add_notification(
            "Rules changed",
            NotificationType::Warn,
            Some("rules".to_string()),
        ))
        .unwrap();

    let current = notifications(&store);
    assert_eq!(current.len(), 2);
    assert!(current[0].id < current[1].id);
    assert_eq!(current[1].category.as_deref(), Some("rules"));

    store.dispatch(remove_notification(current[0].id)).unwrap();
    let remaining = notifications(&store);
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].text, "Rules changed");
}

#[test]
fn test_private_id_source() {
    let store = create_store();
    store.add_feature_module(create_notification_feature()).unwrap();

    let ids = NotificationIds::new();
    store
        .dispatch(ids.add_notification("first", NotificationType::Info, None))
        .unwrap();
    store
        .dispatch(ids.add_notification("second", NotificationType::Error, None))
        .unwrap();

    let ids: Vec<u64> = notifications(&store).iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![0, 1]);
}

#[tokio::test]
async fn test_registered_once_as_shared_dependency() {
    let store = create_store();
    store.add_feature_module(create_notification_feature()).unwrap();
    store
        .dispatch(add_notification("kept", NotificationType::Info, None))
        .unwrap();

    let daemon = create_daemon_feature(Arc::new(MockService::running()))
        .with_dependency(create_notification_feature());
    store.add_feature_module(daemon).unwrap();

    assert_eq!(store.feature_ids(), vec!["notification", "daemon"]);
    assert_eq!(notifications(&store).len(), 1);
}
