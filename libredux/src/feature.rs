//! Feature modules
//!
//! A feature module bundles a reducer and/or an epic under an id. The id is
//! also the key of the feature's branch in the root state.

use std::any::Any;
use std::sync::Arc;

use crate::epic::Epic;
use crate::reducer::Reducer;
use crate::state::StateValue;

pub use crate::action::of_init_feature;

/// A pluggable unit of state and behavior.
#[derive(Clone, Debug)]
pub struct FeatureModule {
    pub id: String,
    pub reducer: Option<Reducer<StateValue>>,
    pub epic: Option<Epic>,
    pub dependencies: Vec<FeatureModule>,
}

impl FeatureModule {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            reducer: None,
            epic: None,
            dependencies: Vec::new(),
        }
    }

    /// Sets a typed reducer for this feature's state branch.
    pub fn with_reducer<T: Any + Send + Sync>(mut self, reducer: Reducer<Arc<T>>) -> Self {
        self.reducer = Some(reducer.into_state_value());
        self
    }

    pub fn with_epic(mut self, epic: Epic) -> Self {
        self.epic = Some(epic);
        self
    }

    pub fn with_dependency(mut self, dependency: FeatureModule) -> Self {
        self.dependencies.push(dependency);
        self
    }
}

/// Constructs a feature module descriptor. No validation is done.
pub fn create_feature_module(
    identifier: impl Into<String>,
    reducer: Option<Reducer<StateValue>>,
    epic: Option<Epic>,
    dependencies: impl IntoIterator<Item = FeatureModule>,
) -> FeatureModule {
    FeatureModule {
        id: identifier.into(),
        reducer,
        epic,
        dependencies: dependencies.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::reducer::default_reducer;

    #[test]
    fn test_create_feature_module_keeps_parts() {
        let dependency = FeatureModule::new("base");
        let reducer = default_reducer(Some(Arc::new(5u8))).into_state_value();
        let module = create_feature_module("child", Some(reducer), None, [dependency]);

        assert_eq!(module.id, "child");
        assert!(module.epic.is_none());
        assert_eq!(module.dependencies.len(), 1);
        assert_eq!(module.dependencies[0].id, "base");

        let state = module.reducer.unwrap().reduce(None, &Action::empty("ANY")).unwrap();
        assert_eq!(state.downcast_ref::<u8>(), Some(&5));
    }

    #[test]
    fn test_builder_erases_reducer_type() {
        let module = FeatureModule::new("counter").with_reducer(default_reducer(Some(Arc::new(0i64))));
        let state = module.reducer.unwrap().reduce(None, &Action::empty("ANY")).unwrap();
        assert!(state.is::<i64>());
    }
}
