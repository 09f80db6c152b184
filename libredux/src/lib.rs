//! libredux - a reactive state container with pluggable feature modules
//!
//! State changes only through dispatched [`Action`]s, reduced by pure
//! [`Reducer`]s. Side effects live in [`Epic`]s, which turn the action
//! stream into new actions. Features bundle both and can be added to a
//! running [`Store`] at any time.

pub mod action;
pub mod config;
pub mod epic;
pub mod error;
pub mod feature;
pub mod logging;
pub mod reducer;
pub mod selectors;
pub mod state;
pub mod store;
pub mod subject;

// Re-export commonly used types
pub use action::{
    create_action, has_payload, is_type, of_init_feature, of_type, select_action_payload, select_action_type, Action,
    ActionCreator, ActionStream, ActionStreamExt, Payload, INIT_ACTION,
};
pub use config::StoreConfig;
pub use epic::{combine_epics, normalize_epic, run_epic, ActionObservable, Epic, EpicFn, EpicResultExt, StateObservable};
pub use error::{ConfigError, ReduxError, Result, StoreError};
pub use feature::{create_feature_module, FeatureModule};
pub use reducer::{combine_reducers, default_reducer, handle_actions, Reducer};
pub use selectors::{select, select_feature, Selection};
pub use state::{Identity, RootState, StateTree, StateValue};
pub use store::{create_store, create_store_with_config, Store};
pub use subject::{Observable, Subject};
