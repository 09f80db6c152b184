//! Reducers and reducer combinators
//!
//! A reducer is a pure function `(state, action) -> state`. Absent state is
//! modelled as `None`. When a reducer has nothing to do it must return the
//! state it was given (the same `Arc`), because [`combine_reducers`] uses
//! pointer identity to decide which branches of the tree changed.

use std::any::Any;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::action::Action;
use crate::state::{RootState, StateTree, StateValue};

type ReduceFn<S> = dyn Fn(Option<S>, &Action) -> Option<S> + Send + Sync;

/// A composable, cloneable reducer over state handles of type `S`.
pub struct Reducer<S> {
    reduce: Arc<ReduceFn<S>>,
}

impl<S> Clone for Reducer<S> {
    fn clone(&self) -> Self {
        Self {
            reduce: Arc::clone(&self.reduce),
        }
    }
}

impl<S> fmt::Debug for Reducer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Reducer")
    }
}

impl<S: 'static> Reducer<S> {
    pub fn new<F>(reduce: F) -> Self
    where
        F: Fn(Option<S>, &Action) -> Option<S> + Send + Sync + 'static,
    {
        Self {
            reduce: Arc::new(reduce),
        }
    }

    pub fn reduce(&self, state: Option<S>, action: &Action) -> Option<S> {
        (self.reduce)(state, action)
    }
}

impl<T: Any + Send + Sync> Reducer<Arc<T>> {
    /// Builds a per-action arm from a function producing the next state value.
    ///
    /// Only use this for arms that always change state; the result is a new
    /// allocation every time.
    pub fn from_update<F>(update: F) -> Self
    where
        F: Fn(Option<&T>, &Action) -> T + Send + Sync + 'static,
    {
        Self::new(move |state: Option<Arc<T>>, action: &Action| {
            Some(Arc::new(update(state.as_deref(), action)))
        })
    }

    /// Erases the state type so the reducer can be combined with others.
    pub fn into_state_value(self) -> Reducer<StateValue> {
        Reducer::new(move |state: Option<StateValue>, action: &Action| {
            let typed = state.and_then(|value| {
                let typed = value.downcast::<T>();
                if typed.is_none() {
                    tracing::warn!(
                        expected = std::any::type_name::<T>(),
                        "state has unexpected type, treating it as absent"
                    );
                }
                typed
            });
            self.reduce(typed, action).map(StateValue::from_arc)
        })
    }
}

impl<T: Any + Send + Sync> From<Reducer<Arc<T>>> for Reducer<StateValue> {
    fn from(reducer: Reducer<Arc<T>>) -> Self {
        reducer.into_state_value()
    }
}

/// Returns the incoming state, or `initial_state` when there is none.
pub fn default_reducer<S>(initial_state: Option<S>) -> Reducer<S>
where
    S: Clone + Send + Sync + 'static,
{
    Reducer::new(move |state: Option<S>, _: &Action| state.or_else(|| initial_state.clone()))
}

/// Dispatches on the action type; unmatched actions fall through to
/// [`default_reducer`] with `initial_state`.
pub fn handle_actions<S, K, I>(action_map: I, initial_state: Option<S>) -> Reducer<S>
where
    S: Clone + Send + Sync + 'static,
    K: Into<Cow<'static, str>>,
    I: IntoIterator<Item = (K, Reducer<S>)>,
{
    let table: HashMap<Cow<'static, str>, Reducer<S>> = action_map
        .into_iter()
        .map(|(key, reducer)| (key.into(), reducer))
        .collect();
    let fallback = default_reducer(initial_state);

    Reducer::new(move |state: Option<S>, action: &Action| {
        table
            .get(action.action_type())
            .unwrap_or(&fallback)
            .reduce(state, action)
    })
}

/// Combines per-key reducers into a reducer over the whole tree.
///
/// Each sub-reducer sees only its own branch. The outer tree is copied at
/// most once per action, and only if some branch came back as a different
/// allocation; untouched branches keep their identity.
pub fn combine_reducers<K, I>(reducers: I) -> Reducer<RootState>
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Reducer<StateValue>)>,
{
    let items: Vec<(String, Reducer<StateValue>)> = reducers
        .into_iter()
        .map(|(key, reducer)| (key.into(), reducer))
        .collect();

    Reducer::new(move |state: Option<RootState>, action: &Action| {
        let mut result = state.unwrap_or_default();
        let mut copied = false;

        for (key, reducer) in &items {
            let current = result.get(key).cloned();
            let updated = reducer.reduce(current.clone(), action);

            let unchanged = match (&current, &updated) {
                (Some(before), Some(after)) => before.ptr_eq(after),
                (None, None) => true,
                _ => false,
            };
            if unchanged {
                continue;
            }

            if !copied {
                result = Arc::new(StateTree::clone(&result));
                copied = true;
            }
            let tree = Arc::make_mut(&mut result);
            match updated {
                Some(value) => tree.insert(key.clone(), value),
                None => tree.remove(key),
            }
        }

        Some(result)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::create_action;

    fn counter() -> Reducer<Arc<i64>> {
        handle_actions(
            [
                ("INCREMENT", Reducer::from_update(|state: Option<&i64>, _: &Action| state.copied().unwrap_or(0) + 1)),
                ("DECREMENT", Reducer::from_update(|state: Option<&i64>, _: &Action| state.copied().unwrap_or(0) - 1)),
            ],
            Some(Arc::new(0)),
        )
    }

    #[test]
    fn test_default_reducer_keeps_state() {
        let reducer = default_reducer(Some(Arc::new(5)));
        let state = Arc::new(9);

        let result = reducer.reduce(Some(Arc::clone(&state)), &Action::empty("any")).unwrap();
        assert!(Arc::ptr_eq(&state, &result));
    }

    #[test]
    fn test_default_reducer_falls_back_to_initial() {
        let reducer = default_reducer(Some(Arc::new(5)));
        assert_eq!(reducer.reduce(None, &Action::empty("any")).as_deref(), Some(&5));

        let no_initial: Reducer<Arc<i32>> = default_reducer(None);
        assert!(no_initial.reduce(None, &Action::empty("any")).is_none());
    }

    #[test]
    fn test_handle_actions_dispatches_on_type() {
        let reducer = counter();
        let one = reducer.reduce(None, &Action::empty("INCREMENT"));
        assert_eq!(one.as_deref(), Some(&1));

        let zero = reducer.reduce(one, &Action::empty("DECREMENT"));
        assert_eq!(zero.as_deref(), Some(&0));
    }

    #[test]
    fn test_handle_actions_fallback_matches_default_reducer() {
        let reducer = counter();
        let fallback = default_reducer(Some(Arc::new(0i64)));
        let action = Action::empty("UNRELATED");
        let state = Arc::new(42i64);

        let via_table = reducer.reduce(Some(Arc::clone(&state)), &action).unwrap();
        let via_default = fallback.reduce(Some(Arc::clone(&state)), &action).unwrap();
        assert!(Arc::ptr_eq(&via_table, &via_default));

        assert_eq!(reducer.reduce(None, &action).as_deref(), Some(&0));
    }

    #[test]
    fn test_handle_actions_accepts_creator_types() {
        let set_name = create_action::<String>("SET_NAME");
        let reducer: Reducer<Arc<String>> = handle_actions(
            [(
                set_name.action_type().to_string(),
                Reducer::from_update(|_: Option<&String>, action: &Action| {
                    action.payload::<String>().cloned().unwrap_or_default()
                }),
            )],
            None,
        );

        let state = reducer.reduce(None, &set_name.create("fapolicyd".to_string()));
        assert_eq!(state.as_deref().map(String::as_str), Some("fapolicyd"));
    }

    #[test]
    fn test_combine_reducers_shares_untouched_branches() {
        let reducer = combine_reducers([
            ("counter", counter().into_state_value()),
            ("other", default_reducer(Some(StateValue::new("static".to_string())))),
        ]);

        let initial = reducer.reduce(None, &Action::empty("@@redux/INIT")).unwrap();
        let other_before = initial.get("other").unwrap().clone();

        let next = reducer.reduce(Some(Arc::clone(&initial)), &Action::empty("INCREMENT")).unwrap();
        assert!(!Arc::ptr_eq(&initial, &next));
        assert!(next.get("other").unwrap().ptr_eq(&other_before));
        assert_eq!(next.get_as::<i64>("counter").as_deref(), Some(&1));

        // original snapshot is untouched
        assert_eq!(initial.get_as::<i64>("counter").as_deref(), Some(&0));
    }

    #[test]
    fn test_combine_reducers_returns_same_tree_when_nothing_changes() {
        let reducer = combine_reducers([("counter", counter().into_state_value())]);
        let initial = reducer.reduce(None, &Action::empty("INIT")).unwrap();

        let after = reducer.reduce(Some(Arc::clone(&initial)), &Action::empty("NOOP")).unwrap();
        assert!(Arc::ptr_eq(&initial, &after));
    }

    #[test]
    fn test_combine_reducers_removes_branch_on_none() {
        let reducer = combine_reducers([(
            "volatile",
            Reducer::new(|state: Option<StateValue>, action: &Action| {
                if action.is_type("CLEAR") {
                    None
                } else {
                    state.or_else(|| Some(StateValue::new(1u8)))
                }
            }),
        )]);

        let filled = reducer.reduce(None, &Action::empty("INIT")).unwrap();
        assert!(filled.contains("volatile"));

        let cleared = reducer.reduce(Some(filled), &Action::empty("CLEAR")).unwrap();
        assert!(!cleared.contains("volatile"));
    }

    #[test]
    fn test_combine_reducers_nests() {
        let inner = combine_reducers([("counter", counter().into_state_value())]);
        let outer = combine_reducers([("app", inner.into_state_value())]);

        let state = outer.reduce(None, &Action::empty("INCREMENT")).unwrap();
        let app = state.get_as::<StateTree>("app").unwrap();
        assert_eq!(app.get_as::<i64>("counter").as_deref(), Some(&1));
    }
}
