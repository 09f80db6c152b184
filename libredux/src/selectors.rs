//! Selectors over the state stream

use std::any::Any;
use std::sync::{Arc, Mutex};

use futures::stream::BoxStream;

use crate::state::{Identity, RootState};
use crate::subject::{Listener, Observable, Subject};

const SELECTION_BACKLOG_WARNING: usize = 256;

/// Projects one feature's state out of the root state, falling back to
/// `initial_state` when the feature is not registered.
pub fn select_feature<T>(
    identifier: impl Into<String>,
    initial_state: Option<Arc<T>>,
) -> impl Fn(&RootState) -> Option<Arc<T>> + Clone + Send + Sync + 'static
where
    T: Any + Send + Sync,
{
    let identifier = identifier.into();
    move |state: &RootState| state.get_as::<T>(&identifier).or_else(|| initial_state.clone())
}

/// Operator form of [`Observable::select`].
pub fn select<S, T, F>(selector: F) -> impl FnOnce(&Observable<S>) -> Selection<T>
where
    S: Clone + Send + Sync + 'static,
    T: Identity + Clone + Send + Sync + 'static,
    F: Fn(&S) -> T + Send + Sync + 'static,
{
    move |source: &Observable<S>| source.select(selector)
}

/// A shared, deduplicated projection of a source.
///
/// The selector runs once per source emission, whatever the number of
/// subscribers. Consecutive results that are the same allocation are
/// suppressed. Subscribers get the current value first. Once every handle is
/// dropped the projection detaches from its source.
pub struct Selection<T> {
    output: Subject<T>,
    _upstream: Arc<dyn Any + Send + Sync>,
}

impl<T> Clone for Selection<T> {
    fn clone(&self) -> Self {
        Self {
            output: self.output.clone(),
            _upstream: Arc::clone(&self._upstream),
        }
    }
}

impl<T: Clone + Send + 'static> Selection<T> {
    pub fn subscribe(&self) -> BoxStream<'static, T> {
        self.output.subscribe()
    }

    /// Current projected value.
    pub fn latest(&self) -> Option<T> {
        self.output.latest()
    }
}

struct SelectNode<S, T> {
    selector: Box<dyn Fn(&S) -> T + Send + Sync>,
    last: Mutex<Option<T>>,
    output: Subject<T>,
}

impl<S, T> Listener<S> for SelectNode<S, T>
where
    S: 'static,
    T: Identity + Clone + Send + Sync + 'static,
{
    fn on_next(&self, value: &S) {
        let selected = (self.selector)(value);
        let mut last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if last.as_ref().is_some_and(|previous| previous.same(&selected)) {
            return;
        }
        *last = Some(selected.clone());
        self.output.next(selected);
    }

    fn on_completed(&self) {
        self.output.complete();
    }
}

impl<S: Clone + Send + Sync + 'static> Observable<S> {
    /// Maps every emission through `selector`, drops repeats by identity and
    /// multicasts the result, replaying the latest value.
    pub fn select<T, F>(&self, selector: F) -> Selection<T>
    where
        T: Identity + Clone + Send + Sync + 'static,
        F: Fn(&S) -> T + Send + Sync + 'static,
    {
        let output = Subject::replay_empty(SELECTION_BACKLOG_WARNING);
        let node = Arc::new(SelectNode {
            selector: Box::new(selector),
            last: Mutex::new(None),
            output: output.clone(),
        });

        if !self.subject().add_listener(Arc::clone(&node) as Arc<dyn Listener<S>>) {
            output.complete();
        }

        Selection {
            output,
            _upstream: node,
        }
    }
}
