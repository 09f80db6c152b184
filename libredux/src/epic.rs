//! Epics: asynchronous side effects as action stream transformers
//!
//! An epic receives the action source and the state source and returns a
//! stream of new actions, which the store dispatches back into itself.
//! Epics are combined by merging, so each keeps its own emission order but
//! there is no ordering between different epics.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future;
use futures::stream::{self, Stream, StreamExt};

use crate::action::{Action, ActionStream};
use crate::state::RootState;
use crate::subject::Observable;

/// Action source handed to epics.
pub type ActionObservable = Observable<Action>;

/// State source handed to epics.
pub type StateObservable = Observable<RootState>;

type ActionsFn = dyn Fn(ActionObservable) -> ActionStream + Send + Sync;
type ActionsAndStateFn = dyn Fn(ActionObservable, StateObservable) -> ActionStream + Send + Sync;

/// The two shapes an epic may be written in.
#[derive(Clone)]
pub enum EpicFn {
    /// Ignores state.
    Actions(Arc<ActionsFn>),
    ActionsAndState(Arc<ActionsAndStateFn>),
}

impl fmt::Debug for EpicFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EpicFn::Actions(_) => f.write_str("EpicFn::Actions"),
            EpicFn::ActionsAndState(_) => f.write_str("EpicFn::ActionsAndState"),
        }
    }
}

/// An epic in canonical two-argument form.
#[derive(Clone)]
pub struct Epic {
    run: Arc<ActionsAndStateFn>,
}

impl fmt::Debug for Epic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Epic")
    }
}

impl Epic {
    pub fn new<F>(epic: F) -> Self
    where
        F: Fn(ActionObservable, StateObservable) -> ActionStream + Send + Sync + 'static,
    {
        normalize_epic(EpicFn::ActionsAndState(Arc::new(epic)))
    }

    /// An epic that only looks at actions.
    pub fn from_actions<F>(epic: F) -> Self
    where
        F: Fn(ActionObservable) -> ActionStream + Send + Sync + 'static,
    {
        normalize_epic(EpicFn::Actions(Arc::new(epic)))
    }

    /// Subscribes the epic to the given sources. Subscriptions the epic makes
    /// inside this call are live before it returns.
    pub fn run(&self, actions: ActionObservable, states: StateObservable) -> ActionStream {
        (self.run)(actions, states)
    }
}

/// Brings either epic shape to the canonical two-argument form.
pub fn normalize_epic(epic: EpicFn) -> Epic {
    match epic {
        EpicFn::ActionsAndState(run) => Epic { run },
        EpicFn::Actions(run) => Epic {
            run: Arc::new(move |actions: ActionObservable, _: StateObservable| run(actions)),
        },
    }
}

/// Binds epics to live sources.
pub fn run_epic(actions: ActionObservable, states: StateObservable) -> impl Fn(&Epic) -> ActionStream {
    move |epic: &Epic| epic.run(actions.clone(), states.clone())
}

/// Merges epics into one. Every epic subscribes independently; outputs are
/// interleaved as they arrive.
///
/// A panic inside one epic's stream ends that stream only and is logged;
/// the others keep running.
pub fn combine_epics<I>(epics: I) -> Epic
where
    I: IntoIterator<Item = Epic>,
{
    let epics: Arc<[Epic]> = epics.into_iter().collect();

    Epic::new(move |actions: ActionObservable, states: StateObservable| {
        let run = run_epic(actions, states);
        let streams: Vec<ActionStream> = epics
            .iter()
            .enumerate()
            .map(|(index, epic)| isolate(index, run(epic)))
            .collect();

        if streams.is_empty() {
            return stream::empty().boxed();
        }
        stream::select_all(streams).boxed()
    })
}

fn isolate(index: usize, actions: ActionStream) -> ActionStream {
    AssertUnwindSafe(actions)
        .catch_unwind()
        .take_while(move |item| {
            if item.is_err() {
                tracing::error!(epic = index, "epic panicked, its stream is closed");
            }
            future::ready(item.is_ok())
        })
        .filter_map(|item| future::ready(item.ok()))
        .boxed()
}

/// Converts fallible epic output into actions.
///
/// Operational failures become a dedicated error action instead of ending
/// the epic silently. The stream stops after the first error, like a
/// `catch` that substitutes a single value.
pub trait EpicResultExt<E>: Stream<Item = Result<Action, E>> + Sized + Send + 'static {
    fn catch_to_action<F>(self, on_error: F) -> ActionStream
    where
        F: Fn(E) -> Action + Send + Sync + 'static,
        E: Send + 'static,
    {
        self.scan(false, move |failed, item| {
            if *failed {
                return future::ready(None);
            }
            let action = match item {
                Ok(action) => action,
                Err(error) => {
                    *failed = true;
                    on_error(error)
                }
            };
            future::ready(Some(action))
        })
        .boxed()
    }
}

impl<S, E> EpicResultExt<E> for S where S: Stream<Item = Result<Action, E>> + Sized + Send + 'static {}
