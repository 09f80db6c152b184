//! The root store
//!
//! The store owns the root state, the action and state subjects, and the
//! registry of feature modules. `dispatch` is synchronous: the calling
//! thread reduces the action, publishes the new state and then the action.
//! Epics run as tokio tasks; whatever they emit is dispatched back.
//!
//! Feature registration rebuilds the combined reducer from the full module
//! registry. Epic execution is restarted only for the modules whose slot
//! changed, so in-flight work of untouched features survives.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use futures::StreamExt;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::action::{Action, ActionStream};
use crate::config::StoreConfig;
use crate::epic::{combine_epics, Epic};
use crate::error::StoreError;
use crate::feature::FeatureModule;
use crate::reducer::{combine_reducers, Reducer};
use crate::selectors::Selection;
use crate::state::{Identity, RootState};
use crate::subject::{Observable, Subject};

/// Handle to a running store. Cheap to clone; all clones share one store.
///
/// One store per process is an application convention: construct it at
/// startup and pass it to whoever needs it.
#[derive(Clone)]
pub struct Store {
    shared: Arc<StoreShared>,
}

struct StoreShared {
    actions: Subject<Action>,
    states: Subject<RootState>,
    runtime: Option<Handle>,
    inner: Mutex<StoreInner>,
}

struct StoreInner {
    modules: Vec<FeatureModule>,
    reducer: Reducer<RootState>,
    state: RootState,
    drivers: Vec<EpicDriver>,
    completed: bool,
}

/// A running epic task and the features whose epics it merges.
struct EpicDriver {
    features: Vec<String>,
    task: JoinHandle<()>,
}

/// Creates a store with default settings.
pub fn create_store() -> Store {
    create_store_with_config(&StoreConfig::default())
}

/// Creates a store. If called inside a tokio runtime, that runtime also
/// runs epics of features added later from threads outside it.
pub fn create_store_with_config(config: &StoreConfig) -> Store {
    let state = RootState::default();
    let inner = StoreInner {
        modules: Vec::new(),
        reducer: combine_reducers(Vec::<(String, Reducer<_>)>::new()),
        state: Arc::clone(&state),
        drivers: Vec::new(),
        completed: false,
    };

    Store {
        shared: Arc::new(StoreShared {
            actions: Subject::new(config.store.action_backlog_warning),
            states: Subject::replay_latest(config.store.state_backlog_warning, state),
            runtime: Handle::try_current().ok(),
            inner: Mutex::new(inner),
        }),
    }
}

impl Store {
    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.shared.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reduces `action` into the state, publishes the new state, then hands
    /// the action to the epics.
    ///
    /// Reducer panics propagate to the caller. Reducers and selectors must
    /// not call back into the store.
    pub fn dispatch(&self, action: Action) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.completed {
            return Err(StoreError::Completed);
        }

        tracing::trace!(action = action.action_type(), "dispatch");
        let next = inner
            .reducer
            .reduce(Some(Arc::clone(&inner.state)), &action)
            .unwrap_or_default();
        inner.state = Arc::clone(&next);

        self.shared.states.next(next);
        self.shared.actions.next(action);
        Ok(())
    }

    /// Registers a feature module and its not yet registered dependencies.
    ///
    /// Dependencies go first, depth first, each once. Re-adding an id
    /// replaces that module in place and keeps its state branch. Every
    /// (re)registered module gets one init action, dispatched after its epic
    /// is subscribed.
    pub fn add_feature_module(&self, module: FeatureModule) -> Result<(), StoreError> {
        let (added, restart) = {
            let mut inner = self.lock();
            if inner.completed {
                return Err(StoreError::Completed);
            }

            let mut added = Vec::new();
            let mut seen = HashSet::new();
            collect_new_modules(&inner, module, &mut seen, &mut added);

            let runtime = self.runtime();
            if runtime.is_none() {
                if let Some(module) = added.iter().find(|m| m.epic.is_some()) {
                    return Err(StoreError::NoRuntime(module.id.clone()));
                }
            }

            for module in &added {
                tracing::info!(feature = %module.id, "adding feature module");
                inner.register(module.clone());
            }
            inner.reducer = inner.build_reducer();

            let restart = inner.stop_drivers_for(&added);
            (added, restart)
        };

        self.start_epics(restart);

        for module in &added {
            self.dispatch(Action::init(&module.id))?;
        }
        Ok(())
    }

    fn runtime(&self) -> Option<Handle> {
        Handle::try_current().ok().or_else(|| self.shared.runtime.clone())
    }

    fn start_epics(&self, modules: Vec<FeatureModule>) {
        let features: Vec<String> = modules.iter().map(|m| m.id.clone()).collect();
        let epics: Vec<Epic> = modules.into_iter().filter_map(|m| m.epic).collect();
        if epics.is_empty() {
            return;
        }
        let Some(runtime) = self.runtime() else {
            return;
        };

        // subscriptions happen here, before any init action goes out
        let output = combine_epics(epics).run(self.shared.actions.observable(), self.shared.states.observable());
        let task = spawn_driver(&runtime, Arc::downgrade(&self.shared), output, features.join(","));

        let mut inner = self.lock();
        if inner.completed {
            task.abort();
            return;
        }
        inner.drivers.push(EpicDriver { features, task });
    }

    /// Stream of whole-state snapshots, starting with the current one.
    pub fn as_observable(&self) -> Observable<RootState> {
        self.shared.states.observable()
    }

    /// Every action dispatched to the store, including epic output.
    pub fn actions(&self) -> Observable<Action> {
        self.shared.actions.observable()
    }

    /// Current state snapshot.
    pub fn state(&self) -> RootState {
        Arc::clone(&self.lock().state)
    }

    /// Shorthand for `as_observable().select(selector)`.
    pub fn select<T, F>(&self, selector: F) -> Selection<T>
    where
        T: Identity + Clone + Send + Sync + 'static,
        F: Fn(&RootState) -> T + Send + Sync + 'static,
    {
        self.as_observable().select(selector)
    }

    /// Ids of registered features in registration order.
    pub fn feature_ids(&self) -> Vec<String> {
        self.lock().modules.iter().map(|m| m.id.clone()).collect()
    }

    pub fn is_completed(&self) -> bool {
        self.lock().completed
    }

    /// Shuts the store down: epics are cancelled and both streams complete.
    pub fn on_completed(&self) {
        let drivers = {
            let mut inner = self.lock();
            if inner.completed {
                return;
            }
            inner.completed = true;
            std::mem::take(&mut inner.drivers)
        };
        tracing::debug!(drivers = drivers.len(), "completing store");

        for driver in drivers {
            driver.task.abort();
        }
        self.shared.states.complete();
        self.shared.actions.complete();
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("Store")
            .field("features", &inner.modules.iter().map(|m| m.id.as_str()).collect::<Vec<_>>())
            .field("completed", &inner.completed)
            .finish()
    }
}

impl StoreInner {
    fn is_registered(&self, id: &str) -> bool {
        self.modules.iter().any(|m| m.id == id)
    }

    fn register(&mut self, module: FeatureModule) {
        match self.modules.iter_mut().find(|m| m.id == module.id) {
            Some(slot) => *slot = module,
            None => self.modules.push(module),
        }
    }

    fn build_reducer(&self) -> Reducer<RootState> {
        combine_reducers(
            self.modules
                .iter()
                .filter_map(|m| m.reducer.clone().map(|reducer| (m.id.clone(), reducer))),
        )
    }

    /// Aborts drivers running any of `changed` and returns the modules whose
    /// epics must be (re)started: the changed ones plus the other members of
    /// every aborted driver.
    ///
    /// Work in flight inside an aborted driver is dropped without an error
    /// action. Restarted co-members get no new init action, so their epics
    /// only react to actions dispatched from here on.
    fn stop_drivers_for(&mut self, changed: &[FeatureModule]) -> Vec<FeatureModule> {
        let changed_ids: HashSet<&str> = changed.iter().map(|m| m.id.as_str()).collect();
        let mut restart_ids: Vec<String> = changed.iter().map(|m| m.id.clone()).collect();

        self.drivers.retain(|driver| {
            if !driver.features.iter().any(|id| changed_ids.contains(id.as_str())) {
                return true;
            }
            driver.task.abort();
            for id in &driver.features {
                if !restart_ids.contains(id) {
                    restart_ids.push(id.clone());
                }
            }
            false
        });

        restart_ids
            .iter()
            .filter_map(|id| self.modules.iter().find(|m| &m.id == id).cloned())
            .collect()
    }
}

/// Flattens `module` and its dependencies, dependencies first. Dependencies
/// that are already registered are skipped; the module itself never is.
fn collect_new_modules(
    inner: &StoreInner,
    module: FeatureModule,
    seen: &mut HashSet<String>,
    out: &mut Vec<FeatureModule>,
) {
    if !seen.insert(module.id.clone()) {
        return;
    }
    for dependency in &module.dependencies {
        if !inner.is_registered(&dependency.id) {
            collect_new_modules(inner, dependency.clone(), seen, out);
        }
    }
    out.push(module);
}

fn spawn_driver(runtime: &Handle, store: Weak<StoreShared>, mut output: ActionStream, features: String) -> JoinHandle<()> {
    runtime.spawn(async move {
        while let Some(action) = output.next().await {
            let Some(shared) = store.upgrade() else {
                break;
            };
            if let Err(error) = (Store { shared }).dispatch(action) {
                tracing::debug!(%features, %error, "dropping epic output");
                break;
            }
        }
        tracing::debug!(%features, "epic stream ended");
    })
}

impl Drop for StoreShared {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner());
        for driver in inner.drivers.drain(..) {
            driver.task.abort();
        }
        self.states.complete();
        self.actions.complete();
    }
}
