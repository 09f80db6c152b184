//! Actions and action selectors
//!
//! An [`Action`] is an immutable `(type, payload)` message. The type string
//! must be unique across the process; namespacing with a feature prefix is
//! the caller's job, nothing here checks it.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use futures::future;
use futures::stream::{BoxStream, StreamExt};

/// Type of the synthetic action announcing a freshly registered feature.
/// Its payload is the feature id as a `String`.
pub const INIT_ACTION: &str = "@@redux/INIT";

/// Stream of actions flowing through an epic.
pub type ActionStream = BoxStream<'static, Action>;

/// Type-erased action payload.
#[derive(Clone)]
pub struct Payload {
    inner: Arc<dyn Any + Send + Sync>,
}

impl Payload {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(text) = self.downcast_ref::<String>() {
            return f.debug_tuple("Payload").field(text).finish();
        }
        f.debug_struct("Payload")
            .field("type_id", &(*self.inner).type_id())
            .finish()
    }
}

/// An immutable `(type, payload)` record.
#[derive(Clone, Debug)]
pub struct Action {
    action_type: Cow<'static, str>,
    payload: Option<Payload>,
}

impl Action {
    pub fn new<T: Any + Send + Sync>(action_type: impl Into<Cow<'static, str>>, payload: T) -> Self {
        Self {
            action_type: action_type.into(),
            payload: Some(Payload::new(payload)),
        }
    }

    /// An action without payload.
    pub fn empty(action_type: impl Into<Cow<'static, str>>) -> Self {
        Self {
            action_type: action_type.into(),
            payload: None,
        }
    }

    pub fn action_type(&self) -> &str {
        &self.action_type
    }

    pub fn raw_payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    /// Typed payload access. `None` when absent or of a different type.
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.as_ref().and_then(Payload::downcast_ref::<T>)
    }

    pub fn is_type(&self, action_type: &str) -> bool {
        self.action_type == action_type
    }

    pub(crate) fn init(feature_id: &str) -> Self {
        Self::new(INIT_ACTION, feature_id.to_string())
    }
}

/// Factory for actions of one fixed type.
///
/// The payload type is fixed at creation so call sites cannot mix payloads
/// for the same action type by accident.
pub struct ActionCreator<P> {
    action_type: Cow<'static, str>,
    _payload: PhantomData<fn(P)>,
}

impl<P> Clone for ActionCreator<P> {
    fn clone(&self) -> Self {
        Self {
            action_type: self.action_type.clone(),
            _payload: PhantomData,
        }
    }
}

impl<P> fmt::Debug for ActionCreator<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ActionCreator").field(&self.action_type).finish()
    }
}

impl<P: Any + Send + Sync> ActionCreator<P> {
    pub fn create(&self, payload: P) -> Action {
        Action::new(self.action_type.clone(), payload)
    }

    pub fn action_type(&self) -> &str {
        &self.action_type
    }

    pub fn matches(&self, action: &Action) -> bool {
        action.is_type(&self.action_type)
    }
}

impl<P> ActionCreator<P> {
    /// Create the action with no payload.
    pub fn empty(&self) -> Action {
        Action::empty(self.action_type.clone())
    }
}

/// Returns a factory producing actions of `type_name`.
pub fn create_action<P: Any + Send + Sync>(type_name: impl Into<Cow<'static, str>>) -> ActionCreator<P> {
    ActionCreator {
        action_type: type_name.into(),
        _payload: PhantomData,
    }
}

pub fn select_action_type(action: &Action) -> &str {
    action.action_type()
}

pub fn select_action_payload(action: &Action) -> Option<&Payload> {
    action.raw_payload()
}

/// Predicate testing the action type.
pub fn is_type(type_name: impl Into<Cow<'static, str>>) -> impl Fn(&Action) -> bool + Clone + Send + Sync {
    let type_name = type_name.into();
    move |action: &Action| action.is_type(&type_name)
}

/// Predicate testing that the payload equals `value`.
pub fn has_payload<T>(value: T) -> impl Fn(&Action) -> bool + Clone + Send + Sync
where
    T: Any + PartialEq + Clone + Send + Sync,
{
    move |action: &Action| action.payload::<T>() == Some(&value)
}

/// Stream operator admitting only actions of `type_name`, order preserved.
pub fn of_type(type_name: impl Into<Cow<'static, str>>) -> impl FnOnce(ActionStream) -> ActionStream {
    let type_name = type_name.into();
    move |actions: ActionStream| actions.of_type(type_name)
}

/// Action filters usable directly on any action stream.
pub trait ActionStreamExt: futures::Stream<Item = Action> + Sized + Send + 'static {
    /// Keep only actions of `type_name`.
    fn of_type(self, type_name: impl Into<Cow<'static, str>>) -> ActionStream {
        let type_name: Cow<'static, str> = type_name.into();
        let predicate = is_type(type_name);
        self.filter(move |action| future::ready(predicate(action)))
            .boxed()
    }

    /// Yields `identifier` once, when the init action for that feature passes by.
    fn of_init_feature(self, identifier: impl Into<String>) -> BoxStream<'static, String> {
        let identifier = identifier.into();
        let is_init = is_type(INIT_ACTION);
        let is_feature = has_payload(identifier.clone());
        self.filter(move |action| future::ready(is_init(action) && is_feature(action)))
            .take(1)
            .map(move |_| identifier.clone())
            .inspect(|id| tracing::debug!(feature = %id, "feature initialized"))
            .boxed()
    }
}

impl<S> ActionStreamExt for S where S: futures::Stream<Item = Action> + Sized + Send + 'static {}

/// Stream operator form of [`ActionStreamExt::of_init_feature`].
pub fn of_init_feature(identifier: impl Into<String>) -> impl FnOnce(ActionStream) -> BoxStream<'static, String> {
    let identifier = identifier.into();
    move |actions: ActionStream| actions.of_init_feature(identifier)
}
