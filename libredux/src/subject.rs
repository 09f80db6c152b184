//! Hot multicast subjects
//!
//! A [`Subject`] pushes values to every current subscriber. Each subscriber
//! owns an unbounded `tokio::sync::mpsc` queue, so a slow consumer never
//! loses values; once its backlog reaches the subject's warning threshold a
//! warning is logged. Subscribing is eager: the queue exists from the moment
//! `subscribe` returns, so values sent afterwards are never missed even if
//! the stream is polled later. A replaying subject also hands its latest
//! value to each new subscriber first.
//!
//! Subjects additionally carry synchronous listeners, which run on the
//! thread calling [`Subject::next`]. `select` uses them so a selector runs
//! once per emission no matter how many consumers there are.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::mpsc;

/// Synchronous observer attached to a subject.
pub(crate) trait Listener<T>: Send + Sync {
    fn on_next(&self, value: &T);
    fn on_completed(&self);
}

struct Subscriber<T> {
    sender: mpsc::UnboundedSender<T>,
    backlog: Arc<AtomicUsize>,
    reported: bool,
}

impl<T> Subscriber<T> {
    /// Queues `value`. Returns `false` once the receiving stream is gone.
    fn send(&mut self, value: T, backlog_warning: usize) -> bool {
        let pending = self.backlog.fetch_add(1, Ordering::Relaxed) + 1;
        if self.sender.send(value).is_err() {
            return false;
        }
        if pending >= backlog_warning {
            if !self.reported {
                self.reported = true;
                tracing::warn!(pending, "subscriber is falling behind, values are queued");
            }
        } else {
            self.reported = false;
        }
        true
    }
}

struct SubjectState<T> {
    subscribers: Vec<Subscriber<T>>,
    completed: bool,
    latest: Option<T>,
    replay: bool,
    listeners: Vec<Weak<dyn Listener<T>>>,
}

/// A hot, multicast source of values.
pub struct Subject<T> {
    shared: Arc<Mutex<SubjectState<T>>>,
    backlog_warning: usize,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            backlog_warning: self.backlog_warning,
        }
    }
}

impl<T> fmt::Debug for Subject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subject")
            .field("backlog_warning", &self.backlog_warning)
            .finish_non_exhaustive()
    }
}

impl<T: Clone + Send + 'static> Subject<T> {
    /// A subject without replay. A subscriber whose queue grows to
    /// `backlog_warning` pending values is reported; nothing is dropped.
    pub fn new(backlog_warning: usize) -> Self {
        Self::with_state(backlog_warning, None, false)
    }

    /// A subject that replays its latest value, seeded with `initial`.
    pub fn replay_latest(backlog_warning: usize, initial: T) -> Self {
        Self::with_state(backlog_warning, Some(initial), true)
    }

    /// A replaying subject with nothing to replay until the first value.
    pub fn replay_empty(backlog_warning: usize) -> Self {
        Self::with_state(backlog_warning, None, true)
    }

    fn with_state(backlog_warning: usize, latest: Option<T>, replay: bool) -> Self {
        Self {
            shared: Arc::new(Mutex::new(SubjectState {
                subscribers: Vec::new(),
                completed: false,
                latest,
                replay,
                listeners: Vec::new(),
            })),
            backlog_warning: backlog_warning.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SubjectState<T>> {
        self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Push a value to all subscribers and listeners.
    ///
    /// Returns `false` once the subject has completed.
    pub fn next(&self, value: T) -> bool {
        let listeners = {
            let mut state = self.lock();
            if state.completed {
                return false;
            }
            let backlog_warning = self.backlog_warning;
            state
                .subscribers
                .retain_mut(|subscriber| subscriber.send(value.clone(), backlog_warning));
            if state.replay {
                state.latest = Some(value.clone());
            }
            state.listeners.retain(|listener| listener.strong_count() > 0);
            state.listeners.clone()
        };

        for listener in listeners.iter().filter_map(Weak::upgrade) {
            listener.on_next(&value);
        }
        true
    }

    /// Subscribe to future values (preceded by the latest one when replaying).
    ///
    /// The stream ends once the subject completes and queued values are drained.
    pub fn subscribe(&self) -> BoxStream<'static, T> {
        let mut state = self.lock();
        if state.completed {
            return stream::empty().boxed();
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let mut subscriber = Subscriber {
            sender,
            backlog: Arc::new(AtomicUsize::new(0)),
            reported: false,
        };
        let backlog = Arc::clone(&subscriber.backlog);
        if state.replay {
            if let Some(latest) = state.latest.clone() {
                subscriber.send(latest, self.backlog_warning);
            }
        }
        state.subscribers.push(subscriber);

        receiver_stream(receiver, backlog)
    }

    /// Latest value, for replaying subjects.
    pub fn latest(&self) -> Option<T> {
        self.lock().latest.clone()
    }

    /// Completes the subject. Streams end after draining; listeners are told
    /// and released.
    pub fn complete(&self) {
        let listeners = {
            let mut state = self.lock();
            if state.completed {
                return;
            }
            state.completed = true;
            state.subscribers.clear();
            std::mem::take(&mut state.listeners)
        };
        for listener in listeners.iter().filter_map(Weak::upgrade) {
            listener.on_completed();
        }
    }

    pub fn is_completed(&self) -> bool {
        self.lock().completed
    }

    /// Read-only handle.
    pub fn observable(&self) -> Observable<T> {
        Observable {
            subject: self.clone(),
        }
    }

    /// Attach a listener. A replaying subject seeds it with the latest value
    /// under the same lock, so no emission can slip in between. Only a weak
    /// reference is kept. Returns `false` if the subject already completed.
    pub(crate) fn add_listener(&self, listener: Arc<dyn Listener<T>>) -> bool {
        let mut state = self.lock();
        if state.completed {
            return false;
        }
        if let Some(latest) = state.latest.as_ref() {
            listener.on_next(latest);
        }
        state.listeners.push(Arc::downgrade(&listener));
        true
    }
}

fn receiver_stream<T: Send + 'static>(
    receiver: mpsc::UnboundedReceiver<T>,
    backlog: Arc<AtomicUsize>,
) -> BoxStream<'static, T> {
    stream::unfold((receiver, backlog), |(mut receiver, backlog)| async move {
        let value = receiver.recv().await?;
        backlog.fetch_sub(1, Ordering::Relaxed);
        Some((value, (receiver, backlog)))
    })
    .boxed()
}

/// Subscribe-only view of a [`Subject`]. This is what epics and UI
/// consumers receive.
pub struct Observable<T> {
    subject: Subject<T>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            subject: self.subject.clone(),
        }
    }
}

impl<T> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable").finish_non_exhaustive()
    }
}

impl<T: Clone + Send + 'static> Observable<T> {
    pub fn subscribe(&self) -> BoxStream<'static, T> {
        self.subject.subscribe()
    }

    pub fn latest(&self) -> Option<T> {
        self.subject.latest()
    }

    pub fn is_completed(&self) -> bool {
        self.subject.is_completed()
    }

    pub(crate) fn subject(&self) -> &Subject<T> {
        &self.subject
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_subscribers_receive_values_after_subscription() {
        let subject = Subject::new(16);
        subject.next(1);

        let first = subject.subscribe();
        let second = subject.subscribe();
        subject.next(2);
        subject.next(3);
        subject.complete();

        assert_eq!(first.collect::<Vec<_>>().await, vec![2, 3]);
        assert_eq!(second.collect::<Vec<_>>().await, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_replay_latest_seeds_new_subscribers() {
        let subject = Subject::replay_latest(16, 0);
        subject.next(1);

        let late = subject.subscribe();
        subject.next(2);
        subject.complete();

        assert_eq!(late.collect::<Vec<_>>().await, vec![1, 2]);
        assert_eq!(subject.latest(), Some(2));
    }

    #[tokio::test]
    async fn test_completed_subject_rejects_values() {
        let subject = Subject::new(4);
        subject.complete();

        assert!(subject.is_completed());
        assert!(!subject.next(1));
        assert!(subject.subscribe().collect::<Vec<i32>>().await.is_empty());
    }

    #[tokio::test]
    async fn test_slow_subscriber_loses_nothing() {
        let subject = Subject::new(8);
        let values = subject.subscribe();

        for value in 0..1000 {
            subject.next(value);
        }
        subject.complete();

        let received: Vec<i32> = values.collect().await;
        assert_eq!(received, (0..1000).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_dropped_subscriber_is_released() {
        let subject = Subject::new(4);
        let kept = subject.subscribe();
        drop(subject.subscribe());

        assert!(subject.next(1));
        assert_eq!(subject.lock().subscribers.len(), 1);

        subject.complete();
        assert_eq!(kept.collect::<Vec<_>>().await, vec![1]);
    }

    struct Counting {
        seen: AtomicUsize,
        completed: AtomicUsize,
    }

    impl Listener<i32> for Counting {
        fn on_next(&self, _: &i32) {
            self.seen.fetch_add(1, Ordering::SeqCst);
        }

        fn on_completed(&self) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_listeners_run_synchronously_and_drop_with_owner() {
        let subject = Subject::replay_latest(4, 0);
        let listener = Arc::new(Counting {
            seen: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        });

        assert!(subject.add_listener(Arc::clone(&listener) as Arc<dyn Listener<i32>>));
        subject.next(1);
        subject.next(2);
        // seeded with the replayed 0, then 1 and 2
        assert_eq!(listener.seen.load(Ordering::SeqCst), 3);

        subject.complete();
        assert_eq!(listener.completed.load(Ordering::SeqCst), 1);

        drop(listener);
        assert!(!subject.add_listener(Arc::new(Counting {
            seen: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        })));
    }
}
