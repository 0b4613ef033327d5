//! Listener registry and dispatch.
//!
//! The [`ListenerRegistry`] is the one-to-many fan-out behind a stream's
//! single message hook. Each incoming record is evaluated against every
//! registered `(filter, action)` pair, in registration order.
//!
//! # Snapshots
//!
//! Listeners live in a copy-on-write list. A dispatch works on the snapshot
//! taken when it started, so listeners added or removed while a record is
//! being dispatched (including by one of its own actions) only affect later
//! records.
//!
//! # Failure isolation
//!
//! Every predicate and action call is isolated: an action that returns an
//! error or panics is reported as a [`ListenerError`] and dispatch moves on to
//! the next listener.

use std::any::Any;
use std::fmt::Display;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{Level, debug, error, span, trace};

use crate::error::ListenerError;
use crate::filter::{CompiledFilter, Filter};
use crate::record::EventRecord;

/// A type-erased listener action.
pub type ActionFn = Arc<dyn Fn(&EventRecord) -> Result<(), String> + Send + Sync>;

/// Return types accepted from listener actions.
///
/// Actions may return `()` or any `Result<(), E>` whose error is displayable.
pub trait ActionOutcome {
    /// Converts the outcome into a result with a rendered error.
    fn into_outcome(self) -> Result<(), String>;
}

impl ActionOutcome for () {
    fn into_outcome(self) -> Result<(), String> {
        Ok(())
    }
}

impl<E: Display> ActionOutcome for Result<(), E> {
    fn into_outcome(self) -> Result<(), String> {
        self.map_err(|e| e.to_string())
    }
}

/// Identifies a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Returns the raw id.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A registered `(filter, action)` pair.
#[derive(Clone)]
pub struct ListenerEntry {
    id: ListenerId,
    filter: CompiledFilter,
    action: ActionFn,
}

impl ListenerEntry {
    /// Returns this listener's id.
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Checks the filter, then runs the action, isolating both.
    fn invoke(&self, record: &EventRecord) -> Invocation {
        let id = self.id.as_u64();

        match catch_unwind(AssertUnwindSafe(|| self.filter.matches(record))) {
            Ok(true) => {}
            Ok(false) => return Invocation::Skipped,
            Err(payload) => {
                return Invocation::Failed(ListenerError::Panicked {
                    listener: id,
                    message: panic_message(payload.as_ref()),
                });
            }
        }

        match catch_unwind(AssertUnwindSafe(|| (self.action)(record))) {
            Ok(Ok(())) => Invocation::Ran,
            Ok(Err(message)) => Invocation::Failed(ListenerError::Failed {
                listener: id,
                message,
            }),
            Err(payload) => Invocation::Failed(ListenerError::Panicked {
                listener: id,
                message: panic_message(payload.as_ref()),
            }),
        }
    }
}

impl std::fmt::Debug for ListenerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerEntry")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

enum Invocation {
    Skipped,
    Ran,
    Failed(ListenerError),
}

/// Summary of one dispatch.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Listeners whose filter matched and whose action completed.
    pub delivered: usize,
    /// Listeners whose filter or action failed.
    pub errors: Vec<ListenerError>,
    /// Whether dispatch was cut short by the caller.
    pub interrupted: bool,
}

impl DispatchReport {
    /// Returns the number of listeners that were invoked, failed or not.
    pub fn invoked(&self) -> usize {
        self.delivered + self.errors.len()
    }
}

/// Ordered collection of listeners attached to one stream.
#[derive(Default)]
pub struct ListenerRegistry {
    entries: RwLock<Arc<Vec<ListenerEntry>>>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an action under a filter and returns its id.
    ///
    /// The filter is compiled once, here.
    pub fn add<F, R>(&self, action: F, filter: &Filter) -> ListenerId
    where
        F: Fn(&EventRecord) -> R + Send + Sync + 'static,
        R: ActionOutcome,
    {
        let action: ActionFn = Arc::new(move |record: &EventRecord| action(record).into_outcome());
        self.add_boxed(action, filter.compile())
    }

    /// Registers a pre-built action.
    pub fn add_boxed(&self, action: ActionFn, filter: CompiledFilter) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let entry = ListenerEntry { id, filter, action };

        let mut entries = self.entries.write();
        Arc::make_mut(&mut *entries).push(entry);
        trace!(listener = %id, count = entries.len(), "Listener added");
        id
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.write();
        let Some(pos) = entries.iter().position(|e| e.id == id) else {
            return false;
        };
        Arc::make_mut(&mut *entries).remove(pos);
        trace!(listener = %id, count = entries.len(), "Listener removed");
        true
    }

    /// Returns the number of registered listeners.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Removes all listeners.
    pub fn clear(&self) {
        *self.entries.write() = Arc::new(Vec::new());
    }

    /// Returns the current listener list.
    pub fn snapshot(&self) -> Arc<Vec<ListenerEntry>> {
        Arc::clone(&*self.entries.read())
    }

    /// Dispatches a record to every matching listener.
    pub fn dispatch(&self, record: &EventRecord) -> DispatchReport {
        self.dispatch_while(record, || true)
    }

    /// Dispatches a record, checking `keep_going` before each listener.
    ///
    /// Once `keep_going` returns `false` no further listener runs for this
    /// record.
    pub fn dispatch_while(
        &self,
        record: &EventRecord,
        keep_going: impl Fn() -> bool,
    ) -> DispatchReport {
        let span = span!(Level::TRACE, "dispatch");
        let _enter = span.enter();

        let snapshot = self.snapshot();
        let mut report = DispatchReport::default();

        for entry in snapshot.iter() {
            if !keep_going() {
                report.interrupted = true;
                break;
            }
            match entry.invoke(record) {
                Invocation::Skipped => {}
                Invocation::Ran => report.delivered += 1,
                Invocation::Failed(err) => {
                    error!(listener = %entry.id, error = %err, "Listener action failed");
                    report.errors.push(err);
                }
            }
        }

        debug!(
            listeners = snapshot.len(),
            delivered = report.delivered,
            failed = report.errors.len(),
            "Record dispatched"
        );
        report
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listener_count", &self.len())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn record(value: serde_json::Value) -> EventRecord {
        EventRecord::new(value)
    }

    #[test]
    fn test_dispatch_no_listeners() {
        let registry = ListenerRegistry::new();
        let report = registry.dispatch(&record(json!({"type": "edit"})));
        assert_eq!(report.invoked(), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registration_order_is_invocation_order() {
        let registry = ListenerRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for n in 1..=3 {
            let order = Arc::clone(&order);
            registry.add(move |_: &EventRecord| order.lock().push(n), &Filter::any());
        }

        registry.dispatch(&record(json!({})));
        assert_eq!(*order.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn test_only_matching_listeners_run() {
        let registry = ListenerRegistry::new();
        let humans = Arc::new(AtomicUsize::new(0));
        let bots = Arc::new(AtomicUsize::new(0));

        let h = Arc::clone(&humans);
        registry.add(
            move |_: &EventRecord| {
                h.fetch_add(1, Ordering::SeqCst);
            },
            &Filter::field("bot", false),
        );
        let b = Arc::clone(&bots);
        registry.add(
            move |_: &EventRecord| {
                b.fetch_add(1, Ordering::SeqCst);
            },
            &Filter::field("bot", true),
        );

        let report =
            registry.dispatch(&record(json!({"type": "edit", "title": "Foo", "bot": false})));
        assert_eq!(report.delivered, 1);
        assert_eq!(humans.load(Ordering::SeqCst), 1);
        assert_eq!(bots.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_same_action_registered_twice() {
        let registry = ListenerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let action = {
            let counter = Arc::clone(&counter);
            move |_: &EventRecord| {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        };

        registry.add(action.clone(), &Filter::field("type", "edit"));
        registry.add(action, &Filter::any());

        registry.dispatch(&record(json!({"type": "edit"})));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        registry.dispatch(&record(json!({"type": "log"})));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_failing_action_does_not_stop_dispatch() {
        let registry = ListenerRegistry::new();
        let reached = Arc::new(AtomicUsize::new(0));

        registry.add(
            |_: &EventRecord| -> Result<(), String> { Err("boom".into()) },
            &Filter::any(),
        );
        registry.add(
            |_: &EventRecord| -> Result<(), String> { panic!("listener exploded") },
            &Filter::any(),
        );
        let r = Arc::clone(&reached);
        registry.add(
            move |_: &EventRecord| {
                r.fetch_add(1, Ordering::SeqCst);
            },
            &Filter::any(),
        );

        let report = registry.dispatch(&record(json!({"type": "edit"})));
        assert_eq!(reached.load(Ordering::SeqCst), 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.errors.len(), 2);
        assert!(matches!(&report.errors[0], ListenerError::Failed { message, .. } if message == "boom"));
        assert!(
            matches!(&report.errors[1], ListenerError::Panicked { message, .. } if message == "listener exploded")
        );
    }

    #[test]
    fn test_panicking_predicate_is_isolated() {
        let registry = ListenerRegistry::new();
        let reached = Arc::new(AtomicUsize::new(0));

        registry.add(|_: &EventRecord| {}, &Filter::predicate(|_| panic!("bad filter")));
        let r = Arc::clone(&reached);
        registry.add(
            move |_: &EventRecord| {
                r.fetch_add(1, Ordering::SeqCst);
            },
            &Filter::any(),
        );

        let report = registry.dispatch(&record(json!({})));
        assert_eq!(reached.load(Ordering::SeqCst), 1);
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn test_remove_listener() {
        let registry = ListenerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let id = registry.add(
            move |_: &EventRecord| {
                c.fetch_add(1, Ordering::SeqCst);
            },
            &Filter::any(),
        );

        assert_eq!(registry.len(), 1);
        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        registry.dispatch(&record(json!({})));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_listener_added_during_dispatch_waits_for_next_record() {
        let registry = Arc::new(ListenerRegistry::new());
        let late_calls = Arc::new(AtomicUsize::new(0));

        let reg = Arc::clone(&registry);
        let late = Arc::clone(&late_calls);
        registry.add(
            move |_: &EventRecord| {
                let late = Arc::clone(&late);
                reg.add(
                    move |_: &EventRecord| {
                        late.fetch_add(1, Ordering::SeqCst);
                    },
                    &Filter::any(),
                );
            },
            &Filter::field("type", "first"),
        );

        let report = registry.dispatch(&record(json!({"type": "first"})));
        assert_eq!(report.invoked(), 1);
        assert_eq!(late_calls.load(Ordering::SeqCst), 0);
        assert_eq!(registry.len(), 2);

        registry.dispatch(&record(json!({"type": "second"})));
        assert_eq!(late_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dispatch_while_stops_early() {
        let registry = ListenerRegistry::new();
        let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let counter = Arc::new(AtomicUsize::new(0));

        let s = Arc::clone(&stop);
        registry.add(move |_: &EventRecord| s.store(true, Ordering::SeqCst), &Filter::any());
        let c = Arc::clone(&counter);
        registry.add(
            move |_: &EventRecord| {
                c.fetch_add(1, Ordering::SeqCst);
            },
            &Filter::any(),
        );

        let report = registry.dispatch_while(&record(json!({})), || !stop.load(Ordering::SeqCst));
        assert!(report.interrupted);
        assert_eq!(report.delivered, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
