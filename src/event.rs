//! Event and log callback system.
//!
//! Trees report mutations (`insert-text`, `delete-range`, `apply-tag`,
//! `remove-tag`, `mark-set`, `mark-deleted`, `view-added`, `view-removed`)
//! through the event callback and internal progress (rebalancing,
//! validation passes, rejected operations) through the log callback.

use std::sync::{Mutex, MutexGuard, OnceLock};

/// Severity of a log message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

type EventCallback = Box<dyn Fn(&str, &str) + Send + Sync + 'static>;
type LogCallback = Box<dyn Fn(LogLevel, &str) + Send + Sync + 'static>;

/// A process-wide, replaceable callback.
struct Slot<C>(OnceLock<Mutex<Option<C>>>);

impl<C> Slot<C> {
    const fn new() -> Self {
        Self(OnceLock::new())
    }

    /// A panicking callback poisons the lock; the slot stays usable.
    fn lock(&self) -> MutexGuard<'_, Option<C>> {
        self.0
            .get_or_init(|| Mutex::new(None))
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn replace(&self, callback: Option<C>) {
        *self.lock() = callback;
    }
}

static EVENTS: Slot<EventCallback> = Slot::new();
static LOGS: Slot<LogCallback> = Slot::new();

/// Install the event callback. It receives the event name and a
/// `key=value` description of the change, and replaces any earlier one.
pub fn set_event_callback<F>(callback: F)
where
    F: Fn(&str, &str) + Send + Sync + 'static,
{
    EVENTS.replace(Some(Box::new(callback)));
}

pub fn clear_event_callback() {
    EVENTS.replace(None);
}

/// Report a change to the event callback, if one is installed.
pub fn emit_event(name: &str, data: &str) {
    let guard = EVENTS.lock();
    if let Some(callback) = guard.as_ref() {
        callback(name, data);
    }
}

/// Install the log callback, replacing any earlier one.
pub fn set_log_callback<F>(callback: F)
where
    F: Fn(LogLevel, &str) + Send + Sync + 'static,
{
    LOGS.replace(Some(Box::new(callback)));
}

pub fn clear_log_callback() {
    LOGS.replace(None);
}

/// Send a message to the log callback, if one is installed.
pub fn emit_log(level: LogLevel, message: &str) {
    let guard = LOGS.lock();
    if let Some(callback) = guard.as_ref() {
        callback(level, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // Both callbacks are process-wide, so everything touching them lives in
    // one test to keep parallel test threads from racing.
    #[test]
    fn test_callbacks_receive_and_clear() {
        let events = Arc::new(AtomicUsize::new(0));
        let events_clone = Arc::clone(&events);
        set_event_callback(move |name, data| {
            if name == "unit-test" {
                assert_eq!(data, "offset=1");
                events_clone.fetch_add(1, Ordering::SeqCst);
            }
        });
        emit_event("unit-test", "offset=1");
        assert_eq!(events.load(Ordering::SeqCst), 1);
        clear_event_callback();
        emit_event("unit-test", "offset=1");
        assert_eq!(events.load(Ordering::SeqCst), 1);

        let warnings = Arc::new(AtomicUsize::new(0));
        let warnings_clone = Arc::clone(&warnings);
        set_log_callback(move |level, msg| {
            if level >= LogLevel::Warn && msg == "unit-test" {
                warnings_clone.fetch_add(1, Ordering::SeqCst);
            }
        });
        emit_log(LogLevel::Debug, "unit-test");
        emit_log(LogLevel::Warn, "unit-test");
        assert_eq!(warnings.load(Ordering::SeqCst), 1);
        clear_log_callback();
    }
}
