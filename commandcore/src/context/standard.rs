use std::fmt::Debug;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{CommandContext, ContextState};
use crate::errors::{CommandError, CommandResult};
use crate::types::{CommandName, ContextId};

/// Hooks run while a [`StandardCommandContext`] closes.
///
/// `closing` runs first for every listener; then either `closed` (no failure
/// recorded) or `close_failure` (failure recorded) runs for every listener.
/// Listeners run once per context: a `close()` issued while they run, from a
/// listener or from another thread, returns `Ok(())` without running them
/// again.
///
/// Listeners must not panic. A context may be closed while a panic is
/// unwinding, and a second panic aborts the process.
pub trait CommandContextCloseListener: Send + Sync + Debug {
    /// Runs before the context is marked closed. An error here is recorded on
    /// the context and reported by `close()`.
    fn closing(&self, _context: &dyn CommandContext) -> CommandResult<()> {
        Ok(())
    }

    /// Runs after a successful unit of work.
    fn closed(&self, _context: &dyn CommandContext) {}

    /// Runs after a unit of work that recorded a failure.
    fn close_failure(&self, _context: &dyn CommandContext) {}
}

#[derive(Debug, Default)]
struct ContextInner {
    exception: Option<CommandError>,
    closing: bool,
    closed: bool,
    attributes: Map<String, Value>,
}

/// Default context implementation.
///
/// Holds free-form attributes for the commands sharing it and runs close
/// listeners when the creating frame closes it.
#[derive(Debug)]
pub struct StandardCommandContext {
    id: ContextId,
    command_name: CommandName,
    opened_at: DateTime<Utc>,
    inner: Mutex<ContextInner>,
    close_listeners: Mutex<Vec<Arc<dyn CommandContextCloseListener>>>,
}

impl StandardCommandContext {
    /// Opens a new context for the named command.
    pub fn new(command_name: CommandName) -> Self {
        Self {
            id: ContextId::new(),
            command_name,
            opened_at: Utc::now(),
            inner: Mutex::new(ContextInner::default()),
            close_listeners: Mutex::new(Vec::new()),
        }
    }

    /// When the context was opened.
    pub const fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// Registers a listener that runs on close.
    pub fn add_close_listener(&self, listener: Arc<dyn CommandContextCloseListener>) {
        self.close_listeners.lock().push(listener);
    }

    /// Stores an attribute visible to every command sharing this context.
    pub fn set_attribute(&self, key: impl Into<String>, value: impl Into<Value>) {
        let _previous = self.inner.lock().attributes.insert(key.into(), value.into());
    }

    /// Reads an attribute.
    pub fn attribute(&self, key: &str) -> Option<Value> {
        self.inner.lock().attributes.get(key).cloned()
    }

    fn run_closing_listeners(
        &self,
        listeners: &[Arc<dyn CommandContextCloseListener>],
    ) -> CommandResult<()> {
        for listener in listeners {
            if let Err(error) = listener.closing(self) {
                self.record_exception(error.clone());
                return Err(CommandError::CloseFailed {
                    context: self.id,
                    message: error.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl CommandContext for StandardCommandContext {
    fn id(&self) -> ContextId {
        self.id
    }

    fn command_name(&self) -> &CommandName {
        &self.command_name
    }

    fn state(&self) -> ContextState {
        let inner = self.inner.lock();
        if inner.closed {
            ContextState::Closed
        } else if let Some(exception) = &inner.exception {
            ContextState::Failed(exception.clone())
        } else {
            ContextState::Open
        }
    }

    fn exception(&self) -> Option<CommandError> {
        self.inner.lock().exception.clone()
    }

    fn record_exception(&self, error: CommandError) {
        let mut inner = self.inner.lock();
        if inner.closed {
            warn!(context = %self.id, %error, "ignoring exception recorded on a closed command context");
            return;
        }
        match &inner.exception {
            Some(first) => {
                warn!(context = %self.id, first = %first, ignored = %error, "command context already holds an exception; keeping the first");
            }
            None => {
                debug!(context = %self.id, %error, "exception recorded on command context");
                inner.exception = Some(error);
            }
        }
    }

    fn close(&self) -> CommandResult<()> {
        {
            let mut inner = self.inner.lock();
            if inner.closing || inner.closed {
                return Ok(());
            }
            inner.closing = true;
        }

        // listeners may call back into the context, so the lock is not held here
        let listeners = self.close_listeners.lock().clone();
        let closing = self.run_closing_listeners(&listeners);

        let failed = self.has_exception();
        for listener in &listeners {
            if failed {
                listener.close_failure(self);
            } else {
                listener.closed(self);
            }
        }

        {
            let mut inner = self.inner.lock();
            inner.closing = false;
            inner.closed = true;
        }
        let elapsed_ms = (Utc::now() - self.opened_at).num_milliseconds();
        debug!(context = %self.id, command = %self.command_name, failed, elapsed_ms, "command context closed");

        closing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct CallLog {
        calls: Mutex<Vec<&'static str>>,
        fail_closing: bool,
    }

    impl CommandContextCloseListener for CallLog {
        fn closing(&self, context: &dyn CommandContext) -> CommandResult<()> {
            self.calls.lock().push("closing");
            if self.fail_closing {
                return Err(CommandError::failed(
                    context.command_name().clone(),
                    "flush failed",
                ));
            }
            Ok(())
        }

        fn closed(&self, _context: &dyn CommandContext) {
            self.calls.lock().push("closed");
        }

        fn close_failure(&self, _context: &dyn CommandContext) {
            self.calls.lock().push("close_failure");
        }
    }

    fn context() -> StandardCommandContext {
        StandardCommandContext::new(CommandName::try_new("SaveDeployment").unwrap())
    }

    fn failure(message: &str) -> CommandError {
        CommandError::failed(CommandName::try_new("SaveDeployment").unwrap(), message)
    }

    #[test]
    fn new_context_is_open() {
        let context = context();

        assert_eq!(context.state(), ContextState::Open);
        assert!(!context.has_exception());
        assert!(!context.is_closed());
    }

    #[test]
    fn first_recorded_exception_wins() {
        let context = context();

        context.record_exception(failure("first"));
        context.record_exception(failure("second"));

        assert_eq!(context.exception(), Some(failure("first")));
        assert_eq!(context.state(), ContextState::Failed(failure("first")));
    }

    #[test]
    fn exception_remains_readable_after_close() {
        let context = context();
        context.record_exception(failure("boom"));

        context.close().unwrap();

        assert_eq!(context.state(), ContextState::Closed);
        assert_eq!(context.exception(), Some(failure("boom")));
    }

    #[test]
    fn close_is_idempotent() {
        let context = context();
        let log = Arc::new(CallLog::default());
        context.add_close_listener(log.clone());

        context.close().unwrap();
        context.close().unwrap();

        assert_eq!(*log.calls.lock(), vec!["closing", "closed"]);
    }

    /// Closes the context it is notified about from every hook.
    #[derive(Debug, Default)]
    struct ReentrantCloser {
        calls: Mutex<Vec<&'static str>>,
    }

    impl CommandContextCloseListener for ReentrantCloser {
        fn closing(&self, context: &dyn CommandContext) -> CommandResult<()> {
            self.calls.lock().push("closing");
            context.close()
        }

        fn closed(&self, context: &dyn CommandContext) {
            self.calls.lock().push("closed");
            let _ = context.close();
        }
    }

    #[test]
    fn close_from_a_listener_does_not_rerun_listeners() {
        // Given: a listener that closes its own context from each hook
        let context = context();
        let listener = Arc::new(ReentrantCloser::default());
        context.add_close_listener(listener.clone());

        // When: the context is closed
        let result = context.close();

        // Then: each hook ran once and the context ended closed
        assert_eq!(result, Ok(()));
        assert_eq!(*listener.calls.lock(), vec!["closing", "closed"]);
        assert_eq!(context.state(), ContextState::Closed);
    }

    #[test]
    fn concurrent_closes_run_the_listeners_once() {
        let context = Arc::new(context());
        let log = Arc::new(CallLog::default());
        context.add_close_listener(log.clone());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let context = Arc::clone(&context);
                std::thread::spawn(move || context.close())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), Ok(()));
        }

        assert_eq!(*log.calls.lock(), vec!["closing", "closed"]);
        assert!(context.is_closed());
    }

    #[test]
    fn failed_context_runs_close_failure_listeners() {
        let context = context();
        let log = Arc::new(CallLog::default());
        context.add_close_listener(log.clone());
        context.record_exception(failure("boom"));

        context.close().unwrap();

        assert_eq!(*log.calls.lock(), vec!["closing", "close_failure"]);
    }

    #[test]
    fn failing_closing_listener_is_recorded_and_reported() {
        let context = context();
        let log = Arc::new(CallLog {
            fail_closing: true,
            ..CallLog::default()
        });
        context.add_close_listener(log.clone());

        let result = context.close();

        assert!(matches!(result, Err(CommandError::CloseFailed { .. })));
        assert_eq!(context.exception(), Some(failure("flush failed")));
        assert!(context.is_closed());
        assert_eq!(*log.calls.lock(), vec!["closing", "close_failure"]);
    }

    #[test]
    fn closing_listener_failure_does_not_replace_recorded_exception() {
        let context = context();
        context.add_close_listener(Arc::new(CallLog {
            fail_closing: true,
            ..CallLog::default()
        }));
        context.record_exception(failure("original"));

        let _ = context.close();

        assert_eq!(context.exception(), Some(failure("original")));
    }

    #[test]
    fn exception_after_close_is_ignored() {
        let context = context();
        context.close().unwrap();

        context.record_exception(failure("late"));

        assert_eq!(context.exception(), None);
    }

    #[test]
    fn attributes_are_shared_through_the_context() {
        let context = context();

        context.set_attribute("retries", 3);

        assert_eq!(context.attribute("retries"), Some(Value::from(3)));
        assert_eq!(context.attribute("missing"), None);
    }
}
