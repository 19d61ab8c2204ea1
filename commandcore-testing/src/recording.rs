//! Contexts and factories that remember how they were used.

use std::sync::Arc;

use commandcore::{
    ambient, CommandContext, CommandContextFactory, CommandContextRef, CommandError,
    CommandName, CommandResult, ContextId, ContextState, DynCommand,
};
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct RecordingState {
    exception: Option<CommandError>,
    record_calls: usize,
    close_calls: usize,
    closed: bool,
    ambient_at_close: Option<ContextId>,
}

/// A context that counts lifecycle calls.
///
/// On close it also notes which context was active in the ambient store, so
/// tests can check that close runs before the ambient state is unwound.
#[derive(Debug)]
pub struct RecordingContext {
    id: ContextId,
    command_name: CommandName,
    fail_close: bool,
    state: Mutex<RecordingState>,
}

impl RecordingContext {
    /// A context whose close succeeds.
    pub fn new(command_name: CommandName) -> Self {
        Self {
            id: ContextId::new(),
            command_name,
            fail_close: false,
            state: Mutex::new(RecordingState::default()),
        }
    }

    /// A context whose close reports `CloseFailed`.
    pub fn failing_close(command_name: CommandName) -> Self {
        Self {
            fail_close: true,
            ..Self::new(command_name)
        }
    }

    /// How often `close()` was called.
    pub fn close_calls(&self) -> usize {
        self.state.lock().close_calls
    }

    /// How often `record_exception()` was called, including ignored calls.
    pub fn record_calls(&self) -> usize {
        self.state.lock().record_calls
    }

    /// The ambient command context observed by the first `close()`.
    pub fn ambient_at_close(&self) -> Option<ContextId> {
        self.state.lock().ambient_at_close
    }
}

impl CommandContext for RecordingContext {
    fn id(&self) -> ContextId {
        self.id
    }

    fn command_name(&self) -> &CommandName {
        &self.command_name
    }

    fn state(&self) -> ContextState {
        let state = self.state.lock();
        if state.closed {
            ContextState::Closed
        } else {
            state
                .exception
                .clone()
                .map_or(ContextState::Open, ContextState::Failed)
        }
    }

    fn exception(&self) -> Option<CommandError> {
        self.state.lock().exception.clone()
    }

    fn record_exception(&self, error: CommandError) {
        let mut state = self.state.lock();
        state.record_calls += 1;
        if state.exception.is_none() && !state.closed {
            state.exception = Some(error);
        }
    }

    fn close(&self) -> CommandResult<()> {
        // read before locking: the ambient store may hand back this very context
        let active = ambient::command_context().ok().flatten().map(|c| c.id());

        let mut state = self.state.lock();
        state.close_calls += 1;
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        state.ambient_at_close = active;
        drop(state);

        if self.fail_close {
            return Err(CommandError::CloseFailed {
                context: self.id,
                message: "scripted close failure".to_string(),
            });
        }
        Ok(())
    }
}

/// Factory that hands out [`RecordingContext`]s and keeps them for inspection.
#[derive(Debug, Default)]
pub struct RecordingFactory {
    fail_close: bool,
    created: Mutex<Vec<Arc<RecordingContext>>>,
}

impl RecordingFactory {
    /// Contexts created by this factory close successfully.
    pub fn new() -> Self {
        Self::default()
    }

    /// Contexts created by this factory fail to close.
    pub fn failing_close() -> Self {
        Self {
            fail_close: true,
            ..Self::default()
        }
    }

    /// Every context created so far, oldest first.
    pub fn created(&self) -> Vec<Arc<RecordingContext>> {
        self.created.lock().clone()
    }

    /// The most recently created context.
    pub fn last_created(&self) -> Option<Arc<RecordingContext>> {
        self.created.lock().last().cloned()
    }
}

impl CommandContextFactory for RecordingFactory {
    fn create(&self, command: &dyn DynCommand) -> CommandContextRef {
        let context = Arc::new(if self.fail_close {
            RecordingContext::failing_close(command.command_name())
        } else {
            RecordingContext::new(command.command_name())
        });
        self.created.lock().push(Arc::clone(&context));
        context
    }
}
