use std::sync::Arc;

use super::{CommandContextCloseListener, CommandContextRef, StandardCommandContext};
use crate::command::DynCommand;

/// Produces a fresh, open context for a command.
pub trait CommandContextFactory: Send + Sync {
    /// Creates a new context bound to `command`. The returned context must be
    /// open: neither failed nor closed.
    fn create(&self, command: &dyn DynCommand) -> CommandContextRef;
}

/// Factory for [`StandardCommandContext`]s.
///
/// Close listeners registered on the factory are attached to every context
/// it creates.
#[derive(Debug, Clone, Default)]
pub struct StandardCommandContextFactory {
    close_listeners: Vec<Arc<dyn CommandContextCloseListener>>,
}

impl StandardCommandContextFactory {
    /// A factory without close listeners.
    pub const fn new() -> Self {
        Self {
            close_listeners: Vec::new(),
        }
    }

    /// Attaches `listener` to every context created from now on.
    #[must_use]
    pub fn with_close_listener(mut self, listener: Arc<dyn CommandContextCloseListener>) -> Self {
        self.close_listeners.push(listener);
        self
    }
}

impl CommandContextFactory for StandardCommandContextFactory {
    fn create(&self, command: &dyn DynCommand) -> CommandContextRef {
        let context = StandardCommandContext::new(command.command_name());
        for listener in &self.close_listeners {
            context.add_close_listener(Arc::clone(listener));
        }
        Arc::new(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::context::{CommandContext, ContextState};
    use crate::errors::CommandResult;
    use parking_lot::Mutex;

    struct Noop;

    impl Command for Noop {
        type Output = ();

        fn execute(&self, _context: &CommandContextRef) -> CommandResult<()> {
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct Counter {
        closed: Mutex<usize>,
    }

    impl CommandContextCloseListener for Counter {
        fn closed(&self, _context: &dyn CommandContext) {
            *self.closed.lock() += 1;
        }
    }

    #[test]
    fn creates_distinct_open_contexts_named_after_the_command() {
        let factory = StandardCommandContextFactory::new();

        let first = factory.create(&Noop);
        let second = factory.create(&Noop);

        assert_ne!(first.id(), second.id());
        assert_eq!(first.state(), ContextState::Open);
        assert_eq!(first.command_name().as_ref(), "Noop");
    }

    #[test]
    fn factory_listeners_are_attached_to_created_contexts() {
        let counter = Arc::new(Counter::default());
        let factory = StandardCommandContextFactory::new().with_close_listener(counter.clone());

        factory.create(&Noop).close().unwrap();
        factory.create(&Noop).close().unwrap();

        assert_eq!(*counter.closed.lock(), 2);
    }
}
