//! The command abstraction.
//!
//! A [`Command`] is one unit of business work. It runs inside a unit-of-work
//! context handed to it by the last link of the interceptor chain.
//!
//! Links of the chain are trait objects, so they cannot be generic over the
//! command's output type. [`DynCommand`] is the object-safe view of a command
//! that the chain passes around; its output is boxed as [`ErasedOutput`] and
//! recovered by [`crate::executor::CommandExecutor`].

use std::any::Any;

use crate::context::CommandContextRef;
use crate::errors::CommandResult;
use crate::types::CommandName;

/// Type-erased command output.
pub type ErasedOutput = Box<dyn Any + Send>;

/// What a chain link returns on success.
///
/// `None` is the default, empty result: the link absorbed a failure and
/// recorded it on the context instead of returning it.
pub type CommandOutput = Option<ErasedOutput>;

/// Trait defining the behavior of a command.
///
/// Implementers define:
/// - The output type produced on success
/// - The business logic (`execute()`), which may itself issue nested
///   commands that observe the same context
pub trait Command: Send + Sync {
    /// Value produced when the command succeeds.
    type Output: Send + 'static;

    /// Name used in logs and error messages.
    fn name(&self) -> CommandName {
        CommandName::of::<Self>()
    }

    /// Runs the command inside `context`.
    fn execute(&self, context: &CommandContextRef) -> CommandResult<Self::Output>;
}

/// Object-safe view of a [`Command`].
///
/// Every `Command` implements this trait through a blanket impl.
pub trait DynCommand: Send + Sync {
    /// Name used in logs and error messages.
    fn command_name(&self) -> CommandName;

    /// Runs the command and boxes its output.
    fn execute_erased(&self, context: &CommandContextRef) -> CommandResult<ErasedOutput>;
}

impl<C> DynCommand for C
where
    C: Command,
{
    fn command_name(&self) -> CommandName {
        self.name()
    }

    fn execute_erased(&self, context: &CommandContextRef) -> CommandResult<ErasedOutput> {
        let output = self.execute(context)?;
        Ok(Box::new(output))
    }
}

impl std::fmt::Debug for dyn DynCommand + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynCommand")
            .field("name", &self.command_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{CommandContextFactory, StandardCommandContextFactory};

    struct CountDefinitions;

    impl Command for CountDefinitions {
        type Output = usize;

        fn execute(&self, _context: &CommandContextRef) -> CommandResult<usize> {
            Ok(3)
        }
    }

    #[test]
    fn default_name_is_the_type_name() {
        assert_eq!(CountDefinitions.name().as_ref(), "CountDefinitions");
    }

    #[test]
    fn erased_execution_boxes_output() {
        let command: &dyn DynCommand = &CountDefinitions;
        let context = StandardCommandContextFactory::new().create(command);

        let output = command.execute_erased(&context).unwrap();

        assert_eq!(output.downcast::<usize>().ok().map(|b| *b), Some(3));
    }
}
