//! Error types for `CommandCore`.
//!
//! Two families of errors exist:
//!
//! - **`CommandError`**: anything a command, a chain link or a context can
//!   report. It is `Clone` because a context keeps the recorded failure while
//!   the interceptor may still hand a copy back to its caller.
//! - **`AmbientError`**: the thread-scoped ambient store could not be reached,
//!   which only happens while the owning thread is being torn down.
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use commandcore::errors::{CommandError, CommandResult};
//!
//! fn suspend(definition: &Definition) -> CommandResult<()> {
//!     if definition.is_suspended() {
//!         return Err(CommandError::BusinessRuleViolation(
//!             "definition already suspended".to_string(),
//!         ));
//!     }
//!     Ok(())
//! }
//! ```

use crate::types::{CommandName, ContextId};
use thiserror::Error;

/// Errors that can occur while executing a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The command's own logic failed.
    #[error("Command '{command}' failed: {message}")]
    Failed {
        /// The command that failed
        command: CommandName,
        /// What went wrong
        message: String,
    },

    /// A business rule was violated during command execution.
    #[error("Business rule violation: {0}")]
    BusinessRuleViolation(String),

    /// The context was used after it had been closed.
    #[error("Command context {0} is already closed")]
    ContextClosed(ContextId),

    /// Closing a context failed.
    #[error("Closing command context {context} failed: {message}")]
    CloseFailed {
        /// The context whose close failed
        context: ContextId,
        /// What went wrong
        message: String,
    },

    /// The ambient store could not be read or written.
    #[error("Ambient state unavailable: {0}")]
    AmbientUnavailable(#[from] AmbientError),

    /// The chain returned a value of a different type than the command declares.
    #[error("Command '{command}' produced an output of an unexpected type")]
    UnexpectedOutput {
        /// The command whose output could not be downcast
        command: CommandName,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CommandError {
    /// Shorthand for [`CommandError::Failed`].
    pub fn failed(command: CommandName, message: impl Into<String>) -> Self {
        Self::Failed {
            command,
            message: message.into(),
        }
    }
}

/// The ambient store is unreachable for the current thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AmbientError {
    /// Thread-local storage has already been destroyed.
    #[error("thread-local slot '{slot}' is no longer accessible")]
    SlotUnavailable {
        /// The slot that could not be reached
        slot: &'static str,
    },
}

/// Type alias for command execution results.
pub type CommandResult<T> = Result<T, CommandError>;

/// Type alias for ambient store results.
pub type AmbientResult<T> = Result<T, AmbientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_error_message_names_command() {
        let error = CommandError::failed(CommandName::try_new("SetRetries").unwrap(), "boom");

        assert_eq!(error.to_string(), "Command 'SetRetries' failed: boom");
    }

    #[test]
    fn ambient_error_converts_into_command_error() {
        let error: CommandError = AmbientError::SlotUnavailable { slot: "command_context" }.into();

        assert!(matches!(error, CommandError::AmbientUnavailable(_)));
        assert!(error.to_string().contains("command_context"));
    }
}
