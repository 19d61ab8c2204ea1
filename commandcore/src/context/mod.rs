//! Unit-of-work contexts.
//!
//! A context spans one command and every command nested inside it. It is
//! shared through a [`CommandContextRef`] by the frame that created it and by
//! every nested frame that reused it; only the creating frame closes it.
//!
//! A context moves through three states:
//!
//! ```text
//! Open ──record_exception──▶ Failed(cause)
//!   │                            │
//!   └──────────close─────────────┴──▶ Closed
//! ```
//!
//! The recorded cause stays readable after close through
//! [`CommandContext::exception`].

mod factory;
mod standard;

use std::fmt::Debug;
use std::sync::Arc;

use crate::errors::{CommandError, CommandResult};
use crate::types::{CommandName, ContextId};

pub use factory::{CommandContextFactory, StandardCommandContextFactory};
pub use standard::{CommandContextCloseListener, StandardCommandContext};

/// Shared handle to a context.
pub type CommandContextRef = Arc<dyn CommandContext>;

/// Observable lifecycle state of a context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextState {
    /// No failure recorded and not closed.
    Open,
    /// A failure was recorded; the context is not closed yet.
    Failed(CommandError),
    /// The context has been closed.
    Closed,
}

/// Contract every unit-of-work context fulfils.
///
/// Implementations must be safe to share between the creating frame and the
/// nested frames that reuse it, so all methods take `&self`.
pub trait CommandContext: Send + Sync + Debug {
    /// Identity of this unit of work.
    fn id(&self) -> ContextId;

    /// Name of the command the context was created for.
    fn command_name(&self) -> &CommandName;

    /// Current lifecycle state.
    fn state(&self) -> ContextState;

    /// The recorded failure, if any. Still available after close.
    fn exception(&self) -> Option<CommandError>;

    /// Records a failure. Only the first recorded failure is kept.
    fn record_exception(&self, error: CommandError);

    /// Closes the context.
    ///
    /// Closing an already closed context is a no-op.
    fn close(&self) -> CommandResult<()>;

    /// Whether a failure has been recorded.
    fn has_exception(&self) -> bool {
        self.exception().is_some()
    }

    /// Whether the context has been closed.
    fn is_closed(&self) -> bool {
        self.state() == ContextState::Closed
    }
}
