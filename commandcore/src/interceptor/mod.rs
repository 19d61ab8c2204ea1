//! The interceptor chain.
//!
//! Every command travels through a chain of [`CommandInterceptor`] links.
//! Each link holds the next one and decides what happens around the call;
//! the last link, [`CommandInvoker`], runs the command itself.
//!
//! A typical chain:
//!
//! ```text
//! LogInterceptor ─▶ CommandContextInterceptor ─▶ CommandInvoker
//! ```

mod context;
mod invoker;
mod log;

use std::sync::Arc;

use crate::command::{CommandOutput, DynCommand};
use crate::config::CommandConfig;
use crate::errors::CommandResult;

pub use context::CommandContextInterceptor;
pub use invoker::CommandInvoker;
pub use log::LogInterceptor;

/// One link of the chain.
pub trait CommandInterceptor: Send + Sync {
    /// Executes `command`, usually by delegating to the next link.
    fn execute(&self, config: &CommandConfig, command: &dyn DynCommand)
        -> CommandResult<CommandOutput>;
}

/// Shared handle to a link.
pub type InterceptorRef = Arc<dyn CommandInterceptor>;

/// Builds a chain from the innermost link outwards.
///
/// ```rust,ignore
/// let head = InterceptorChain::new(CommandInvoker)
///     .wrap(|next| CommandContextInterceptor::new(factory, engine, next))
///     .wrap(LogInterceptor::new)
///     .build();
/// ```
pub struct InterceptorChain {
    head: InterceptorRef,
}

impl InterceptorChain {
    /// Starts a chain with its terminal link.
    pub fn new(terminal: impl CommandInterceptor + 'static) -> Self {
        Self {
            head: Arc::new(terminal),
        }
    }

    /// Puts a new link in front of the current head.
    #[must_use]
    pub fn wrap<F, I>(self, link: F) -> Self
    where
        F: FnOnce(InterceptorRef) -> I,
        I: CommandInterceptor + 'static,
    {
        Self {
            head: Arc::new(link(self.head)),
        }
    }

    /// The first link of the chain.
    pub fn build(self) -> InterceptorRef {
        self.head
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorChain").finish_non_exhaustive()
    }
}
