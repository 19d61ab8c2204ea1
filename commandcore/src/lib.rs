//! `CommandCore` - command execution with reusable unit-of-work contexts
//!
//! Commands run through a chain of interceptors. The
//! [`CommandContextInterceptor`] gives each command a unit-of-work context:
//! it reuses the context of an enclosing command when allowed, creates one
//! otherwise, publishes it to thread-scoped [`ambient`] state for nested
//! commands, records failures on it, and tears everything down on exit.
//! Only the frame that created a context ever closes it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod ambient;
pub mod command;
pub mod compatibility;
pub mod config;
pub mod context;
pub mod errors;
pub mod executor;
pub mod interceptor;
pub mod types;

pub use command::{Command, CommandOutput, DynCommand, ErasedOutput};
pub use compatibility::CompatibilityHandler;
pub use config::{CommandConfig, EngineConfiguration, EngineSettings};
pub use context::{
    CommandContext, CommandContextCloseListener, CommandContextFactory, CommandContextRef,
    ContextState, StandardCommandContext, StandardCommandContextFactory,
};
pub use errors::{AmbientError, AmbientResult, CommandError, CommandResult};
pub use executor::CommandExecutor;
pub use interceptor::{
    CommandContextInterceptor, CommandInterceptor, CommandInvoker, InterceptorChain,
    InterceptorRef, LogInterceptor,
};
pub use types::{CommandName, ContextId, EngineName};
