//! Public entry point for running commands.

use std::sync::Arc;

use crate::command::Command;
use crate::config::{CommandConfig, EngineConfiguration};
use crate::context::{CommandContextFactory, StandardCommandContextFactory};
use crate::errors::{CommandError, CommandResult};
use crate::interceptor::{
    CommandContextInterceptor, CommandInvoker, InterceptorChain, InterceptorRef, LogInterceptor,
};

/// Runs commands through an interceptor chain.
///
/// The executor carries a default [`CommandConfig`] and recovers each
/// command's typed output from the chain.
///
/// # Example
///
/// ```rust,ignore
/// use commandcore::{CommandExecutor, EngineConfiguration};
///
/// let executor = CommandExecutor::standard(EngineConfiguration::default().into_shared());
/// let retries = executor.execute(&DecrementRetries { job_id })?;
/// ```
pub struct CommandExecutor {
    default_config: CommandConfig,
    first: InterceptorRef,
}

impl CommandExecutor {
    /// Creates an executor over an already built chain.
    pub fn new(default_config: CommandConfig, first: InterceptorRef) -> Self {
        Self {
            default_config,
            first,
        }
    }

    /// The standard chain with [`StandardCommandContextFactory`]:
    /// logging, then context management, then invocation.
    pub fn standard(engine: Arc<EngineConfiguration>) -> Self {
        Self::with_factory(engine, Arc::new(StandardCommandContextFactory::new()))
    }

    /// The standard chain with a custom context factory.
    pub fn with_factory(
        engine: Arc<EngineConfiguration>,
        factory: Arc<dyn CommandContextFactory>,
    ) -> Self {
        let default_config = engine.default_command_config();
        let first = InterceptorChain::new(CommandInvoker)
            .wrap(|next| CommandContextInterceptor::new(factory, engine, next))
            .wrap(LogInterceptor::new)
            .build();
        Self::new(default_config, first)
    }

    /// Configuration used by [`CommandExecutor::execute`].
    pub const fn default_config(&self) -> CommandConfig {
        self.default_config
    }

    /// Executes `command` with the default configuration.
    ///
    /// Returns `Ok(None)` when a failure was absorbed into the command's
    /// context instead of being surfaced.
    pub fn execute<C>(&self, command: &C) -> CommandResult<Option<C::Output>>
    where
        C: Command,
    {
        self.execute_with_config(self.default_config, command)
    }

    /// Executes `command` with an explicit configuration.
    pub fn execute_with_config<C>(
        &self,
        config: CommandConfig,
        command: &C,
    ) -> CommandResult<Option<C::Output>>
    where
        C: Command,
    {
        let Some(output) = self.first.execute(&config, command)? else {
            return Ok(None);
        };
        output
            .downcast::<C::Output>()
            .map(|typed| Some(*typed))
            .map_err(|_| CommandError::UnexpectedOutput {
                command: command.name(),
            })
    }
}

impl std::fmt::Debug for CommandExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandExecutor")
            .field("default_config", &self.default_config)
            .finish_non_exhaustive()
    }
}
