//! The link that gives every command a unit-of-work context.
//!
//! On entry the interceptor either reuses the active context or asks the
//! factory for a new one. A context is reused only when all of these hold:
//!
//! - the call's [`CommandConfig`] allows reuse,
//! - a context is active on this thread,
//! - that context has no recorded exception.
//!
//! The last condition matters during compensation: after a failure, commands
//! such as "decrement job retries" must not run inside the failing context.
//!
//! The chosen context, the engine configuration and the engine's
//! compatibility handler are then published to [`crate::ambient`]. A failure
//! from the next link is recorded on the context and the call returns an
//! empty result. Teardown runs on every exit path, unwinding panics included:
//! the creating frame closes its context first, then the ambient slots are
//! unwound. The fallback compatibility handler stays installed.
//!
//! A panic from the next link counts as a failure: it is recorded on the
//! context before teardown, so close listeners take their `close_failure`
//! path. Close listeners must not panic themselves, since a second panic
//! during that unwind aborts the process.

use std::sync::Arc;

use tracing::{debug, error};

use super::{CommandInterceptor, InterceptorRef};
use crate::ambient::{self, AmbientScope};
use crate::command::{CommandOutput, DynCommand};
use crate::config::{CommandConfig, EngineConfiguration};
use crate::context::{CommandContext, CommandContextFactory, CommandContextRef};
use crate::errors::{CommandError, CommandResult};
use crate::types::CommandName;

/// Creates or reuses the unit-of-work context around the rest of the chain.
pub struct CommandContextInterceptor {
    factory: Arc<dyn CommandContextFactory>,
    engine: Arc<EngineConfiguration>,
    next: InterceptorRef,
}

impl CommandContextInterceptor {
    /// Creates the interceptor in front of `next`.
    pub fn new(
        factory: Arc<dyn CommandContextFactory>,
        engine: Arc<EngineConfiguration>,
        next: InterceptorRef,
    ) -> Self {
        Self {
            factory,
            engine,
            next,
        }
    }

    /// The factory used when no context can be reused.
    pub fn factory(&self) -> &Arc<dyn CommandContextFactory> {
        &self.factory
    }

    /// The engine configuration published for every call.
    pub const fn engine_configuration(&self) -> &Arc<EngineConfiguration> {
        &self.engine
    }

    fn resolve_context(
        &self,
        config: &CommandConfig,
        command: &dyn DynCommand,
    ) -> CommandResult<(CommandContextRef, bool)> {
        match ambient::command_context()? {
            Some(context) if config.is_context_reuse_possible() && !context.has_exception() => {
                debug!(
                    command = %command.command_name(),
                    context = %context.id(),
                    "Valid context found. Reusing it for the current command"
                );
                Ok((context, false))
            }
            _ => Ok((self.factory.create(command), true)),
        }
    }
}

impl CommandInterceptor for CommandContextInterceptor {
    fn execute(
        &self,
        config: &CommandConfig,
        command: &dyn DynCommand,
    ) -> CommandResult<CommandOutput> {
        let (context, owned) = self.resolve_context(config, command)?;

        let scope = match AmbientScope::publish(Arc::clone(&context), Arc::clone(&self.engine)) {
            Ok(scope) => scope,
            Err(publish_error) => {
                if owned {
                    close_owned(&context);
                }
                return Err(publish_error.into());
            }
        };
        let guard = ContextGuard {
            context: Arc::clone(&context),
            command: command.command_name(),
            owned,
            unwinding_at_entry: std::thread::panicking(),
            _scope: scope,
        };

        let output = match self.next.execute(config, command) {
            Ok(output) => output,
            Err(failure) => {
                debug!(
                    command = %command.command_name(),
                    context = %context.id(),
                    error = %failure,
                    "command failed; recording exception on its context"
                );
                context.record_exception(failure);
                None
            }
        };

        drop(guard);

        if owned && config.surface_failures {
            if let Some(recorded) = context.exception() {
                return Err(recorded);
            }
        }
        Ok(output)
    }
}

/// Teardown for one call.
///
/// `Drop` records a panic raised since the guard was built, then closes an
/// owned context; the `_scope` field is dropped afterwards, so nested
/// commands run by the close still see the context, and the ambient slots
/// are unwound even when the close panics.
struct ContextGuard {
    context: CommandContextRef,
    command: CommandName,
    owned: bool,
    unwinding_at_entry: bool,
    _scope: AmbientScope,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if std::thread::panicking() && !self.unwinding_at_entry {
            error!(
                command = %self.command,
                context = %self.context.id(),
                "command panicked; recording failure on its context"
            );
            self.context.record_exception(CommandError::Internal(format!(
                "command '{}' panicked",
                self.command
            )));
        }
        if self.owned {
            close_owned(&self.context);
        }
    }
}

fn close_owned(context: &CommandContextRef) {
    if let Err(close_error) = context.close() {
        error!(
            context = %context.id(),
            command = %context.command_name(),
            error = %close_error,
            "closing command context failed"
        );
    }
}
