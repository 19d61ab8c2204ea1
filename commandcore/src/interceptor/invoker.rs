use super::CommandInterceptor;
use crate::ambient;
use crate::command::{CommandOutput, DynCommand};
use crate::config::CommandConfig;
use crate::context::CommandContext;
use crate::errors::{CommandError, CommandResult};

/// Terminal link: runs the command inside the active context.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandInvoker;

impl CommandInterceptor for CommandInvoker {
    fn execute(
        &self,
        _config: &CommandConfig,
        command: &dyn DynCommand,
    ) -> CommandResult<CommandOutput> {
        let context = ambient::command_context()?.ok_or_else(|| {
            CommandError::Internal(format!(
                "no active command context for '{}'",
                command.command_name()
            ))
        })?;

        if context.is_closed() {
            return Err(CommandError::ContextClosed(context.id()));
        }

        command.execute_erased(&context).map(Some)
    }
}
