use tracing::{debug, debug_span};

use super::{CommandInterceptor, InterceptorRef};
use crate::command::{CommandOutput, DynCommand};
use crate::config::CommandConfig;
use crate::errors::CommandResult;

/// Logs the start and end of every command inside a `command` span.
pub struct LogInterceptor {
    next: InterceptorRef,
}

impl LogInterceptor {
    /// Wraps `next`.
    pub fn new(next: InterceptorRef) -> Self {
        Self { next }
    }
}

impl CommandInterceptor for LogInterceptor {
    fn execute(
        &self,
        config: &CommandConfig,
        command: &dyn DynCommand,
    ) -> CommandResult<CommandOutput> {
        let name = command.command_name();
        let span = debug_span!("command", command = %name);
        let _entered = span.enter();

        debug!("--- starting {name} ---");
        let result = self.next.execute(config, command);
        match &result {
            Ok(Some(_)) => debug!("--- {name} finished ---"),
            Ok(None) => debug!("--- {name} finished without a result ---"),
            Err(error) => debug!(%error, "--- {name} failed ---"),
        }
        result
    }
}
