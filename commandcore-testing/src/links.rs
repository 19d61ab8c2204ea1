//! Scriptable chain links and collaborators.

use std::fmt;

use commandcore::{
    ambient, CommandConfig, CommandContextRef, CommandError, CommandInterceptor, CommandOutput,
    CommandResult, CompatibilityHandler, DynCommand, EngineName, ErasedOutput,
};
use parking_lot::Mutex;

type Script =
    dyn Fn(&CommandConfig, &dyn DynCommand) -> CommandResult<CommandOutput> + Send + Sync;

/// Ambient state seen by a [`ScriptedLink`] when it was called.
#[derive(Debug, Clone)]
pub struct Observation {
    /// The active command context.
    pub context: Option<CommandContextRef>,
    /// Name of the active engine configuration.
    pub engine_name: Option<EngineName>,
    /// Name of the installed fallback compatibility handler.
    pub fallback_handler: Option<String>,
    /// The configuration the link was called with.
    pub config: CommandConfig,
}

/// A next link whose behaviour is a closure.
///
/// Every call records an [`Observation`] before the script runs.
pub struct ScriptedLink {
    script: Box<Script>,
    observations: Mutex<Vec<Observation>>,
}

impl ScriptedLink {
    /// A link running `script`.
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&CommandConfig, &dyn DynCommand) -> CommandResult<CommandOutput>
            + Send
            + Sync
            + 'static,
    {
        Self {
            script: Box::new(script),
            observations: Mutex::new(Vec::new()),
        }
    }

    /// A link that always succeeds with a clone of `value`.
    pub fn returning<T>(value: T) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        Self::new(move |_, _| {
            let output: ErasedOutput = Box::new(value.clone());
            Ok(Some(output))
        })
    }

    /// A link that always fails with a clone of `error`.
    pub fn failing(error: CommandError) -> Self {
        Self::new(move |_, _| Err(error.clone()))
    }

    /// A link that panics with `message`.
    pub fn panicking(message: &'static str) -> Self {
        Self::new(move |_, _| panic!("{message}"))
    }

    /// Everything observed so far, oldest first.
    pub fn observations(&self) -> Vec<Observation> {
        self.observations.lock().clone()
    }

    /// How often the link was called.
    pub fn calls(&self) -> usize {
        self.observations.lock().len()
    }

    fn observe(config: &CommandConfig) -> Observation {
        Observation {
            context: ambient::command_context().ok().flatten(),
            engine_name: ambient::engine_configuration()
                .ok()
                .flatten()
                .map(|engine| engine.engine_name().clone()),
            fallback_handler: ambient::fallback_compatibility_handler()
                .ok()
                .flatten()
                .map(|handler| handler.name().to_string()),
            config: *config,
        }
    }
}

impl CommandInterceptor for ScriptedLink {
    fn execute(
        &self,
        config: &CommandConfig,
        command: &dyn DynCommand,
    ) -> CommandResult<CommandOutput> {
        let observation = Self::observe(config);
        self.observations.lock().push(observation);
        (self.script)(config, command)
    }
}

impl fmt::Debug for ScriptedLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedLink")
            .field("calls", &self.calls())
            .finish_non_exhaustive()
    }
}

/// Compatibility handler identified only by its name.
#[derive(Debug, Clone)]
pub struct RecordingCompatibilityHandler {
    name: String,
}

impl RecordingCompatibilityHandler {
    /// A handler called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl CompatibilityHandler for RecordingCompatibilityHandler {
    fn name(&self) -> &str {
        &self.name
    }
}
