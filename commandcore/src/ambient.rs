//! Thread-scoped ambient state.
//!
//! Nested commands find the active unit-of-work context and engine
//! configuration here instead of receiving them as arguments. Each thread
//! owns independent slots; nothing is shared across threads.
//!
//! | slot | shape | removed by the interceptor |
//! |------|-------|----------------------------|
//! | command context | stack | yes (pop) |
//! | engine configuration | stack | yes (pop) |
//! | override context | single value | yes (clear) |
//! | compatibility fallback | single value | never |
//!
//! Only the top of each stack is visible. Every operation returns an
//! [`AmbientResult`] because thread-local storage is unreachable while the
//! thread is being destroyed; removal on an empty slot is a no-op.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;
use std::thread::LocalKey;

use serde_json::{Map, Value};
use tracing::{trace, warn};

use crate::compatibility::CompatibilityHandler;
use crate::config::EngineConfiguration;
use crate::context::{CommandContext, CommandContextRef};
use crate::errors::{AmbientError, AmbientResult};
use crate::types::ContextId;

/// Property overrides set by nested commands for the current call.
pub type OverrideContext = Map<String, Value>;

thread_local! {
    static COMMAND_CONTEXT: RefCell<Vec<CommandContextRef>> = const { RefCell::new(Vec::new()) };
    static ENGINE_CONFIGURATION: RefCell<Vec<Arc<EngineConfiguration>>> =
        const { RefCell::new(Vec::new()) };
    static OVERRIDE_CONTEXT: RefCell<Option<OverrideContext>> = const { RefCell::new(None) };
    static FALLBACK_COMPATIBILITY_HANDLER: RefCell<Option<Arc<dyn CompatibilityHandler>>> =
        const { RefCell::new(None) };
}

fn with_slot<T, R>(
    key: &'static LocalKey<RefCell<T>>,
    slot: &'static str,
    f: impl FnOnce(&mut T) -> R,
) -> AmbientResult<R> {
    key.try_with(|cell| f(&mut cell.borrow_mut()))
        .map_err(|_| AmbientError::SlotUnavailable { slot })
}

/// The active command context, if any.
pub fn command_context() -> AmbientResult<Option<CommandContextRef>> {
    with_slot(&COMMAND_CONTEXT, "command_context", |stack| stack.last().cloned())
}

/// Makes `context` the active command context.
pub fn set_command_context(context: CommandContextRef) -> AmbientResult<()> {
    with_slot(&COMMAND_CONTEXT, "command_context", |stack| stack.push(context))
}

/// Removes the active command context, restoring the one below it.
pub fn remove_command_context() -> AmbientResult<Option<CommandContextRef>> {
    with_slot(&COMMAND_CONTEXT, "command_context", Vec::pop)
}

/// Number of command contexts currently stacked on this thread.
pub fn command_context_depth() -> AmbientResult<usize> {
    with_slot(&COMMAND_CONTEXT, "command_context", |stack| stack.len())
}

/// The active engine configuration, if any.
pub fn engine_configuration() -> AmbientResult<Option<Arc<EngineConfiguration>>> {
    with_slot(&ENGINE_CONFIGURATION, "engine_configuration", |stack| {
        stack.last().cloned()
    })
}

/// Makes `engine` the active engine configuration.
pub fn set_engine_configuration(engine: Arc<EngineConfiguration>) -> AmbientResult<()> {
    with_slot(&ENGINE_CONFIGURATION, "engine_configuration", |stack| {
        stack.push(engine);
    })
}

/// Removes the active engine configuration, restoring the one below it.
pub fn remove_engine_configuration() -> AmbientResult<Option<Arc<EngineConfiguration>>> {
    with_slot(&ENGINE_CONFIGURATION, "engine_configuration", Vec::pop)
}

/// The override context set by a command of the current call, if any.
pub fn override_context() -> AmbientResult<Option<OverrideContext>> {
    with_slot(&OVERRIDE_CONTEXT, "override_context", |slot| slot.clone())
}

/// Replaces the override context.
pub fn set_override_context(overrides: OverrideContext) -> AmbientResult<()> {
    with_slot(&OVERRIDE_CONTEXT, "override_context", |slot| {
        *slot = Some(overrides);
    })
}

/// Clears the override context.
pub fn remove_override_context() -> AmbientResult<Option<OverrideContext>> {
    with_slot(&OVERRIDE_CONTEXT, "override_context", Option::take)
}

/// The compatibility handler installed as this thread's fallback.
pub fn fallback_compatibility_handler() -> AmbientResult<Option<Arc<dyn CompatibilityHandler>>> {
    with_slot(
        &FALLBACK_COMPATIBILITY_HANDLER,
        "fallback_compatibility_handler",
        |slot| slot.clone(),
    )
}

/// Installs the fallback compatibility handler, replacing any previous one.
pub fn set_fallback_compatibility_handler(
    handler: Option<Arc<dyn CompatibilityHandler>>,
) -> AmbientResult<()> {
    with_slot(
        &FALLBACK_COMPATIBILITY_HANDLER,
        "fallback_compatibility_handler",
        |slot| *slot = handler,
    )
}

/// Clears the fallback compatibility handler.
///
/// The command context interceptor never calls this; legacy integrations
/// read the fallback after their command has returned.
pub fn remove_fallback_compatibility_handler(
) -> AmbientResult<Option<Arc<dyn CompatibilityHandler>>> {
    with_slot(
        &FALLBACK_COMPATIBILITY_HANDLER,
        "fallback_compatibility_handler",
        Option::take,
    )
}

/// Ambient state published for one call.
///
/// Created by [`AmbientScope::publish`] once every slot has been written.
/// Dropping it pops the command context and engine configuration and clears
/// the override context. The fallback compatibility handler is left alone.
///
/// The scope is bound to the thread that published it. Pops are positional:
/// a context pushed inside the scope and never removed is popped in place of
/// the published one, and the mismatch is logged at `warn`.
#[derive(Debug)]
#[must_use = "dropping the scope unwinds the ambient state immediately"]
pub struct AmbientScope {
    context: ContextId,
    engine: Arc<EngineConfiguration>,
    _thread_bound: PhantomData<*const ()>,
}

impl AmbientScope {
    /// Publishes `context`, then `engine`, then the engine's compatibility
    /// handler.
    ///
    /// # Errors
    ///
    /// Fails if any slot cannot be written. Slots already written by this
    /// call are rolled back first, so no partial state is left behind.
    pub fn publish(
        context: CommandContextRef,
        engine: Arc<EngineConfiguration>,
    ) -> AmbientResult<Self> {
        let context_id = context.id();
        set_command_context(context)?;

        if let Err(error) = set_engine_configuration(Arc::clone(&engine)) {
            let _ = remove_command_context();
            return Err(error);
        }

        if let Err(error) = set_fallback_compatibility_handler(engine.compatibility_handler()) {
            let _ = remove_engine_configuration();
            let _ = remove_command_context();
            return Err(error);
        }

        Ok(Self {
            context: context_id,
            engine,
            _thread_bound: PhantomData,
        })
    }
}

impl Drop for AmbientScope {
    fn drop(&mut self) {
        // failures here mean the thread's slots are already gone
        if let Ok(Some(popped)) = remove_command_context() {
            if popped.id() != self.context {
                warn!(
                    published = %self.context,
                    popped = %popped.id(),
                    "command context set inside the scope was never removed; unwinding out of order"
                );
            }
        }
        if let Ok(Some(popped)) = remove_engine_configuration() {
            if !Arc::ptr_eq(&popped, &self.engine) {
                warn!("engine configuration set inside the scope was never removed; unwinding out of order");
            }
        }
        let _ = remove_override_context();
        trace!("ambient command state unwound");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{CommandContext, StandardCommandContext};
    use crate::types::CommandName;
    use std::thread;
    use tracing_test::traced_test;

    #[derive(Debug)]
    struct LegacyHandler;

    impl CompatibilityHandler for LegacyHandler {
        fn name(&self) -> &str {
            "legacy"
        }
    }

    fn new_context() -> CommandContextRef {
        Arc::new(StandardCommandContext::new(
            CommandName::try_new("Ambient").unwrap(),
        ))
    }

    #[test]
    fn command_context_behaves_as_a_stack() {
        let outer = new_context();
        let inner = new_context();

        set_command_context(Arc::clone(&outer)).unwrap();
        set_command_context(Arc::clone(&inner)).unwrap();
        assert_eq!(command_context().unwrap().unwrap().id(), inner.id());

        remove_command_context().unwrap();
        assert_eq!(command_context().unwrap().unwrap().id(), outer.id());

        remove_command_context().unwrap();
        assert!(command_context().unwrap().is_none());
    }

    #[test]
    fn removing_from_empty_slots_is_a_noop() {
        assert!(remove_command_context().unwrap().is_none());
        assert!(remove_engine_configuration().unwrap().is_none());
        assert!(remove_override_context().unwrap().is_none());
        assert!(remove_fallback_compatibility_handler().unwrap().is_none());
    }

    #[test]
    fn scope_publishes_and_unwinds_everything_but_the_fallback() {
        let engine = EngineConfiguration::default()
            .with_compatibility_handler(Arc::new(LegacyHandler))
            .into_shared();
        let context = new_context();

        {
            let _scope = AmbientScope::publish(Arc::clone(&context), Arc::clone(&engine)).unwrap();
            set_override_context(Map::new()).unwrap();

            assert_eq!(command_context().unwrap().unwrap().id(), context.id());
            assert!(engine_configuration().unwrap().is_some());
            assert!(override_context().unwrap().is_some());
        }

        assert!(command_context().unwrap().is_none());
        assert!(engine_configuration().unwrap().is_none());
        assert!(override_context().unwrap().is_none());
        assert_eq!(
            fallback_compatibility_handler().unwrap().unwrap().name(),
            "legacy"
        );
        remove_fallback_compatibility_handler().unwrap();
    }

    #[test]
    #[traced_test]
    fn scope_warns_when_it_pops_a_context_it_did_not_publish() {
        let published = new_context();
        let stray = new_context();

        {
            let _scope = AmbientScope::publish(
                Arc::clone(&published),
                EngineConfiguration::default().into_shared(),
            )
            .unwrap();
            set_command_context(Arc::clone(&stray)).unwrap();
        }

        assert!(logs_contain("unwinding out of order"));
        // the stray context was popped in place of the published one
        assert_eq!(command_context().unwrap().unwrap().id(), published.id());
        remove_command_context().unwrap();
        remove_fallback_compatibility_handler().unwrap();
    }

    #[test]
    #[traced_test]
    fn balanced_scope_unwinds_quietly() {
        {
            let _scope = AmbientScope::publish(
                new_context(),
                EngineConfiguration::default().into_shared(),
            )
            .unwrap();
        }

        assert!(!logs_contain("unwinding out of order"));
        remove_fallback_compatibility_handler().unwrap();
    }

    #[test]
    fn threads_never_observe_each_others_context() {
        set_command_context(new_context()).unwrap();

        let seen_elsewhere = thread::spawn(|| command_context().unwrap().is_some())
            .join()
            .unwrap();

        assert!(!seen_elsewhere);
        remove_command_context().unwrap();
    }
}
