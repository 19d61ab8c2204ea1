//! Lifecycle contract for `CommandContext` implementations.
//!
//! The context interceptor relies on every context behaving the same way:
//! fresh contexts are open, the first recorded exception wins and survives
//! close, and closing twice is harmless. [`run_command_context_contract`]
//! checks all of it against contexts produced by a caller-supplied function.

use std::fmt;

use commandcore::{CommandContext, CommandContextRef, CommandError, ContextState};

/// A contract scenario that did not hold.
#[derive(Debug)]
pub struct ContractTestFailure {
    scenario: &'static str,
    detail: String,
}

impl ContractTestFailure {
    fn new(scenario: &'static str, detail: impl Into<String>) -> Self {
        Self {
            scenario,
            detail: detail.into(),
        }
    }

    fn context_error(scenario: &'static str, operation: &'static str, error: &CommandError) -> Self {
        Self::new(
            scenario,
            format!("{operation} operation returned unexpected error: {error}"),
        )
    }
}

impl fmt::Display for ContractTestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.scenario, self.detail)
    }
}

impl std::error::Error for ContractTestFailure {}

/// Outcome of one contract run.
pub type ContractTestResult = Result<(), ContractTestFailure>;

fn contract_error(label: &str) -> CommandError {
    CommandError::Internal(format!("contract {label}"))
}

fn ensure(scenario: &'static str, holds: bool, detail: impl FnOnce() -> String) -> ContractTestResult {
    if holds {
        Ok(())
    } else {
        Err(ContractTestFailure::new(scenario, detail()))
    }
}

fn fresh_context_is_open(context: &CommandContextRef) -> ContractTestResult {
    const SCENARIO: &str = "fresh_context_is_open";
    let state = context.state();
    ensure(SCENARIO, state == ContextState::Open, || {
        format!("expected Open, found {state:?}")
    })?;
    ensure(SCENARIO, !context.has_exception(), || {
        "fresh context reports an exception".to_string()
    })
}

fn first_exception_wins(context: &CommandContextRef) -> ContractTestResult {
    const SCENARIO: &str = "first_exception_wins";
    context.record_exception(contract_error("first"));
    context.record_exception(contract_error("second"));

    let recorded = context.exception();
    ensure(SCENARIO, recorded == Some(contract_error("first")), || {
        format!("expected the first exception to be kept, found {recorded:?}")
    })?;
    let state = context.state();
    ensure(
        SCENARIO,
        state == ContextState::Failed(contract_error("first")),
        || format!("expected Failed state, found {state:?}"),
    )
}

fn exception_survives_close(context: &CommandContextRef) -> ContractTestResult {
    const SCENARIO: &str = "exception_survives_close";
    context.record_exception(contract_error("cause"));
    context
        .close()
        .map_err(|error| ContractTestFailure::context_error(SCENARIO, "close", &error))?;

    ensure(SCENARIO, context.is_closed(), || {
        "context is not closed after close()".to_string()
    })?;
    let recorded = context.exception();
    ensure(SCENARIO, recorded == Some(contract_error("cause")), || {
        format!("recorded exception lost on close, found {recorded:?}")
    })
}

fn close_is_idempotent(context: &CommandContextRef) -> ContractTestResult {
    const SCENARIO: &str = "close_is_idempotent";
    context
        .close()
        .map_err(|error| ContractTestFailure::context_error(SCENARIO, "first close", &error))?;
    context
        .close()
        .map_err(|error| ContractTestFailure::context_error(SCENARIO, "second close", &error))?;
    ensure(SCENARIO, context.state() == ContextState::Closed, || {
        "context reopened after a second close".to_string()
    })
}

fn contexts_are_distinct(first: &CommandContextRef, second: &CommandContextRef) -> ContractTestResult {
    ensure("contexts_are_distinct", first.id() != second.id(), || {
        format!("two contexts share the id {}", first.id())
    })
}

/// Runs every scenario, each against a context from `make_context`.
///
/// # Errors
///
/// Returns the first scenario that does not hold.
pub fn run_command_context_contract<F>(make_context: F) -> ContractTestResult
where
    F: Fn() -> CommandContextRef,
{
    fresh_context_is_open(&make_context())?;
    first_exception_wins(&make_context())?;
    exception_survives_close(&make_context())?;
    close_is_idempotent(&make_context())?;
    contexts_are_distinct(&make_context(), &make_context())
}
