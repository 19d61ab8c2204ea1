#![forbid(unsafe_code)]
#![deny(
    bad_style,
    deprecated,
    non_ascii_idents,
    rust_2018_idioms,
    trivial_casts,
    unconditional_recursion,
    unused_must_use,
    unused_parens
)]

//! Test doubles and contract suites for `commandcore`.
//!
//! - [`recording`]: a context and a factory that record every lifecycle call
//!   and what the ambient store looked like when it happened.
//! - [`links`]: a scriptable next link and a compatibility handler.
//! - [`teardown`]: runs code while a thread's locals are being destroyed,
//!   where ambient slots become unavailable.
//! - [`contract`]: checks any [`commandcore::CommandContext`] implementation
//!   against the lifecycle contract the interceptor relies on.

pub mod contract;
pub mod links;
pub mod recording;
pub mod teardown;

pub use contract::{run_command_context_contract, ContractTestFailure, ContractTestResult};
pub use links::{Observation, RecordingCompatibilityHandler, ScriptedLink};
pub use recording::{RecordingContext, RecordingFactory};
pub use teardown::run_during_thread_teardown;
