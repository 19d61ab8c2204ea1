//! Compatibility handler published as the thread's fallback.
//!
//! An engine may carry a handler that lets code written against an older
//! engine generation keep working. The context interceptor installs it into
//! the ambient store on every call and deliberately leaves it there after the
//! call returns, because legacy integrations look it up outside any command.

use std::fmt::Debug;

/// Handler that bridges commands to a legacy engine generation.
pub trait CompatibilityHandler: Send + Sync + Debug {
    /// Identifies the handler in logs.
    fn name(&self) -> &str;
}
