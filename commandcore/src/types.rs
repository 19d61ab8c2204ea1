//! Core types for the `CommandCore` library.
//!
//! All types use smart constructors to ensure validity at construction time,
//! following the "parse, don't validate" principle.

use nutype::nutype;
use uuid::Uuid;

/// Identifier of one unit-of-work context.
///
/// `ContextId` values are guaranteed to be UUIDv7, which makes them roughly
/// ordered by the time the context was opened.
#[nutype(
    validate(predicate = |id: &Uuid| id.get_version() == Some(uuid::Version::SortRand)),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct ContextId(Uuid);

impl ContextId {
    /// Creates a new `ContextId` with the current timestamp.
    pub fn new() -> Self {
        // Uuid::now_v7() always yields a version 7 UUID
        Self::try_new(Uuid::now_v7()).expect("Uuid::now_v7() should always return a valid v7 UUID")
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

/// Name of a process engine.
///
/// Guaranteed to be non-empty and at most 255 characters after trimming.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 255),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        TryFrom,
        Serialize,
        Deserialize
    )
)]
pub struct EngineName(String);

impl EngineName {
    /// The name used when no engine name is configured.
    pub fn default_engine() -> Self {
        Self::try_new("default").expect("'default' is always a valid engine name")
    }
}

impl Default for EngineName {
    fn default() -> Self {
        Self::default_engine()
    }
}

/// Human readable name of a command, used in logs and errors.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 255),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        TryFrom,
        Serialize,
        Deserialize
    )
)]
pub struct CommandName(String);

impl CommandName {
    /// Derives a command name from a Rust type, dropping the module path and
    /// any generic arguments.
    pub fn of<T: ?Sized>() -> Self {
        let full = std::any::type_name::<T>();
        let without_generics = full.split('<').next().unwrap_or(full);
        let short = without_generics
            .rsplit("::")
            .next()
            .unwrap_or(without_generics);
        Self::try_new(short).unwrap_or_else(|_| Self::unnamed())
    }

    /// Placeholder for commands whose name cannot be derived.
    pub fn unnamed() -> Self {
        Self::try_new("<unnamed>").expect("'<unnamed>' is always a valid command name")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CreateDeployment;

    #[test]
    fn context_ids_are_unique() {
        let first = ContextId::new();
        let second = ContextId::new();

        assert_ne!(first, second);
    }

    #[test]
    fn context_id_rejects_non_v7_uuid() {
        assert!(ContextId::try_new(Uuid::nil()).is_err());
    }

    #[test]
    fn engine_name_is_trimmed_and_rejects_empty() {
        let name = EngineName::try_new("  engine-a  ").unwrap();
        assert_eq!(name.as_ref(), "engine-a");
        assert!(EngineName::try_new("   ").is_err());
    }

    #[test]
    fn command_name_of_uses_short_type_name() {
        assert_eq!(CommandName::of::<CreateDeployment>().as_ref(), "CreateDeployment");
        assert_eq!(CommandName::of::<Vec<String>>().as_ref(), "Vec");
    }
}
