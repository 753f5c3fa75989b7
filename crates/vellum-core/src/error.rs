//! Engine error types.

use thiserror::Error;

/// Top-level engine error type.
///
/// Every variant describes a broken programming contract. Nothing in the
/// engine retries: errors propagate synchronously to the immediate caller.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A registry name is already bound to a different value.
    #[error("duplicate registration: `{name}` is already bound to a different value")]
    DuplicateRegistration {
        /// The contested registry name.
        name: String,
    },

    /// The encoder met a value it has no encoding for.
    #[error("unserializable value: {0}")]
    UnserializableValue(String),

    /// The decoder met data it cannot interpret.
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    /// A singleton link names nothing in the registry.
    #[error("unknown singleton: `{0}`")]
    UnknownSingleton(String),

    /// An operation was called in a state that does not permit it.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A field was written with a value of the wrong kind.
    #[error("type error: {0}")]
    Type(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_registration_names_the_key() {
        let err = EngineError::DuplicateRegistration {
            name: "Splash".to_owned(),
        };

        assert_eq!(
            err.to_string(),
            "duplicate registration: `Splash` is already bound to a different value"
        );
    }

    #[test]
    fn test_unknown_singleton_quotes_the_name() {
        let err = EngineError::UnknownSingleton("Missing".to_owned());

        assert_eq!(err.to_string(), "unknown singleton: `Missing`");
    }
}
