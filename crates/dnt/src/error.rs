// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for DNT table operations.

use crate::substrate::SubstrateError;
use thiserror::Error;

/// Errors returned by table, registry and codec operations.
///
/// # Example
///
/// ```rust
/// use dnt::{Error, LoopbackSubstrate, TableRegistry};
/// use std::sync::Arc;
///
/// let registry = TableRegistry::new(Arc::new(LoopbackSubstrate::new()));
/// registry.start_server()?;
///
/// let table = registry.subscribe("FromRobot")?;
/// match table.set_value("speed", "1.0") {
///     Err(Error::Directionality(name)) => println!("{} is read-only", name),
///     other => println!("unexpected: {:?}", other),
/// }
/// # Ok::<(), dnt::Error>(())
/// ```
#[derive(Debug, Error)]
pub enum Error {
    /// A mutation was attempted on a subscribed (read-only) table.
    #[error("Table is read-only: {0}")]
    Directionality(String),

    /// A wire payload could not be decoded.
    #[error("Malformed payload: {0}")]
    Format(String),

    /// A registry invariant would be violated.
    #[error("Invalid state: {0}")]
    State(String),

    /// The substrate could not be initialized or is not initialized yet.
    #[error("Connection error: {0}")]
    Connection(#[from] SubstrateError),

    /// A numeric accessor found text that does not parse.
    #[error("Cannot parse value of key {key:?} ({value:?}) as {expected}")]
    Parse {
        key: String,
        value: String,
        expected: &'static str,
    },

    /// Application code used a key reserved for the wire envelope.
    #[error("Key is reserved: {0}")]
    ReservedKey(String),

    /// The requested capability is declared but not available.
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    /// A client target is neither a team number nor a plausible address.
    #[error("Invalid IP address or team number: {0}")]
    InvalidAddress(String),

    /// Configuration could not be loaded or is inconsistent.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// Convenient alias for results using the crate [`Error`] type.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_message_names_key_and_type() {
        let err = Error::Parse {
            key: "speed".into(),
            value: "fast".into(),
            expected: "integer",
        };
        let msg = err.to_string();
        assert!(msg.contains("\"speed\""));
        assert!(msg.contains("\"fast\""));
        assert!(msg.contains("integer"));
    }

    #[test]
    fn test_substrate_error_converts_to_connection() {
        let err: Error = SubstrateError::NotInitialized.into();
        assert!(matches!(err, Error::Connection(SubstrateError::NotInitialized)));
    }
}
