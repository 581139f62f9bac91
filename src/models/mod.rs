//! Data models for the MySQL query lane.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod property;
pub mod query;

// Re-export commonly used types
pub use connection::{ConnectionInfo, UrlProtocol};
pub use property::{
    AUTO_RECONNECT, CHARACTER_ENCODING, KeyId, Properties, PropertyKey, PropertyType,
    PropertyValue, TIMEOUT,
};
pub use query::{QueryParam, ResultSet, Retry};
