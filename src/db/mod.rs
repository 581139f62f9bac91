//! Database layer.
//!
//! This module provides:
//! - The driver seam and its sqlx MySQL implementation
//! - The serialized query lane
//! - Connection lifecycle, construction and chaining
//! - Type mappings and parameter binding

pub mod builder;
pub mod connector;
pub mod driver;
#[macro_use]
pub mod macros;
pub mod mysql;
pub mod params;
pub mod repository;
pub mod service;
pub mod types;

pub use builder::ConnectionBuilder;
pub use connector::Connector;
pub use driver::{Connection, Driver};
pub use mysql::{MySqlDriver, MySqlSession};
pub use repository::{Lifecycle, Repository};
pub use service::{Pending, QueryService, Session, TransmitOutcome};
