//! mysql-lane library
//!
//! A single-connection MySQL façade: one physical connection per
//! [`Connector`], one serialized lane per connection, automatic one-shot
//! retry of failed statements and transactional units of work.
//!
//! ```ignore
//! use mysql_lane::{ConnectionBuilder, params};
//! use mysql_lane::models::{TIMEOUT, UrlProtocol};
//!
//! let mut connector = ConnectionBuilder::new(UrlProtocol::JdbcMysql, "localhost", 3306, "root")
//!     .database("shop")
//!     .property(&TIMEOUT, Some(5))
//!     .build()?;
//! connector.establish("secret").await;
//!
//! let service = connector.service().ok_or(DbError::NotEstablished)?;
//! let name: Option<String> = service
//!     .query("SELECT name FROM users WHERE id = ?", params![1], |rows| {
//!         Ok(if rows.next() { Some(rows.try_get("name")?) } else { None })
//!     })
//!     .await?;
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod logger;
pub mod models;

pub use config::Config;
pub use db::{
    Connection, ConnectionBuilder, Connector, Driver, Lifecycle, MySqlDriver, Pending,
    QueryService, Repository, Session, TransmitOutcome,
};
pub use error::{DbError, DbResult, ServiceError};
pub use logger::{ConsoleLogger, Logger, TracingLogger};
