//! Connector construction.

use crate::db::connector::Connector;
use crate::db::driver::Driver;
use crate::db::mysql::MySqlDriver;
use crate::error::DbResult;
use crate::logger::{self, Logger};
use crate::models::{ConnectionInfo, Properties, PropertyKey, PropertyType};
use std::sync::Arc;
use std::time::Duration;

/// Accumulates everything a [`Connector`] needs. `build` does no I/O.
///
/// # Example
///
/// ```ignore
/// let connector = ConnectionBuilder::new(UrlProtocol::JdbcMysql, "localhost", 3306, "root")
///     .database("shop")
///     .property(&TIMEOUT, Some(5))
///     .build()?;
/// assert_eq!(
///     connector.connection_info().render_url(),
///     "jdbc:mysql://localhost:3306/shop?connect timeout=5"
/// );
/// ```
pub struct ConnectionBuilder {
    protocol: String,
    host: String,
    port: u16,
    database: Option<String>,
    user: String,
    properties: Properties,
    logger: Option<Arc<dyn Logger>>,
    driver: Option<Arc<dyn Driver>>,
    statement_timeout: Option<Duration>,
}

impl ConnectionBuilder {
    /// `protocol` accepts a [`crate::models::UrlProtocol`] or a raw prefix.
    pub fn new(
        protocol: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
    ) -> Self {
        Self {
            protocol: protocol.into(),
            host: host.into(),
            port,
            database: None,
            user: user.into(),
            properties: Properties::new(),
            logger: None,
            driver: None,
            statement_timeout: None,
        }
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set a typed property. `None` removes it.
    pub fn property<T: PropertyType>(
        mut self,
        key: &'static PropertyKey<T>,
        value: Option<T>,
    ) -> Self {
        self.properties.set(key, value);
        self
    }

    /// Route lifecycle messages to `logger`, each prefixed with `[MySQL] `.
    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Replace the bundled [`MySqlDriver`].
    pub fn driver(mut self, driver: Arc<dyn Driver>) -> Self {
        self.driver = Some(driver);
        self
    }

    /// Bound every statement attempt. Off by default.
    pub fn statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> DbResult<Connector> {
        let info = ConnectionInfo::new(
            self.protocol,
            self.host,
            self.port,
            self.database,
            self.user,
            self.properties,
        )?;
        let driver = self
            .driver
            .unwrap_or_else(|| Arc::new(MySqlDriver::new()));

        Ok(Connector::new(
            info,
            driver,
            logger::resolve(self.logger),
            self.statement_timeout,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::models::{AUTO_RECONNECT, TIMEOUT, UrlProtocol};

    #[test]
    fn test_build_renders_url() {
        let connector = ConnectionBuilder::new(UrlProtocol::JdbcMysql, "localhost", 3306, "root")
            .database("shop")
            .property(&TIMEOUT, Some(5))
            .build()
            .unwrap();

        assert_eq!(
            connector.connection_info().render_url(),
            "jdbc:mysql://localhost:3306/shop?connect timeout=5"
        );
        assert!(connector.service().is_none());
        assert!(connector.established_at().is_none());
    }

    #[test]
    fn test_property_none_removes() {
        let connector = ConnectionBuilder::new("jdbc:mysql:", "db", 3307, "app")
            .property(&AUTO_RECONNECT, Some(true))
            .property(&AUTO_RECONNECT, None)
            .build()
            .unwrap();

        assert!(connector.connection_info().properties().is_empty());
        assert_eq!(connector.connection_info().render_url(), "jdbc:mysql://db:3307");
    }

    #[test]
    fn test_build_rejects_missing_user() {
        let result = ConnectionBuilder::new(UrlProtocol::JdbcMysql, "localhost", 3306, "").build();
        assert!(matches!(result, Err(DbError::InvalidInput { .. })));
    }
}
