//! Connection-related data models.
//!
//! This module defines the supported URL protocols and the description of
//! how to reach a database.

use crate::error::{DbError, DbResult};
use crate::models::property::{Properties, PropertyKey, PropertyType};
use std::fmt;
use std::str::FromStr;

/// Supported connection URL prefixes.
///
/// Reference: <https://dev.mysql.com/doc/connector-j/en/connector-j-reference-jdbc-url-format.html>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlProtocol {
    JdbcMysql,
    JdbcMysqlLoadBalance,
    JdbcMysqlReplication,
    Mysqlx,
    JdbcMysqlSrv,
    JdbcMysqlSrvLoadBalance,
    JdbcMysqlSrvReplication,
    MysqlxSrv,
}

impl UrlProtocol {
    pub fn all() -> [UrlProtocol; 8] {
        [
            Self::JdbcMysql,
            Self::JdbcMysqlLoadBalance,
            Self::JdbcMysqlReplication,
            Self::Mysqlx,
            Self::JdbcMysqlSrv,
            Self::JdbcMysqlSrvLoadBalance,
            Self::JdbcMysqlSrvReplication,
            Self::MysqlxSrv,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JdbcMysql => "jdbc:mysql:",
            Self::JdbcMysqlLoadBalance => "jdbc:mysql:loadbalance:",
            Self::JdbcMysqlReplication => "jdbc:mysql:replication:",
            Self::Mysqlx => "mysqlx:",
            Self::JdbcMysqlSrv => "jdbc:mysql+srv:",
            Self::JdbcMysqlSrvLoadBalance => "jdbc:mysql+srv:loadbalance:",
            // No trailing colon in the published prefix list
            Self::JdbcMysqlSrvReplication => "jdbc:mysql+srv:replication",
            Self::MysqlxSrv => "mysqlx+srv:",
        }
    }
}

impl fmt::Display for UrlProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UrlProtocol {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| DbError::invalid_input(format!("Unknown URL protocol: {}", s)))
    }
}

impl From<UrlProtocol> for String {
    fn from(protocol: UrlProtocol) -> Self {
        protocol.as_str().to_string()
    }
}

/// How to reach a database. Immutable apart from the database name.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    protocol: String,
    host: String,
    port: u16,
    database: Option<String>,
    user: String,
    properties: Properties,
}

impl ConnectionInfo {
    /// Create connection info. Protocol, host and user must be non-empty.
    pub fn new(
        protocol: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        database: Option<String>,
        user: impl Into<String>,
        properties: Properties,
    ) -> DbResult<Self> {
        let protocol = protocol.into();
        let host = host.into();
        let user = user.into();

        if protocol.trim().is_empty() {
            return Err(DbError::invalid_input("Protocol cannot be empty"));
        }
        if host.trim().is_empty() {
            return Err(DbError::invalid_input("Host cannot be empty"));
        }
        if user.trim().is_empty() {
            return Err(DbError::invalid_input("User cannot be empty"));
        }

        Ok(Self {
            protocol,
            host,
            port,
            database: normalize_database(database),
            user,
            properties,
        })
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// `host:port`, as used in log lines.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Stored value of `key`, else its default.
    pub fn property<T: PropertyType>(&self, key: &'static PropertyKey<T>) -> Option<T> {
        self.properties.get(key)
    }

    /// Change the target database. An empty name unsets it.
    pub fn set_database(&mut self, database: Option<String>) {
        self.database = normalize_database(database);
    }

    /// Render `protocol//host:port[/database][?k1=v1&k2=v2...]`.
    ///
    /// Properties appear in insertion order.
    pub fn render_url(&self) -> String {
        let mut url = format!("{}//{}:{}", self.protocol, self.host, self.port);
        if let Some(database) = &self.database {
            url.push('/');
            url.push_str(database);
        }
        for (idx, (name, value)) in self.properties.iter().enumerate() {
            url.push(if idx == 0 { '?' } else { '&' });
            url.push_str(name);
            url.push('=');
            url.push_str(&value.to_string());
        }
        url
    }
}

fn normalize_database(database: Option<String>) -> Option<String> {
    database.filter(|d| !d.is_empty())
}
