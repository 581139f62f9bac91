//! sqlx-backed MySQL driver.
//!
//! One physical `MySqlConnection` per session, no pool. Connection
//! properties map onto sqlx as follows:
//! - `TIMEOUT` bounds the connect handshake (0 disables the deadline)
//! - `CHARACTER_ENCODING` becomes the session charset
//! - `AUTO_RECONNECT` reopens the link before the next statement after an
//!   I/O-class failure or an expired statement deadline, but never while a
//!   transaction is open: the server discarded it along with the old link

use crate::db::driver::{Connection, Driver};
use crate::db::params::bind_all;
use crate::db::types::into_result_set;
use crate::error::{DbError, DbResult};
use crate::models::{
    AUTO_RECONNECT, CHARACTER_ENCODING, ConnectionInfo, QueryParam, ResultSet, TIMEOUT,
    UrlProtocol,
};
use async_trait::async_trait;
use sqlx::Connection as _;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use std::time::Duration;
use tracing::{debug, warn};

/// Opens sqlx MySQL sessions. Accepts the `jdbc:mysql:` protocol only.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDriver;

impl MySqlDriver {
    pub fn new() -> Self {
        Self
    }

    fn connect_options(info: &ConnectionInfo, credential: &str) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new()
            .host(info.host())
            .port(info.port())
            .username(info.user())
            .password(credential);

        if let Some(database) = info.database() {
            options = options.database(database);
        }
        if let Some(charset) = info.property(&CHARACTER_ENCODING) {
            options = options.charset(&charset);
        }
        options
    }
}

#[async_trait]
impl Driver for MySqlDriver {
    async fn connect(
        &self,
        info: &ConnectionInfo,
        credential: &str,
    ) -> DbResult<Box<dyn Connection>> {
        if info.protocol() != UrlProtocol::JdbcMysql.as_str() {
            return Err(DbError::connection(
                format!("Unsupported URL protocol: {}", info.protocol()),
                format!("The bundled driver only speaks {}", UrlProtocol::JdbcMysql),
            ));
        }

        let options = Self::connect_options(info, credential);
        let connect_timeout = info
            .property(&TIMEOUT)
            .filter(|secs| *secs > 0)
            .map(|secs| Duration::from_secs(secs.into()));
        let auto_reconnect = info.property(&AUTO_RECONNECT).unwrap_or(false);

        let conn = open(&options, connect_timeout).await?;
        debug!(url = %info.render_url(), "Opened MySQL session");

        Ok(Box::new(MySqlSession {
            inner: Some(conn),
            options,
            connect_timeout,
            auto_reconnect,
            auto_commit: true,
            closed: false,
        }))
    }

    fn name(&self) -> &'static str {
        "mysql"
    }
}

async fn open(
    options: &MySqlConnectOptions,
    deadline: Option<Duration>,
) -> DbResult<MySqlConnection> {
    let connect = MySqlConnection::connect_with(options);
    let result = match deadline {
        Some(deadline) => tokio::time::timeout(deadline, connect)
            .await
            .map_err(|_| DbError::timeout("connect", deadline.as_secs()))?,
        None => connect.await,
    };

    result.map_err(|e| {
        if matches!(&e, sqlx::Error::Io(io) if io.kind() == std::io::ErrorKind::TimedOut) {
            return DbError::from(e);
        }
        DbError::connection(format!("Failed to connect: {}", e), connection_suggestion(&e))
    })
}

/// Generate a helpful suggestion for connection errors.
fn connection_suggestion(error: &sqlx::Error) -> String {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") {
        return "Check that the MySQL server is running and accessible".to_string();
    }
    if error_str.contains("access denied") || error_str.contains("password") {
        return "Verify the user name and password".to_string();
    }
    if error_str.contains("unknown database") {
        return "Check that the database name exists".to_string();
    }
    if error_str.contains("tls") || error_str.contains("ssl") {
        return "Check TLS/SSL configuration or try disabling it".to_string();
    }
    "Verify host, port and connection properties".to_string()
}

/// Errors after which the socket can no longer be trusted.
fn breaks_link(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Io(_) | sqlx::Error::Protocol(_) | sqlx::Error::Tls(_) | sqlx::Error::WorkerCrashed
    )
}

fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// A single MySQL session.
pub struct MySqlSession {
    /// `None` once the link broke or the session was closed.
    inner: Option<MySqlConnection>,
    options: MySqlConnectOptions,
    connect_timeout: Option<Duration>,
    auto_reconnect: bool,
    auto_commit: bool,
    closed: bool,
}

impl MySqlSession {
    async fn live(&mut self) -> DbResult<&mut MySqlConnection> {
        if self.closed {
            return Err(DbError::ConnectionClosed);
        }
        if self.inner.is_none() {
            if !self.can_reconnect() {
                return Err(DbError::ConnectionClosed);
            }
            debug!("Reconnecting MySQL session");
            self.inner = Some(open(&self.options, self.connect_timeout).await?);
        }
        self.inner
            .as_mut()
            .ok_or_else(|| DbError::internal("MySQL session vanished after reconnect"))
    }

    /// A reopened link would silently continue a transaction whose earlier
    /// statements died with the old one.
    fn can_reconnect(&self) -> bool {
        self.auto_reconnect && self.auto_commit
    }

    fn link_lost(&self) -> bool {
        !self.closed && self.inner.is_none()
    }

    fn track<T>(&mut self, result: Result<T, sqlx::Error>) -> DbResult<T> {
        result.map_err(|e| {
            if breaks_link(&e) {
                warn!(error = %e, "MySQL link broke, dropping session");
                self.inner = None;
            }
            DbError::from(e)
        })
    }

    async fn run_raw(&mut self, sql: &str) -> DbResult<()> {
        let conn = self.live().await?;
        let result = sqlx::Executor::execute(conn, sqlx::raw_sql(sql)).await;
        self.track(result).map(|_| ())
    }
}

#[async_trait]
impl Connection for MySqlSession {
    async fn fetch(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<ResultSet> {
        let conn = self.live().await?;
        let result = bind_all(sql, params).fetch_all(conn).await;
        let rows = self.track(result)?;
        Ok(into_result_set(&rows))
    }

    async fn execute(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<u64> {
        let conn = self.live().await?;
        let result = bind_all(sql, params).execute(conn).await;
        Ok(self.track(result)?.rows_affected())
    }

    async fn set_auto_commit(&mut self, enabled: bool) -> DbResult<()> {
        // Autocommit is the server default, a reopened link starts with it
        if enabled && self.link_lost() {
            self.auto_commit = true;
            return Ok(());
        }
        let sql = if enabled {
            "SET autocommit = 1"
        } else {
            "SET autocommit = 0"
        };
        self.run_raw(sql).await?;
        self.auto_commit = enabled;
        Ok(())
    }

    async fn commit(&mut self) -> DbResult<()> {
        self.run_raw("COMMIT").await
    }

    async fn rollback(&mut self) -> DbResult<()> {
        if self.link_lost() {
            debug!("MySQL link lost mid-transaction, nothing left to roll back");
            return Ok(());
        }
        self.run_raw("ROLLBACK").await
    }

    async fn set_catalog(&mut self, database: &str) -> DbResult<()> {
        if database.is_empty() {
            return Err(DbError::invalid_input("Database name cannot be empty"));
        }
        self.run_raw(&format!("USE {}", quote_identifier(database)))
            .await
    }

    async fn ping(&mut self) -> DbResult<()> {
        let conn = self.live().await?;
        let result = conn.ping().await;
        self.track(result)
    }

    fn abandon(&mut self) {
        // sqlx would drain the cut-off result before the next command
        if self.inner.take().is_some() {
            warn!("Statement deadline expired, dropping MySQL link");
        }
    }

    async fn close(&mut self) -> DbResult<()> {
        if self.closed {
            return Err(DbError::ConnectionClosed);
        }
        self.closed = true;
        match self.inner.take() {
            Some(conn) => conn.close().await.map_err(DbError::from),
            None => Ok(()),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed || (self.inner.is_none() && !self.can_reconnect())
    }
}
