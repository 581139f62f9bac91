//! Connection lifecycle.
//!
//! A [`Connector`] holds at most one [`QueryService`]. The service's lane is
//! the only owner of the live connection, so "a service exists" and "the
//! connection is established" are the same fact. Lifecycle failures are
//! reported through the logger and never returned; callers re-check
//! [`Connector::is_established`].

use crate::db::driver::Driver;
use crate::db::service::QueryService;
use crate::error::DbResult;
use crate::logger::Logger;
use crate::models::ConnectionInfo;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

pub struct Connector {
    info: ConnectionInfo,
    driver: Arc<dyn Driver>,
    logger: Arc<dyn Logger>,
    statement_timeout: Option<Duration>,
    service: Option<QueryService>,
    established_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("url", &self.info.render_url())
            .field("driver", &self.driver.name())
            .field("service", &self.service)
            .field("established_at", &self.established_at)
            .finish()
    }
}

impl Connector {
    pub(crate) fn new(
        info: ConnectionInfo,
        driver: Arc<dyn Driver>,
        logger: Arc<dyn Logger>,
        statement_timeout: Option<Duration>,
    ) -> Self {
        Self {
            info,
            driver,
            logger,
            statement_timeout,
            service: None,
            established_at: None,
        }
    }

    /// True iff a service exists and a ping through its lane succeeds.
    ///
    /// The ping queues behind every statement already on the lane, so this
    /// (and with it [`Connector::establish`] and [`Connector::close`]) waits
    /// for them. Without a statement timeout a hung statement blocks it
    /// indefinitely.
    pub async fn is_established(&self) -> bool {
        match &self.service {
            Some(service) => service.ping().await.is_ok(),
            None => false,
        }
    }

    /// Open the connection and start a fresh [`QueryService`].
    ///
    /// No-op (with a warning) when already established.
    pub async fn establish(&mut self, credential: &str) {
        if self.is_established().await {
            self.logger
                .warning("Failed to establish connection: Connection is already established");
            return;
        }

        let address = self.info.address();
        self.logger
            .info(&format!("Establishing connection to '{}'", address));
        let started = Instant::now();

        match self.open(credential).await {
            Ok(service) => {
                debug!(lane = %service.id(), driver = self.driver.name(), "Connection established");
                self.service = Some(service);
                self.established_at = Some(Utc::now());
                self.logger.info(&format!(
                    "Successfully established connection to '{}' ({} ms)",
                    address,
                    started.elapsed().as_millis()
                ));
            }
            Err(e) => {
                self.service = None;
                self.established_at = None;
                let message = if e.is_timeout() {
                    format!(
                        "Timed out establishing connection to '{}' ({} ms)",
                        address,
                        started.elapsed().as_millis()
                    )
                } else {
                    format!("Failed to establish connection to '{}'", address)
                };
                self.logger.severe_with_cause(&message, &e);
            }
        }
    }

    async fn open(&self, credential: &str) -> DbResult<QueryService> {
        let mut conn = self.driver.connect(&self.info, credential).await?;
        conn.set_auto_commit(true).await?;
        Ok(QueryService::start(conn, self.statement_timeout))
    }

    /// Close the connection and drop the service.
    ///
    /// No-op (with a warning) when not established. If closing fails the
    /// service is kept and the state is indeterminate; re-check with
    /// [`Connector::is_established`].
    pub async fn close(&mut self) {
        if !self.is_established().await {
            // The link died on its own; a leftover service would outlive it
            if let Some(service) = self.service.take() {
                debug!(lane = %service.id(), "Dropping service of a dead connection");
            }
            self.established_at = None;
            self.logger
                .warning("Failed to close connection: Connection is already closed");
            return;
        }
        let Some(service) = self.service.clone() else {
            return;
        };

        let address = self.info.address();
        self.logger
            .info(&format!("Closing connection to '{}'", address));
        let started = Instant::now();

        match service.shutdown().await {
            Ok(()) => {
                self.service = None;
                self.established_at = None;
                self.logger.info(&format!(
                    "Successfully closed connection to '{}' ({} ms)",
                    address,
                    started.elapsed().as_millis()
                ));
            }
            Err(e) => {
                self.logger.severe_with_cause(
                    &format!("Failed to close connection to '{}'", address),
                    &e,
                );
            }
        }
    }

    /// Change the target database.
    ///
    /// When established and `database` is set, the live session switches too.
    /// A failed switch is logged; the new name is kept either way.
    pub async fn set_database(&mut self, database: Option<String>) {
        self.info.set_database(database);

        let (Some(service), Some(database)) = (&self.service, self.info.database()) else {
            return;
        };
        if let Err(e) = service.use_database(database).await {
            self.logger.severe_with_cause(
                &format!("Failed to switch to database '{}'", database),
                &e,
            );
        }
    }

    /// The current service, if established.
    pub fn service(&self) -> Option<QueryService> {
        self.service.clone()
    }

    pub fn connection_info(&self) -> &ConnectionInfo {
        &self.info
    }

    /// When the current connection was opened.
    pub fn established_at(&self) -> Option<DateTime<Utc>> {
        self.established_at
    }
}
