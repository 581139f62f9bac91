//! Seams between the lane and the wire.
//!
//! The lane only talks to a [`Connection`]; a [`Driver`] opens one. The sqlx
//! backed implementation lives in [`crate::db::mysql`], tests plug in their
//! own.

use crate::error::DbResult;
use crate::models::{ConnectionInfo, QueryParam, ResultSet};
use async_trait::async_trait;

/// One open database session.
///
/// Every method is invoked from the lane task only, one at a time.
#[async_trait]
pub trait Connection: Send {
    /// Run a statement and collect its rows.
    async fn fetch(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<ResultSet>;

    /// Run a statement and report the affected row count.
    async fn execute(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<u64>;

    async fn set_auto_commit(&mut self, enabled: bool) -> DbResult<()>;

    async fn commit(&mut self) -> DbResult<()>;

    async fn rollback(&mut self) -> DbResult<()>;

    /// Switch the session's default database.
    async fn set_catalog(&mut self, database: &str) -> DbResult<()>;

    /// Round-trip to the server.
    async fn ping(&mut self) -> DbResult<()>;

    /// Give up on a statement cut off by a deadline. The next call must not
    /// wait for the abandoned result.
    fn abandon(&mut self);

    /// Close the session. Closing twice is an error.
    async fn close(&mut self) -> DbResult<()>;

    fn is_closed(&self) -> bool;
}

/// Opens sessions for a [`ConnectionInfo`].
#[async_trait]
pub trait Driver: Send + Sync {
    async fn connect(
        &self,
        info: &ConnectionInfo,
        credential: &str,
    ) -> DbResult<Box<dyn Connection>>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}
