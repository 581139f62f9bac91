//! Serialized statement execution.
//!
//! A [`QueryService`] is a cloneable handle onto a *lane*: one tokio task
//! that exclusively owns the connection and drains a queue of jobs in
//! submission order. Every public operation enqueues its job before
//! returning, so call order is execution order even if the returned
//! [`Pending`] futures are polled in a different order (or never).
//!
//! Statements are retried once by default. A failure during binding,
//! execution or row mapping re-runs the whole statement; a second failure
//! surfaces as [`DbError::Execution`]. A closed connection or a blank
//! statement is rejected immediately without a retry.

use crate::db::driver::Connection;
use crate::error::{DbError, DbResult, ServiceError};
use crate::models::{QueryParam, ResultSet, Retry};
use futures_util::future::BoxFuture;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use uuid::Uuid;

type Job = Box<dyn for<'a> FnOnce(&'a mut Lane) -> BoxFuture<'a, ()> + Send>;

fn job<F>(f: F) -> Job
where
    F: for<'a> FnOnce(&'a mut Lane) -> BoxFuture<'a, ()> + Send + 'static,
{
    Box::new(f)
}

/// State owned by the lane task.
struct Lane {
    session: Session,
    stopped: bool,
}

async fn run(mut lane: Lane, mut jobs: mpsc::UnboundedReceiver<Job>) {
    let id = lane.session.lane.clone();
    debug!(lane = %id, "Query lane started");

    while let Some(job) = jobs.recv().await {
        job(&mut lane).await;
        if lane.stopped {
            break;
        }
    }

    // Dropping the receiver fails every job still queued
    debug!(lane = %id, "Query lane stopped");
}

/// Result of a statement that was handed to the lane.
///
/// The work is already queued; awaiting only collects the reply. Resolves to
/// [`DbError::ConnectionClosed`] if the lane stopped before answering.
#[must_use = "the statement runs regardless, but its result is lost unless awaited"]
pub struct Pending<T> {
    rx: oneshot::Receiver<DbResult<T>>,
}

impl<T> Pending<T> {
    /// Block the current thread until the lane answers.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context.
    pub fn wait(self) -> Result<T, ServiceError> {
        match self.rx.blocking_recv() {
            Ok(result) => result.map_err(ServiceError::from),
            Err(_) => Err(ServiceError::new(DbError::ConnectionClosed)),
        }
    }
}

impl<T> Future for Pending<T> {
    type Output = DbResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|reply| reply.unwrap_or_else(|_| Err(DbError::ConnectionClosed)))
    }
}

/// How a [`QueryService::transmit`] unit of work ended.
#[derive(Debug)]
pub enum TransmitOutcome {
    Committed,
    /// The work (or the begin/commit around it) failed and was rolled back.
    /// Autocommit has been restored.
    RolledBack { cause: DbError },
}

impl TransmitOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed)
    }

    /// Turn a rollback into an error.
    pub fn into_result(self) -> DbResult<()> {
        match self {
            Self::Committed => Ok(()),
            Self::RolledBack { cause } => Err(cause),
        }
    }
}

/// The connection as seen from inside the lane.
///
/// Handed to [`QueryService::transmit`] units of work; statements issued
/// here run on the transaction's connection and share the retry contract.
pub struct Session {
    conn: Box<dyn Connection>,
    statement_timeout: Option<Duration>,
    lane: Arc<str>,
}

impl Session {
    pub fn is_closed(&self) -> bool {
        self.conn.is_closed()
    }

    /// Run a query and hand its rows to `mapper`, retrying once.
    pub async fn query<T, M>(
        &mut self,
        sql: &str,
        params: &[QueryParam],
        mapper: M,
    ) -> DbResult<Option<T>>
    where
        M: FnMut(&mut ResultSet) -> DbResult<Option<T>>,
    {
        self.query_with(Retry::Once, sql, params, mapper).await
    }

    pub async fn query_with<T, M>(
        &mut self,
        retry: Retry,
        sql: &str,
        params: &[QueryParam],
        mut mapper: M,
    ) -> DbResult<Option<T>>
    where
        M: FnMut(&mut ResultSet) -> DbResult<Option<T>>,
    {
        self.precheck(sql)?;

        let mut attempt = 1;
        loop {
            debug!(lane = %self.lane, sql, params = ?params, attempt, "Executing query");
            let fetched = match bounded(self.statement_timeout, self.conn.fetch(sql, params)).await {
                Ok(fetched) => fetched,
                Err(deadline) => Err(self.abandon(sql, deadline)),
            };
            let outcome = fetched.and_then(|mut rows| mapper(&mut rows));

            match outcome {
                Ok(value) => return Ok(value),
                Err(cause) if retry.allows_after(attempt) => {
                    warn!(lane = %self.lane, sql, attempt, error = %cause, "Query failed, retrying");
                    attempt += 1;
                }
                Err(cause) => return Err(DbError::execution(attempt, cause)),
            }
        }
    }

    /// Run a data-modifying statement, retrying once. Returns affected rows.
    pub async fn update(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<u64> {
        self.update_with(Retry::Once, sql, params).await
    }

    pub async fn update_with(
        &mut self,
        retry: Retry,
        sql: &str,
        params: &[QueryParam],
    ) -> DbResult<u64> {
        self.precheck(sql)?;

        let mut attempt = 1;
        loop {
            debug!(lane = %self.lane, sql, params = ?params, attempt, "Executing update");
            let executed = match bounded(self.statement_timeout, self.conn.execute(sql, params)).await {
                Ok(executed) => executed,
                Err(deadline) => Err(self.abandon(sql, deadline)),
            };
            match executed {
                Ok(affected) => return Ok(affected),
                Err(cause) if retry.allows_after(attempt) => {
                    warn!(lane = %self.lane, sql, attempt, error = %cause, "Update failed, retrying");
                    attempt += 1;
                }
                Err(cause) => return Err(DbError::execution(attempt, cause)),
            }
        }
    }

    /// The server may still be running the statement; drop the link instead
    /// of queueing behind it.
    fn abandon(&mut self, sql: &str, deadline: Duration) -> DbError {
        warn!(lane = %self.lane, sql, timeout_ms = deadline.as_millis() as u64, "Statement deadline expired");
        self.conn.abandon();
        DbError::timeout("statement", deadline.as_secs())
    }

    fn precheck(&self, sql: &str) -> DbResult<()> {
        if self.conn.is_closed() {
            return Err(DbError::ConnectionClosed);
        }
        if sql.trim().is_empty() {
            return Err(DbError::invalid_input("SQL statement cannot be empty"));
        }
        Ok(())
    }

    async fn transaction<W>(&mut self, work: W) -> DbResult<TransmitOutcome>
    where
        W: for<'a> FnOnce(&'a mut Session) -> BoxFuture<'a, DbResult<()>>,
    {
        if self.conn.is_closed() {
            return Err(DbError::ConnectionClosed);
        }

        let transaction_id = format!("tx_{}", Uuid::new_v4().simple());
        debug!(lane = %self.lane, transaction_id = %transaction_id, "Beginning transaction");

        match self.begin_work_commit(work).await {
            Ok(()) => {
                self.restore_auto_commit(&transaction_id).await?;
                debug!(lane = %self.lane, transaction_id = %transaction_id, "Committed transaction");
                Ok(TransmitOutcome::Committed)
            }
            Err(cause) => {
                warn!(
                    lane = %self.lane,
                    transaction_id = %transaction_id,
                    error = %cause,
                    "Transaction failed, rolling back"
                );
                self.conn.rollback().await.map_err(|e| {
                    DbError::transaction("Rollback failed", transaction_id.as_str(), Some(e))
                })?;
                self.restore_auto_commit(&transaction_id).await?;
                Ok(TransmitOutcome::RolledBack { cause })
            }
        }
    }

    async fn begin_work_commit<W>(&mut self, work: W) -> DbResult<()>
    where
        W: for<'a> FnOnce(&'a mut Session) -> BoxFuture<'a, DbResult<()>>,
    {
        self.conn.set_auto_commit(false).await?;
        work(&mut *self).await?;
        self.conn.commit().await
    }

    async fn restore_auto_commit(&mut self, transaction_id: &str) -> DbResult<()> {
        self.conn.set_auto_commit(true).await.map_err(|e| {
            DbError::transaction("Failed to restore autocommit", transaction_id, Some(e))
        })
    }
}

/// Run `attempt` under the statement deadline. `Err` carries the deadline
/// that expired.
async fn bounded<T>(
    deadline: Option<Duration>,
    attempt: impl Future<Output = DbResult<T>>,
) -> Result<DbResult<T>, Duration> {
    match deadline {
        Some(deadline) => tokio::time::timeout(deadline, attempt)
            .await
            .map_err(|_| deadline),
        None => Ok(attempt.await),
    }
}

/// Cloneable handle onto a lane.
#[derive(Clone)]
pub struct QueryService {
    jobs: mpsc::UnboundedSender<Job>,
    id: Arc<str>,
}

impl std::fmt::Debug for QueryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryService")
            .field("id", &self.id)
            .field("running", &self.is_running())
            .finish()
    }
}

impl QueryService {
    /// Spawn a lane that owns `conn`. Must be called within a tokio runtime.
    pub fn start(conn: Box<dyn Connection>, statement_timeout: Option<Duration>) -> Self {
        let id: Arc<str> = Arc::from(Uuid::new_v4().to_string());
        let (jobs, rx) = mpsc::unbounded_channel();
        let lane = Lane {
            session: Session {
                conn,
                statement_timeout,
                lane: id.clone(),
            },
            stopped: false,
        };
        tokio::spawn(run(lane, rx));
        Self { jobs, id }
    }

    /// Lane identifier, as it appears in tracing fields.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the lane task is still accepting jobs.
    pub fn is_running(&self) -> bool {
        !self.jobs.is_closed()
    }

    fn submit<T, F>(&self, work: F) -> Pending<T>
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a mut Lane) -> BoxFuture<'a, DbResult<T>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let queued = self.jobs.send(job(move |lane| {
            Box::pin(async move {
                let result = work(lane).await;
                // The caller may have dropped its Pending
                let _ = tx.send(result);
            })
        }));
        if queued.is_err() {
            debug!(lane = %self.id, "Lane is gone, rejecting job");
        }
        Pending { rx }
    }

    pub fn query<T, M>(
        &self,
        sql: impl Into<String>,
        params: Vec<QueryParam>,
        mapper: M,
    ) -> Pending<Option<T>>
    where
        T: Send + 'static,
        M: FnMut(&mut ResultSet) -> DbResult<Option<T>> + Send + 'static,
    {
        self.query_with(Retry::Once, sql, params, mapper)
    }

    /// Like [`QueryService::query`] with an explicit retry policy.
    pub fn query_with<T, M>(
        &self,
        retry: Retry,
        sql: impl Into<String>,
        params: Vec<QueryParam>,
        mapper: M,
    ) -> Pending<Option<T>>
    where
        T: Send + 'static,
        M: FnMut(&mut ResultSet) -> DbResult<Option<T>> + Send + 'static,
    {
        let sql = sql.into();
        self.submit(move |lane| {
            Box::pin(async move {
                lane.session
                    .query_with(retry, &sql, &params, mapper)
                    .await
            })
        })
    }

    pub fn update(&self, sql: impl Into<String>, params: Vec<QueryParam>) -> Pending<u64> {
        self.update_with(Retry::Once, sql, params)
    }

    pub fn update_with(
        &self,
        retry: Retry,
        sql: impl Into<String>,
        params: Vec<QueryParam>,
    ) -> Pending<u64> {
        let sql = sql.into();
        self.submit(move |lane| {
            Box::pin(async move { lane.session.update_with(retry, &sql, &params).await })
        })
    }

    /// Blocking [`QueryService::query`]. Must not be called from async code.
    pub fn query_sync<T, M>(
        &self,
        sql: impl Into<String>,
        params: Vec<QueryParam>,
        mapper: M,
    ) -> Result<Option<T>, ServiceError>
    where
        T: Send + 'static,
        M: FnMut(&mut ResultSet) -> DbResult<Option<T>> + Send + 'static,
    {
        self.query(sql, params, mapper).wait()
    }

    /// Blocking [`QueryService::update`]. Must not be called from async code.
    pub fn update_sync(
        &self,
        sql: impl Into<String>,
        params: Vec<QueryParam>,
    ) -> Result<u64, ServiceError> {
        self.update(sql, params).wait()
    }

    /// Run `work` as one transaction on the lane's connection.
    ///
    /// Autocommit is switched off, `work` runs, and the transaction commits.
    /// If anything in between fails the transaction is rolled back and the
    /// future resolves to `Ok(TransmitOutcome::RolledBack { cause })`.
    /// Autocommit is restored either way. Only a failed rollback or restore
    /// resolves to an error ([`DbError::Transaction`]).
    ///
    /// `work` holds the lane for its whole run. It must issue statements
    /// through the [`Session`] it is given; awaiting this `QueryService` (or a
    /// clone of it) from inside `work` waits on a job queued behind the
    /// transaction and never completes.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let outcome = service
    ///     .transmit(|session| {
    ///         Box::pin(async move {
    ///             session.update("UPDATE account SET balance = balance - 10 WHERE id = 1", &[]).await?;
    ///             session.update("UPDATE account SET balance = balance + 10 WHERE id = 2", &[]).await?;
    ///             Ok(())
    ///         })
    ///     })
    ///     .await?;
    /// ```
    pub fn transmit<W>(&self, work: W) -> Pending<TransmitOutcome>
    where
        W: for<'a> FnOnce(&'a mut Session) -> BoxFuture<'a, DbResult<()>> + Send + 'static,
    {
        self.submit(move |lane| Box::pin(async move { lane.session.transaction(work).await }))
    }

    /// Blocking [`QueryService::transmit`]. Must not be called from async code.
    pub fn transmit_sync<W>(&self, work: W) -> Result<TransmitOutcome, ServiceError>
    where
        W: for<'a> FnOnce(&'a mut Session) -> BoxFuture<'a, DbResult<()>> + Send + 'static,
    {
        self.transmit(work).wait()
    }

    /// Round-trip to the server through the lane.
    pub fn ping(&self) -> Pending<()> {
        self.submit(|lane| Box::pin(async move { lane.session.conn.ping().await }))
    }

    /// Switch the live session to `database`.
    pub fn use_database(&self, database: impl Into<String>) -> Pending<()> {
        let database = database.into();
        self.submit(move |lane| {
            Box::pin(async move { lane.session.conn.set_catalog(&database).await })
        })
    }

    /// Close the connection and stop the lane once the close succeeded.
    ///
    /// Jobs queued behind the shutdown resolve to
    /// [`DbError::ConnectionClosed`]. A failed close leaves the lane running.
    pub fn shutdown(&self) -> Pending<()> {
        self.submit(|lane| {
            Box::pin(async move {
                let closed = lane.session.conn.close().await;
                lane.stopped = closed.is_ok();
                closed
            })
        })
    }
}
