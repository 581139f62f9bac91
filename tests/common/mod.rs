//! Scripted in-memory driver shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use mysql_lane::db::{Connection, Driver};
use mysql_lane::models::{ConnectionInfo, QueryParam, ResultSet};
use mysql_lane::{DbError, DbResult, Logger};
use serde_json::json;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Every call the lane made, in order. Pings are not recorded.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Connect(String),
    Fetch(String),
    Execute(String),
    AutoCommit(bool),
    Commit,
    Rollback,
    Catalog(String),
    Abandon,
    Close,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub events: Vec<Event>,
    pub connections: u32,
    pub closed: bool,
    pub auto_commit: bool,
    /// Returned by every successful fetch.
    pub rows: ResultSet,
    pub affected: u64,
    /// Number of upcoming fetch calls that fail.
    pub fetch_failures: u32,
    /// Number of upcoming execute calls that fail.
    pub execute_failures: u32,
    /// Failure for the next connect.
    pub connect_error: Option<DbError>,
    pub fail_close: bool,
    pub fail_commit: bool,
    pub fail_rollback: bool,
    pub fail_catalog: bool,
    /// How long each execute takes.
    pub execute_delay: Option<Duration>,
    /// Number of upcoming execute calls that never finish.
    pub hangs: u32,
    /// A hung statement is pending; every call waits on it until abandoned.
    pub wedged: bool,
    pub in_flight: u32,
    pub max_in_flight: u32,
}

fn scripted(what: &str) -> DbError {
    DbError::database(
        format!("scripted {} failure", what),
        Some("HY000".to_string()),
        "nothing to fix, this is a test",
    )
}

#[derive(Clone, Default)]
pub struct Fake {
    state: Arc<Mutex<FakeState>>,
}

impl Fake {
    pub fn new() -> Self {
        let fake = Self::default();
        fake.state().auto_commit = true;
        fake.state().affected = 1;
        fake
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn events(&self) -> Vec<Event> {
        self.state().events.clone()
    }

    pub fn driver(&self) -> Arc<dyn Driver> {
        Arc::new(FakeDriver {
            state: self.state.clone(),
        })
    }

    /// An already open connection, bypassing the driver.
    pub fn connection(&self) -> Box<dyn Connection> {
        self.state().connections += 1;
        Box::new(FakeConnection {
            state: self.state.clone(),
        })
    }

    /// Rows every fetch answers with.
    pub fn with_users(self) -> Self {
        self.state().rows = ResultSet::new(
            vec!["id".to_string(), "name".to_string()],
            vec![vec![json!(1), json!("ada")], vec![json!(2), json!("grace")]],
        );
        self
    }
}

pub struct FakeDriver {
    state: Arc<Mutex<FakeState>>,
}

#[async_trait]
impl Driver for FakeDriver {
    async fn connect(
        &self,
        info: &ConnectionInfo,
        _credential: &str,
    ) -> DbResult<Box<dyn Connection>> {
        let mut state = self.state.lock().unwrap();
        state.events.push(Event::Connect(info.render_url()));
        if let Some(error) = state.connect_error.take() {
            return Err(error);
        }
        state.connections += 1;
        state.closed = false;
        Ok(Box::new(FakeConnection {
            state: self.state.clone(),
        }))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

pub struct FakeConnection {
    state: Arc<Mutex<FakeState>>,
}

impl FakeConnection {
    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Stands in for a driver draining an unfinished result first.
    async fn drain(&self) {
        let wedged = self.lock().wedged;
        if wedged {
            std::future::pending::<()>().await;
        }
    }

    fn open(&self) -> DbResult<MutexGuard<'_, FakeState>> {
        let state = self.lock();
        if state.closed {
            return Err(DbError::ConnectionClosed);
        }
        Ok(state)
    }
}

#[async_trait]
impl Connection for FakeConnection {
    async fn fetch(&mut self, sql: &str, _params: &[QueryParam]) -> DbResult<ResultSet> {
        self.drain().await;
        let mut state = self.open()?;
        state.events.push(Event::Fetch(sql.to_string()));
        if state.fetch_failures > 0 {
            state.fetch_failures -= 1;
            return Err(scripted("fetch"));
        }
        Ok(state.rows.clone())
    }

    async fn execute(&mut self, sql: &str, _params: &[QueryParam]) -> DbResult<u64> {
        self.drain().await;
        let hang = {
            let mut state = self.open()?;
            if state.hangs > 0 {
                state.hangs -= 1;
                state.wedged = true;
                state.events.push(Event::Execute(sql.to_string()));
                true
            } else {
                false
            }
        };
        if hang {
            std::future::pending::<()>().await;
        }

        let delay = {
            let mut state = self.open()?;
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            state.execute_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        state.in_flight -= 1;
        state.events.push(Event::Execute(sql.to_string()));
        if state.execute_failures > 0 {
            state.execute_failures -= 1;
            return Err(scripted("execute"));
        }
        Ok(state.affected)
    }

    async fn set_auto_commit(&mut self, enabled: bool) -> DbResult<()> {
        let mut state = self.open()?;
        state.events.push(Event::AutoCommit(enabled));
        state.auto_commit = enabled;
        Ok(())
    }

    async fn commit(&mut self) -> DbResult<()> {
        let mut state = self.open()?;
        state.events.push(Event::Commit);
        if state.fail_commit {
            return Err(scripted("commit"));
        }
        Ok(())
    }

    async fn rollback(&mut self) -> DbResult<()> {
        let mut state = self.open()?;
        state.events.push(Event::Rollback);
        if state.fail_rollback {
            return Err(scripted("rollback"));
        }
        Ok(())
    }

    async fn set_catalog(&mut self, database: &str) -> DbResult<()> {
        let mut state = self.open()?;
        state.events.push(Event::Catalog(database.to_string()));
        if state.fail_catalog {
            return Err(scripted("catalog"));
        }
        Ok(())
    }

    async fn ping(&mut self) -> DbResult<()> {
        self.drain().await;
        self.open().map(|_| ())
    }

    /// Behaves like a fresh session afterwards.
    fn abandon(&mut self) {
        let mut state = self.lock();
        state.events.push(Event::Abandon);
        state.wedged = false;
    }

    async fn close(&mut self) -> DbResult<()> {
        let mut state = self.open()?;
        if state.fail_close {
            return Err(scripted("close"));
        }
        state.events.push(Event::Close);
        state.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

/// Captures lifecycle lines as `LEVEL message`.
#[derive(Default)]
pub struct RecordingLogger {
    lines: Mutex<Vec<String>>,
}

impl RecordingLogger {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    fn push(&self, level: &str, message: &str) {
        self.lines
            .lock()
            .unwrap()
            .push(format!("{} {}", level, message));
    }
}

impl Logger for RecordingLogger {
    fn info(&self, message: &str) {
        self.push("INFO", message);
    }

    fn warning(&self, message: &str) {
        self.push("WARN", message);
    }

    fn severe(&self, message: &str) {
        self.push("SEVERE", message);
    }
}
