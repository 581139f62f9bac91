//! Serialized connection lifecycle for shared use.
//!
//! A [`Repository`] wraps one [`Connector`] so that establish, close and
//! catalog switches issued from anywhere run strictly one after another.
//! Each call returns a [`Lifecycle`] future right away; the step itself is
//! spawned and waits for the previously issued one, so it makes progress
//! whether or not the caller awaits it.
//!
//! Lifecycle steps are not ordered against statements already queued on the
//! service's lane.

use crate::db::builder::ConnectionBuilder;
use crate::db::connector::Connector;
use crate::db::service::QueryService;
use crate::error::{DbError, DbResult};
use futures_util::future::{self, BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Mutex as AsyncMutex;
use tracing::warn;

/// Completion of a lifecycle step. Cloneable; every clone resolves together.
pub type Lifecycle = Shared<BoxFuture<'static, ()>>;

pub struct Repository {
    connector: Arc<AsyncMutex<Connector>>,
    last: Mutex<Lifecycle>,
}

impl Repository {
    pub fn new(connector: Connector) -> Self {
        Self {
            connector: Arc::new(AsyncMutex::new(connector)),
            last: Mutex::new(future::ready(()).boxed().shared()),
        }
    }

    pub fn from_builder(builder: ConnectionBuilder) -> DbResult<Self> {
        Ok(Self::new(builder.build()?))
    }

    /// Queue `step` behind the last lifecycle step.
    fn chain<F, Fut>(&self, step: F) -> Lifecycle
    where
        F: FnOnce(Arc<AsyncMutex<Connector>>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = last.clone();
        let connector = self.connector.clone();

        let handle = tokio::spawn(async move {
            previous.await;
            step(connector).await;
        });
        let next = async move {
            if let Err(e) = handle.await {
                warn!(error = %e, "Lifecycle step did not complete");
            }
        }
        .boxed()
        .shared();

        *last = next.clone();
        next
    }

    fn last(&self) -> Lifecycle {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Establish after every earlier step. Skipped when already established.
    ///
    /// Must be called within a tokio runtime.
    pub fn establish(&self, credential: impl Into<String>) -> Lifecycle {
        let credential = credential.into();
        self.chain(move |connector| async move {
            let mut connector = connector.lock().await;
            if connector.is_established().await {
                return;
            }
            connector.establish(&credential).await;
        })
    }

    /// Close after every earlier step. Skipped when not established.
    ///
    /// Must be called within a tokio runtime.
    pub fn close(&self) -> Lifecycle {
        self.chain(|connector| async move {
            let mut connector = connector.lock().await;
            if !connector.is_established().await {
                return;
            }
            connector.close().await;
        })
    }

    /// Switch databases after every earlier step.
    pub fn set_database(&self, database: Option<String>) -> Lifecycle {
        self.chain(move |connector| async move {
            connector.lock().await.set_database(database).await;
        })
    }

    /// Whether the connection is up once every pending step has finished.
    pub async fn is_established(&self) -> bool {
        self.last().await;
        self.connector.lock().await.is_established().await
    }

    /// The current service.
    pub async fn service(&self) -> DbResult<QueryService> {
        self.connector
            .lock()
            .await
            .service()
            .ok_or(DbError::NotEstablished)
    }

    /// Run `f` against the connector once every pending step has finished.
    pub async fn with_connector<R>(&self, f: impl FnOnce(&Connector) -> R) -> R {
        self.last().await;
        let connector = self.connector.lock().await;
        f(&connector)
    }
}
