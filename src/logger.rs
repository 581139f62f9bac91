//! Lifecycle logging.
//!
//! Connection lifecycle events (establish, close, catalog switches) are
//! reported through an injected [`Logger`] rather than straight to
//! `tracing`, so embedding applications decide where they land.

use std::error::Error;
use std::sync::Arc;

/// Prefix added to every line of an injected logger.
pub const PREFIX: &str = "[MySQL] ";

pub trait Logger: Send + Sync {
    fn info(&self, message: &str);

    fn warning(&self, message: &str);

    fn severe(&self, message: &str);

    /// Severe message plus the failure that caused it.
    fn severe_with_cause(&self, message: &str, cause: &(dyn Error + 'static)) {
        self.severe(&format!("{}: {}", message, cause));
    }
}

/// Writes info and warnings to stdout, severe messages to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn info(&self, message: &str) {
        println!("{}", message);
    }

    fn warning(&self, message: &str) {
        println!("{}", message);
    }

    fn severe(&self, message: &str) {
        eprintln!("{}", message);
    }

    fn severe_with_cause(&self, message: &str, cause: &(dyn Error + 'static)) {
        eprintln!("{}", message);
        let mut current = Some(cause);
        while let Some(err) = current {
            eprintln!("  caused by: {}", err);
            current = err.source();
        }
    }
}

/// Forwards to `tracing` at info, warn and error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn info(&self, message: &str) {
        tracing::info!("{}", message);
    }

    fn warning(&self, message: &str) {
        tracing::warn!("{}", message);
    }

    fn severe(&self, message: &str) {
        tracing::error!("{}", message);
    }

    fn severe_with_cause(&self, message: &str, cause: &(dyn Error + 'static)) {
        tracing::error!(error = %cause, "{}", message);
    }
}

/// Adds [`PREFIX`] to every line before handing it on.
struct Tagged {
    inner: Arc<dyn Logger>,
}

impl Logger for Tagged {
    fn info(&self, message: &str) {
        self.inner.info(&format!("{}{}", PREFIX, message));
    }

    fn warning(&self, message: &str) {
        self.inner.warning(&format!("{}{}", PREFIX, message));
    }

    fn severe(&self, message: &str) {
        self.inner.severe(&format!("{}{}", PREFIX, message));
    }

    fn severe_with_cause(&self, message: &str, cause: &(dyn Error + 'static)) {
        self.inner
            .severe_with_cause(&format!("{}{}", PREFIX, message), cause);
    }
}

/// The logger a connector writes to: the injected one tagged with
/// [`PREFIX`], or an untagged [`ConsoleLogger`].
pub(crate) fn resolve(injected: Option<Arc<dyn Logger>>) -> Arc<dyn Logger> {
    match injected {
        Some(inner) => Arc::new(Tagged { inner }),
        None => Arc::new(ConsoleLogger),
    }
}
