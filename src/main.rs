//! mysql-lane - run one statement through a serialized MySQL connection.

use clap::Parser;
use mysql_lane::config::Config;
use mysql_lane::logger::TracingLogger;
use mysql_lane::models::ResultSet;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();
    init_tracing(&config);

    let mut connector = config
        .connection_builder()
        .logger(Arc::new(TracingLogger))
        .build()?;
    info!(url = %connector.connection_info().render_url(), "Starting mysql-lane v{}", env!("CARGO_PKG_VERSION"));

    connector.establish(&config.password).await;
    let Some(service) = connector.service() else {
        error!("No connection, giving up");
        std::process::exit(1);
    };

    let params = config.params();
    let result = if config.update {
        service
            .update_with(config.retry(), config.sql.as_str(), params)
            .await
            .map(|affected| println!("{}", affected))
    } else {
        service
            .query_with(config.retry(), config.sql.as_str(), params, |rows: &mut ResultSet| {
                Ok(Some(rows.to_json_rows()))
            })
            .await
            .and_then(|rows| {
                let rows = rows.unwrap_or_default();
                let json = serde_json::to_string_pretty(&rows)
                    .map_err(|e| mysql_lane::DbError::internal(e.to_string()))?;
                println!("{}", json);
                Ok(())
            })
    };

    connector.close().await;

    if let Err(e) = result {
        error!(error = %e, "Statement failed");
        if let Some(suggestion) = e.suggestion() {
            eprintln!("Hint: {}", suggestion);
        }
        return Err(e.into());
    }
    Ok(())
}
