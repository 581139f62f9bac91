//! Configuration handling for the mysql-lane CLI.
//!
//! Every flag can also be supplied through a `MYSQL_*` environment variable.

use crate::db::ConnectionBuilder;
use crate::models::{AUTO_RECONNECT, CHARACTER_ENCODING, QueryParam, Retry, TIMEOUT, UrlProtocol};
use clap::Parser;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 3306;
pub const DEFAULT_USER: &str = "root";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u32 = 10;

/// Configuration for a single mysql-lane run.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "mysql-lane",
    about = "Run one statement through a serialized, retrying MySQL connection",
    version
)]
pub struct Config {
    /// URL protocol prefix (only jdbc:mysql: can be opened)
    #[arg(long, default_value_t = UrlProtocol::JdbcMysql.to_string(), env = "MYSQL_PROTOCOL")]
    pub protocol: String,

    /// Server host name
    #[arg(short = 'H', long, default_value = DEFAULT_HOST, env = "MYSQL_HOST")]
    pub host: String,

    /// Server port
    #[arg(short = 'P', long, default_value_t = DEFAULT_PORT, env = "MYSQL_PORT")]
    pub port: u16,

    /// User name
    #[arg(short, long, default_value = DEFAULT_USER, env = "MYSQL_USER")]
    pub user: String,

    /// Password
    #[arg(short, long, default_value = "", env = "MYSQL_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Database to select after connecting
    #[arg(short, long, env = "MYSQL_DATABASE")]
    pub database: Option<String>,

    /// Connect timeout in seconds (0 waits forever)
    #[arg(
        long,
        default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS,
        env = "MYSQL_CONNECT_TIMEOUT"
    )]
    pub connect_timeout: u32,

    /// Session character set, e.g. utf8mb4
    #[arg(long, env = "MYSQL_CHARACTER_ENCODING")]
    pub character_encoding: Option<String>,

    /// Reconnect transparently after the link broke
    #[arg(long, env = "MYSQL_AUTO_RECONNECT")]
    pub auto_reconnect: bool,

    /// Per-attempt statement deadline in seconds
    #[arg(long, env = "MYSQL_STATEMENT_TIMEOUT")]
    pub statement_timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "MYSQL_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "MYSQL_JSON_LOGS")]
    pub json_logs: bool,

    /// Positional parameter, bound in order. JSON literals (42, true, null,
    /// "text") keep their type; anything else binds as a string.
    #[arg(long = "param", value_name = "VALUE")]
    pub params: Vec<String>,

    /// Treat the statement as an update and print the affected row count
    #[arg(long)]
    pub update: bool,

    /// Do not re-run a failed statement
    #[arg(long)]
    pub no_retry: bool,

    /// The SQL statement to run
    #[arg(value_name = "SQL")]
    pub sql: String,
}

impl Config {
    /// Builder for the configured connection, without logger or driver.
    pub fn connection_builder(&self) -> ConnectionBuilder {
        let mut builder =
            ConnectionBuilder::new(self.protocol.as_str(), self.host.as_str(), self.port, self.user.as_str())
                .property(&TIMEOUT, Some(self.connect_timeout))
                .property(&CHARACTER_ENCODING, self.character_encoding.clone());

        if self.auto_reconnect {
            builder = builder.property(&AUTO_RECONNECT, Some(true));
        }
        if let Some(database) = &self.database {
            builder = builder.database(database.as_str());
        }
        if let Some(secs) = self.statement_timeout {
            builder = builder.statement_timeout(Duration::from_secs(secs));
        }
        builder
    }

    /// Bind parameters in order.
    pub fn params(&self) -> Vec<QueryParam> {
        self.params
            .iter()
            .map(|raw| QueryParam::parse_literal(raw))
            .collect()
    }

    pub fn retry(&self) -> Retry {
        if self.no_retry {
            Retry::Never
        } else {
            Retry::Once
        }
    }
}
