//! Integration tests against a running MySQL server.
//!
//! Set TEST_MYSQL_HOST to run them. TEST_MYSQL_PORT, TEST_MYSQL_USER,
//! TEST_MYSQL_PASSWORD and TEST_MYSQL_DATABASE default to 3306, root, root
//! and test_db.
//! Example: TEST_MYSQL_HOST=127.0.0.1 TEST_MYSQL_PASSWORD=secret cargo test --test mysql_live_test

use mysql_lane::models::{CHARACTER_ENCODING, TIMEOUT, UrlProtocol};
use mysql_lane::{ConnectionBuilder, Connector, DbError, DbResult, Session, TracingLogger, params};
use std::sync::Arc;

struct Target {
    host: String,
    port: u16,
    user: String,
    password: String,
    database: String,
}

fn target() -> Option<Target> {
    let host = match std::env::var("TEST_MYSQL_HOST") {
        Ok(host) => host,
        Err(_) => {
            eprintln!("Skipping test: TEST_MYSQL_HOST not set");
            return None;
        }
    };
    let var = |name: &str, default: &str| std::env::var(name).unwrap_or_else(|_| default.to_string());
    Some(Target {
        host,
        port: var("TEST_MYSQL_PORT", "3306").parse().unwrap(),
        user: var("TEST_MYSQL_USER", "root"),
        password: var("TEST_MYSQL_PASSWORD", "root"),
        database: var("TEST_MYSQL_DATABASE", "test_db"),
    })
}

async fn connect(target: &Target) -> Connector {
    let mut connector = ConnectionBuilder::new(
        UrlProtocol::JdbcMysql,
        target.host.as_str(),
        target.port,
        target.user.as_str(),
    )
    .database(target.database.as_str())
    .property(&TIMEOUT, Some(5))
    .property(&CHARACTER_ENCODING, Some("utf8mb4".to_string()))
    .logger(Arc::new(TracingLogger))
    .build()
    .unwrap();

    connector.establish(&target.password).await;
    assert!(connector.is_established().await, "could not reach MySQL");
    connector
}

async fn insert_pair_then_fail(session: &mut Session) -> DbResult<()> {
    session
        .update("INSERT INTO lane_test (id, name) VALUES (?, ?)", &params![100, "rolled back"])
        .await?;
    Err(DbError::invalid_input("abort on purpose"))
}

async fn insert_pair(session: &mut Session) -> DbResult<()> {
    session
        .update("INSERT INTO lane_test (id, name) VALUES (?, ?)", &params![200, "kept"])
        .await?;
    session
        .update("INSERT INTO lane_test (id, name) VALUES (?, ?)", &params![201, "kept too"])
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_round_trip_against_mysql() {
    let Some(target) = target() else {
        return;
    };
    let mut connector = connect(&target).await;
    let service = connector.service().unwrap();

    service
        .update(
            "CREATE TEMPORARY TABLE lane_test (id INT PRIMARY KEY, name VARCHAR(100), created DATETIME NULL)",
            params![],
        )
        .await
        .unwrap();

    let inserted = service
        .update(
            "INSERT INTO lane_test (id, name, created) VALUES (?, ?, NOW()), (?, ?, NULL)",
            params![1, "ada", 2, None::<String>],
        )
        .await
        .unwrap();
    assert_eq!(inserted, 2);

    let name: Option<String> = service
        .query("SELECT name FROM lane_test WHERE id = ?", params![1], |rows| {
            Ok(if rows.next() { rows.try_get("name")? } else { None })
        })
        .await
        .unwrap();
    assert_eq!(name.as_deref(), Some("ada"));

    let outcome = service
        .transmit(|session| Box::pin(insert_pair_then_fail(session)))
        .await
        .unwrap();
    assert!(!outcome.is_committed());

    let outcome = service
        .transmit(|session| Box::pin(insert_pair(session)))
        .await
        .unwrap();
    assert!(outcome.is_committed());

    let ids: Option<Vec<i64>> = service
        .query("SELECT id FROM lane_test ORDER BY id", params![], |rows| {
            let mut ids = Vec::new();
            while rows.next() {
                ids.push(rows.try_get("id")?);
            }
            Ok(Some(ids))
        })
        .await
        .unwrap();
    assert_eq!(ids, Some(vec![1, 2, 200, 201]));

    let missing = service
        .query("SELECT * FROM lane_test_missing", params![], |_rows| Ok(Some(())))
        .await;
    match missing {
        Err(DbError::Execution { attempts: 2, source }) => {
            assert!(matches!(*source, DbError::Database { .. }))
        }
        other => panic!("unexpected result: {other:?}"),
    }

    connector.close().await;
    assert!(!connector.is_established().await);
}
