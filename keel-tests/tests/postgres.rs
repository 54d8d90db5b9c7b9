mod init;

#[cfg(test)]
mod tests {
    use super::init::init;
    use keel::{
        Database, DatabaseOptions, DatabaseState, DisconnectMode, ErrorKind, Migration,
    };
    use keel_tests::{execute_tests, init_logs, migrations, silent_logs};
    use std::{sync::Mutex, time::Duration};

    static MUTEX: Mutex<()> = Mutex::new(());

    #[tokio::test]
    async fn postgres() {
        init_logs();
        let _guard = MUTEX.lock().unwrap();

        let (url, container) = init().await;
        let error_msg = format!("Could not connect to `{url}`");
        let database = Database::connect(DatabaseOptions::new(url.clone()), migrations())
            .await
            .expect(&error_msg);
        assert_eq!(database.state(), DatabaseState::Connected);
        execute_tests(&database).await;
        database.disconnect(DisconnectMode::Teardown).await;

        // Already applied migrations are skipped
        let database = Database::connect(DatabaseOptions::new(url), migrations())
            .await
            .expect(&error_msg);
        execute_tests(&database).await;
        database.disconnect(DisconnectMode::Teardown).await;
        drop(container);
    }

    #[tokio::test]
    async fn failed_migration_is_not_recorded() {
        init_logs();
        let _guard = MUTEX.lock().unwrap();

        let (url, container) = init().await;
        let options = DatabaseOptions::new(url);
        let broken = vec![Migration::new(9001, "broken", "CREATE TABLE broken (")];
        silent_logs! {
            let error = Database::connect(options.clone(), broken)
                .await
                .expect_err("A broken migration must fail the connection");
            assert_eq!(error.kind(), ErrorKind::Connection);
        }
        let database = Database::connect_without_migrations(options)
            .await
            .expect("Could not connect");
        let mut connection = database.acquire().await.expect("Could not acquire a connection");
        let applied = keel::Executor::fetch_scalar(
            &mut connection,
            "SELECT count(*) FROM keel_schema_migrations WHERE version = $1",
            &[9001i64.into()],
        )
        .await
        .expect("Could not read the applied migrations");
        assert_eq!(applied.as_i64(), Some(Some(0)));
        drop(connection);
        database.disconnect(DisconnectMode::Teardown).await;
        drop(container);
    }

    #[tokio::test]
    async fn health_check_reconnects() {
        init_logs();
        let _guard = MUTEX.lock().unwrap();

        let (url, container) = init().await;
        let database = Database::connect_without_migrations(DatabaseOptions::new(url))
            .await
            .expect("Could not connect");
        database.disconnect(DisconnectMode::PreserveForReuse).await;
        assert_eq!(database.state(), DatabaseState::Disconnected);
        silent_logs! {
            assert!(database.acquire().await.is_err());
            database.check_health().await.expect("The pool should be rebuilt");
        }
        assert_eq!(database.state(), DatabaseState::Connected);
        assert_eq!(database.reconnections(), 1);
        database
            .acquire()
            .await
            .expect("A connection should be available again")
            .ping()
            .await
            .expect("The new connection should answer");

        database.disconnect(DisconnectMode::Teardown).await;
        assert_eq!(database.state(), DatabaseState::TornDown);
        assert!(database.is_monitor_stopped());
        let error = database.acquire().await.expect_err("The database was torn down");
        assert_eq!(error.kind(), ErrorKind::Connection);
        assert!(database.check_health().await.is_err());
        database.disconnect(DisconnectMode::Teardown).await;
        database.disconnect(DisconnectMode::PreserveForReuse).await;
        assert_eq!(database.state(), DatabaseState::TornDown);
        drop(container);
    }

    #[tokio::test]
    async fn health_monitor_reconnects() {
        init_logs();
        let _guard = MUTEX.lock().unwrap();

        let (url, container) = init().await;
        let options = DatabaseOptions::new(url).with_health_interval(Duration::from_millis(200));
        let database = Database::connect_without_migrations(options)
            .await
            .expect("Could not connect");
        database.disconnect(DisconnectMode::PreserveForReuse).await;
        silent_logs! {
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
        assert_eq!(database.state(), DatabaseState::Connected);
        assert!(database.reconnections() >= 1);
        database
            .acquire()
            .await
            .expect("The monitor should have rebuilt the pool");
        database.disconnect(DisconnectMode::Teardown).await;
        assert!(database.is_monitor_stopped());
        drop(container);
    }

    #[tokio::test]
    async fn wrong_url() {
        silent_logs! {
            assert!(
                Database::connect_without_migrations(DatabaseOptions::new("mysql://some_url"))
                    .await
                    .is_err()
            );
            let error = Database::connect_without_migrations(
                DatabaseOptions::new("postgres://keel:pw@127.0.0.1:1/nothing?sslmode=disable")
                    .with_connect_timeout(Duration::from_secs(1)),
            )
            .await
            .expect_err("Nothing listens on port 1");
            assert_eq!(error.kind(), ErrorKind::Connection);
        }
    }
}
