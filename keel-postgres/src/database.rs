use crate::{
    DatabaseOptions, MigrationSource, PgConnection, PgTransaction, migrate,
    pool::{connect_pool, ping},
};
use deadpool_postgres::Pool;
use keel_core::{AccessMode, Error, Result, Transaction, TxScope};
use std::{
    fmt,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};
use tokio::{
    sync::{RwLock, watch},
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseState {
    Connected,
    /// The last health check failed, a new pool is being built.
    Reconnecting,
    /// The pool was closed with [`DisconnectMode::PreserveForReuse`], the
    /// health monitor will reconnect it.
    Disconnected,
    /// Permanently closed.
    TornDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectMode {
    /// Close the pool and stop the health monitor for good.
    Teardown,
    /// Close the pool but keep monitoring, the next check reconnects.
    PreserveForReuse,
}

struct Shared {
    options: DatabaseOptions,
    pool: RwLock<Pool>,
    state: Mutex<DatabaseState>,
    transactions: AtomicU64,
    reconnections: AtomicU64,
}

struct HealthMonitor {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// A pooled Postgres database kept healthy by a background monitor.
///
/// Queries and transactions run on the caller's task. The monitor pings the
/// pool every `health_interval` and replaces it when the ping fails.
pub struct Database {
    shared: Arc<Shared>,
    monitor: Mutex<Option<HealthMonitor>>,
}

impl Shared {
    fn state(&self) -> DatabaseState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: DatabaseState) {
        let mut current = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != DatabaseState::TornDown {
            *current = state;
        }
    }

    async fn current_pool(&self) -> Result<Pool> {
        if self.state() == DatabaseState::TornDown {
            return Err(Error::connection("The database was torn down", None));
        }
        Ok(self.pool.read().await.clone())
    }

    async fn check_health(&self) -> Result<()> {
        let pool = self.current_pool().await?;
        let failure = match ping(&pool, self.options.health_timeout).await {
            Ok(()) => {
                self.set_state(DatabaseState::Connected);
                return Ok(());
            }
            Err(e) => e,
        };
        log::warn!("The database is not healthy: {}", failure.report());
        self.set_state(DatabaseState::Reconnecting);
        let pool = match connect_pool(&self.options).await {
            Ok(pool) => pool,
            Err(e) => {
                log::error!("Could not reconnect to the database: {}", e.report());
                return Err(e);
            }
        };
        if self.state() == DatabaseState::TornDown {
            pool.close();
            return Err(Error::connection("The database was torn down", None));
        }
        let previous = std::mem::replace(&mut *self.pool.write().await, pool);
        previous.close();
        self.reconnections.fetch_add(1, Ordering::Relaxed);
        self.set_state(DatabaseState::Connected);
        log::info!("Reconnected to the database");
        Ok(())
    }
}

async fn health_monitor(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let mut ticks = interval(shared.options.health_interval);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticks.tick().await;
    loop {
        tokio::select! {
            _ = ticks.tick() => {
                let _ = shared.check_health().await;
            }
            _ = shutdown.changed() => break,
        }
    }
    log::info!("Database health monitor stopped");
}

impl Database {
    /// Connects, applies the pending migrations of `migrations` and starts
    /// the health monitor.
    pub async fn connect(
        options: DatabaseOptions,
        migrations: impl MigrationSource,
    ) -> Result<Self> {
        let pool = connect_pool(&options).await?;
        let applied = async {
            let object = pool.get().await.map_err(|e| {
                Error::connection("Could not get a connection from the pool", Some(e.into()))
            })?;
            migrate::migrate(&mut PgConnection::new(object), &migrations).await
        }
        .await;
        match applied {
            Ok(count) => log::info!("{} migrations applied", count),
            Err(e) => {
                pool.close();
                let e = Error::connection(
                    "Failed to run the database migrations",
                    Some(Box::new(e)),
                );
                log::error!("{}", e.report());
                return Err(e);
            }
        }
        Ok(Self::start(options, pool))
    }

    pub async fn connect_without_migrations(options: DatabaseOptions) -> Result<Self> {
        let pool = connect_pool(&options).await?;
        Ok(Self::start(options, pool))
    }

    fn start(options: DatabaseOptions, pool: Pool) -> Self {
        let shared = Arc::new(Shared {
            options,
            pool: RwLock::new(pool),
            state: Mutex::new(DatabaseState::Connected),
            transactions: AtomicU64::new(0),
            reconnections: AtomicU64::new(0),
        });
        let (shutdown, receiver) = watch::channel(false);
        let handle = tokio::spawn(health_monitor(shared.clone(), receiver));
        Self {
            shared,
            monitor: Mutex::new(Some(HealthMonitor { shutdown, handle })),
        }
    }

    pub fn options(&self) -> &DatabaseOptions {
        &self.shared.options
    }

    pub fn state(&self) -> DatabaseState {
        self.shared.state()
    }

    /// Number of transactions opened by [`Database::with_transaction`].
    pub fn transactions_started(&self) -> u64 {
        self.shared.transactions.load(Ordering::Relaxed)
    }

    /// Number of times the health monitor replaced the pool.
    pub fn reconnections(&self) -> u64 {
        self.shared.reconnections.load(Ordering::Relaxed)
    }

    /// Runs one health check now, reconnecting when it fails.
    pub async fn check_health(&self) -> Result<()> {
        self.shared.check_health().await
    }

    /// Borrows a connection for work outside of a transaction.
    pub async fn acquire(&self) -> Result<PgConnection> {
        let pool = self.shared.current_pool().await?;
        let object = pool.get().await.map_err(|e| {
            let e = Error::connection("Could not get a connection from the pool", Some(e.into()));
            log::error!("{}", e.report());
            e
        })?;
        Ok(PgConnection::new(object))
    }

    /// Runs `f` inside a transaction.
    ///
    /// With [`TxScope::UseExisting`] `f` joins the caller's transaction and
    /// nothing is begun or ended here. With [`TxScope::OpenNew`] a
    /// transaction with access `mode` is begun, committed when `f` succeeds
    /// and rolled back when it fails. A failed rollback is only logged, the
    /// error of `f` is returned.
    pub async fn with_transaction<T, E, F>(
        &self,
        mode: AccessMode,
        scope: TxScope<'_, PgTransaction<'_>>,
        f: F,
    ) -> Result<T, E>
    where
        F: AsyncFnOnce(&mut PgTransaction<'_>) -> Result<T, E>,
        E: From<Error>,
    {
        match scope {
            TxScope::UseExisting(transaction) => {
                if mode == AccessMode::ReadWrite && transaction.access_mode() == AccessMode::ReadOnly
                {
                    log::warn!("A read-write unit of work joined a read-only transaction");
                }
                f(transaction).await
            }
            TxScope::OpenNew => {
                let mut connection = self.acquire().await?;
                let mut transaction = connection.begin(mode).await?;
                self.shared.transactions.fetch_add(1, Ordering::Relaxed);
                match f(&mut transaction).await {
                    Ok(value) => {
                        transaction.commit().await?;
                        Ok(value)
                    }
                    Err(e) => {
                        if let Err(rollback) = transaction.rollback().await {
                            log::debug!("Rollback failed: {}", rollback.report());
                        }
                        Err(e)
                    }
                }
            }
        }
    }

    /// Read-write [`Database::with_transaction`].
    pub async fn with_tx<T, E, F>(
        &self,
        scope: TxScope<'_, PgTransaction<'_>>,
        f: F,
    ) -> Result<T, E>
    where
        F: AsyncFnOnce(&mut PgTransaction<'_>) -> Result<T, E>,
        E: From<Error>,
    {
        self.with_transaction(AccessMode::ReadWrite, scope, f).await
    }

    /// Read-only [`Database::with_transaction`].
    pub async fn with_read_tx<T, E, F>(
        &self,
        scope: TxScope<'_, PgTransaction<'_>>,
        f: F,
    ) -> Result<T, E>
    where
        F: AsyncFnOnce(&mut PgTransaction<'_>) -> Result<T, E>,
        E: From<Error>,
    {
        self.with_transaction(AccessMode::ReadOnly, scope, f).await
    }

    /// Closes the pool. Calling it again has no further effect.
    pub async fn disconnect(&self, mode: DisconnectMode) {
        if self.state() == DatabaseState::TornDown {
            return;
        }
        if mode == DisconnectMode::Teardown {
            let monitor = self
                .monitor
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if let Some(HealthMonitor { shutdown, handle }) = monitor {
                let _ = shutdown.send(true);
                if let Err(e) = handle.await {
                    log::error!("The health monitor ended abnormally: {}", e);
                }
            }
        }
        self.shared.pool.read().await.close();
        let state = match mode {
            DisconnectMode::Teardown => DatabaseState::TornDown,
            DisconnectMode::PreserveForReuse => DatabaseState::Disconnected,
        };
        self.shared.set_state(state);
        log::info!("Database connection pool closed");
    }

    /// True once the health monitor task has finished.
    pub fn is_monitor_stopped(&self) -> bool {
        self.monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_none_or(|m| m.handle.is_finished())
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Some(monitor) = self
            .monitor
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            let _ = monitor.shutdown.send(true);
        }
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("options", &self.shared.options)
            .field("state", &self.state())
            .field("transactions_started", &self.transactions_started())
            .field("reconnections", &self.reconnections())
            .finish()
    }
}
