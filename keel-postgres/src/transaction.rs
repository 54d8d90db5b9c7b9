use crate::util::{execute_on, fetch_on};
use keel_core::{
    AccessMode, Error, Executor, Result, RowLabeled, RowsAffected, Transaction, Value,
    stream::Stream,
};

/// An open transaction on a pooled connection.
///
/// Dropping it without calling [`Transaction::commit`] rolls it back.
pub struct PgTransaction<'c> {
    transaction: tokio_postgres::Transaction<'c>,
    mode: AccessMode,
}

impl<'c> PgTransaction<'c> {
    pub(crate) fn new(transaction: tokio_postgres::Transaction<'c>, mode: AccessMode) -> Self {
        Self { transaction, mode }
    }
}

impl<'c> Executor for PgTransaction<'c> {
    async fn execute(&mut self, sql: &str, args: &[Value]) -> Result<RowsAffected> {
        execute_on(&self.transaction, sql, args).await
    }

    fn fetch(&mut self, sql: &str, args: &[Value]) -> impl Stream<Item = Result<RowLabeled>> + Send {
        fetch_on(&self.transaction, sql, args)
    }
}

impl<'c> Transaction for PgTransaction<'c> {
    fn access_mode(&self) -> AccessMode {
        self.mode
    }

    async fn commit(self) -> Result<()> {
        self.transaction.commit().await.map_err(|e| {
            let e = Error::execution("While committing the transaction", e);
            log::error!("{}", e.report());
            e
        })
    }

    async fn rollback(self) -> Result<()> {
        self.transaction
            .rollback()
            .await
            .map_err(|e| Error::execution("While rolling back the transaction", e))
    }
}
