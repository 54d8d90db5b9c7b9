use crate::{
    PgTransaction,
    util::{execute_on, fetch_on},
};
use keel_core::{
    AccessMode, Error, Executor, Result, RowLabeled, RowsAffected, Value, stream::Stream,
};

/// A connection borrowed from the pool, returned to it on drop.
#[derive(Debug)]
pub struct PgConnection {
    pub(crate) object: deadpool_postgres::Object,
}

impl PgConnection {
    pub(crate) fn new(object: deadpool_postgres::Object) -> Self {
        Self { object }
    }

    pub(crate) fn client(&self) -> &tokio_postgres::Client {
        &self.object
    }

    /// Start a transaction with the given access mode on this connection.
    pub async fn begin(&mut self, mode: AccessMode) -> Result<PgTransaction<'_>> {
        let client: &mut tokio_postgres::Client = &mut self.object;
        let transaction = client
            .build_transaction()
            .read_only(mode == AccessMode::ReadOnly)
            .start()
            .await
            .map_err(|e| {
                let e = Error::execution("While beginning a transaction", e);
                log::error!("{}", e.report());
                e
            })?;
        Ok(PgTransaction::new(transaction, mode))
    }

    /// Round trip to the server.
    pub async fn ping(&self) -> Result<()> {
        self.client()
            .simple_query("SELECT 1")
            .await
            .map(|_| ())
            .map_err(|e| Error::connection("The server did not answer the ping", Some(e.into())))
    }
}

impl Executor for PgConnection {
    async fn execute(&mut self, sql: &str, args: &[Value]) -> Result<RowsAffected> {
        execute_on(self.client(), sql, args).await
    }

    fn fetch(&mut self, sql: &str, args: &[Value]) -> impl Stream<Item = Result<RowLabeled>> + Send {
        fetch_on(self.client(), sql, args)
    }
}
