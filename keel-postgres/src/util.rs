use crate::ValueHolder;
use async_stream::try_stream;
use keel_core::{
    DisplayArgs, Error, Result, Row, RowLabeled, RowNames, RowsAffected, Value,
    stream::{Stream, StreamExt},
    truncate_long,
};
use std::{future::Future, pin::pin};
use tokio_postgres::RowStream;

/// Statement execution shared by pooled clients and open transactions.
pub(crate) trait RawClient: Sync {
    fn execute_values(
        &self,
        sql: &str,
        args: &[Value],
    ) -> impl Future<Output = Result<u64, tokio_postgres::Error>> + Send;

    fn query_values(
        &self,
        sql: &str,
        args: &[Value],
    ) -> impl Future<Output = Result<RowStream, tokio_postgres::Error>> + Send;
}

impl RawClient for tokio_postgres::Client {
    fn execute_values(
        &self,
        sql: &str,
        args: &[Value],
    ) -> impl Future<Output = Result<u64, tokio_postgres::Error>> + Send {
        self.execute_raw(sql, args.iter().cloned().map(ValueHolder))
    }

    fn query_values(
        &self,
        sql: &str,
        args: &[Value],
    ) -> impl Future<Output = Result<RowStream, tokio_postgres::Error>> + Send {
        self.query_raw(sql, args.iter().cloned().map(ValueHolder))
    }
}

impl RawClient for tokio_postgres::Transaction<'_> {
    fn execute_values(
        &self,
        sql: &str,
        args: &[Value],
    ) -> impl Future<Output = Result<u64, tokio_postgres::Error>> + Send {
        self.execute_raw(sql, args.iter().cloned().map(ValueHolder))
    }

    fn query_values(
        &self,
        sql: &str,
        args: &[Value],
    ) -> impl Future<Output = Result<RowStream, tokio_postgres::Error>> + Send {
        self.query_raw(sql, args.iter().cloned().map(ValueHolder))
    }
}

pub(crate) fn row_to_keel_row(row: tokio_postgres::Row) -> Result<Row> {
    (0..row.len())
        .map(|i| match row.try_get::<_, ValueHolder>(i) {
            Ok(v) => Ok(v.0),
            Err(e) => {
                let col = &row.columns()[i];
                Err(Error::decode::<Value>(format!(
                    "could not deserialize column {} `{}` of type {}: {}",
                    i,
                    col.name(),
                    col.type_(),
                    e
                )))
            }
        })
        .collect()
}

pub(crate) fn execution_error(sql: &str, args: &[Value], error: tokio_postgres::Error) -> Error {
    let e = Error::execution(
        format!(
            "While running the query:\n{}\nwith arguments {}",
            truncate_long(sql),
            DisplayArgs(args)
        ),
        error,
    );
    log::error!("{}", e.report());
    e
}

pub(crate) async fn execute_on<C: RawClient>(
    client: &C,
    sql: &str,
    args: &[Value],
) -> Result<RowsAffected> {
    log::debug!("{} {}", truncate_long(sql), DisplayArgs(args));
    let rows_affected = client
        .execute_values(sql, args)
        .await
        .map_err(|e| execution_error(sql, args, e))?;
    Ok(RowsAffected { rows_affected })
}

pub(crate) fn fetch_on<'c, 's, 'v, C: RawClient>(
    client: &'c C,
    sql: &'s str,
    args: &'v [Value],
) -> impl Stream<Item = Result<RowLabeled>> + Send + use<'c, 's, 'v, C> {
    try_stream! {
        log::debug!("{} {}", truncate_long(sql), DisplayArgs(args));
        let stream = client
            .query_values(sql, args)
            .await
            .map_err(|e| execution_error(sql, args, e))?;
        let mut stream = pin!(stream);
        let mut labels: Option<RowNames> = None;
        while let Some(row) = stream
            .next()
            .await
            .transpose()
            .map_err(|e| execution_error(sql, args, e))?
        {
            let labels = labels.get_or_insert_with(|| {
                row.columns().iter().map(|c| c.name().to_string()).collect()
            });
            yield RowLabeled::new(labels.clone(), row_to_keel_row(row)?);
        }
    }
}
