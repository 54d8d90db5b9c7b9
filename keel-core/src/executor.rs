use crate::{
    Error, Result, RowLabeled, RowsAffected, Value,
    stream::{Stream, TryStreamExt},
    truncate_long,
};
use std::{future::Future, pin::pin};

/// Something that runs SQL: a pooled connection or an open transaction.
///
/// Arguments bind positionally to `$1..$n`. Statements on the same executor
/// run one after the other, the `&mut` receiver enforces it.
pub trait Executor: Send {
    /// Run a statement that returns no rows.
    fn execute(
        &mut self,
        sql: &str,
        args: &[Value],
    ) -> impl Future<Output = Result<RowsAffected>> + Send;

    /// Run a query and stream its rows in server order.
    fn fetch(
        &mut self,
        sql: &str,
        args: &[Value],
    ) -> impl Stream<Item = Result<RowLabeled>> + Send;

    /// First column of the first row.
    fn fetch_scalar(
        &mut self,
        sql: &str,
        args: &[Value],
    ) -> impl Future<Output = Result<Value>> + Send {
        async move {
            let mut rows = pin!(self.fetch(sql, args));
            let Some(row) = rows.try_next().await? else {
                return Err(Error::NotFound {
                    query: truncate_long(sql).to_string(),
                });
            };
            row.values
                .into_vec()
                .into_iter()
                .next()
                .ok_or_else(|| Error::decode::<Value>("the row has no columns"))
        }
    }
}
