use crate::{
    Error, Executor, FromRow, Result, Value,
    stream::{StreamExt, TryStreamExt},
    truncate_long,
};
use std::{future::Future, pin::pin};

/// Exactly one row decoded into `T`.
///
/// Zero rows is a `NotFound` error, a second row is a `Decode` error.
pub fn select_one<T, E>(
    executor: &mut E,
    sql: &str,
    args: &[Value],
) -> impl Future<Output = Result<T>> + Send
where
    T: FromRow + Send,
    E: Executor,
{
    async move {
        let mut rows = pin!(executor.fetch(sql, args));
        let Some(row) = rows.try_next().await? else {
            return Err(Error::NotFound {
                query: truncate_long(sql).to_string(),
            });
        };
        if rows.try_next().await?.is_some() {
            return Err(Error::decode::<T>(
                "the query returned more than one row while exactly one was expected",
            ));
        }
        T::from_row(row)
    }
}

/// Every row decoded into `T`, in the order returned by the server.
pub fn select_many<T, E>(
    executor: &mut E,
    sql: &str,
    args: &[Value],
) -> impl Future<Output = Result<Vec<T>>> + Send
where
    T: FromRow + Send,
    E: Executor,
{
    executor
        .fetch(sql, args)
        .map(|row| row.and_then(T::from_row))
        .try_collect()
}

/// Run a statement, discarding the affected rows count.
pub fn exec<E: Executor>(
    executor: &mut E,
    sql: &str,
    args: &[Value],
) -> impl Future<Output = Result<()>> + Send {
    let future = executor.execute(sql, args);
    async move { future.await.map(|_| ()) }
}
