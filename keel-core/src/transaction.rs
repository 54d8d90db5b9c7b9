use crate::{Executor, Result};
use std::future::Future;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    #[default]
    ReadWrite,
    ReadOnly,
}

/// An open transaction. Dropping it without committing rolls it back.
pub trait Transaction: Executor {
    fn access_mode(&self) -> AccessMode;
    fn commit(self) -> impl Future<Output = Result<()>> + Send;
    fn rollback(self) -> impl Future<Output = Result<()>> + Send;
}

/// Whether a unit of work opens its own transaction or joins the caller's.
///
/// Joining runs the work on the given transaction without issuing any
/// `BEGIN`, `COMMIT` or `ROLLBACK`, the owner of the transaction decides its
/// outcome.
#[derive(Debug)]
pub enum TxScope<'t, Tx> {
    OpenNew,
    UseExisting(&'t mut Tx),
}

impl<'t, Tx> TxScope<'t, Tx> {
    pub fn is_nested(&self) -> bool {
        matches!(self, TxScope::UseExisting(..))
    }
}

impl<'t, Tx> From<Option<&'t mut Tx>> for TxScope<'t, Tx> {
    fn from(value: Option<&'t mut Tx>) -> Self {
        match value {
            Some(tx) => TxScope::UseExisting(tx),
            None => TxScope::OpenNew,
        }
    }
}

impl<'t, Tx> From<&'t mut Tx> for TxScope<'t, Tx> {
    fn from(value: &'t mut Tx) -> Self {
        TxScope::UseExisting(value)
    }
}
