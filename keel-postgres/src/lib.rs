mod connection;
mod database;
mod migrate;
mod options;
mod pool;
mod transaction;
mod util;
mod value_holder;

pub use connection::*;
pub use database::*;
pub use migrate::{Migration, MigrationSource};
pub use options::*;
pub use transaction::*;
pub(crate) use value_holder::*;
