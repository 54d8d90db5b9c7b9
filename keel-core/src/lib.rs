mod as_value;
mod collect;
mod entity;
mod error;
mod executor;
mod mapping;
mod page;
mod query;
mod registry;
mod sql_writer;
mod transaction;
mod util;
mod value;

pub use as_value::*;
pub use collect::*;
pub use entity::*;
pub use error::*;
pub use executor::*;
pub use mapping::*;
pub use page::*;
pub use query::*;
pub use registry::*;
pub use sql_writer::*;
pub use transaction::*;
pub use util::*;
pub use value::*;
pub mod stream {
    pub use ::futures::stream::*;
}
pub use ::futures::future;
