//! Declarative struct-to-table mapping and transaction-scoped data access for
//! Postgres.
//!
//! ```ignore
//! use keel::{Database, DatabaseOptions, Entity, TxScope};
//!
//! #[derive(Entity)]
//! #[keel(table = "books b")]
//! struct Book {
//!     #[keel(primary)]
//!     id: i64,
//!     title: String,
//!     #[keel(query = "(SELECT count(*) FROM reviews r WHERE r.book_id = b.id)")]
//!     reviews: i64,
//! }
//!
//! let database = Database::connect(DatabaseOptions::from_env()?, Path::new("migrations")).await?;
//! database
//!     .with_tx::<_, keel::Error, _>(TxScope::OpenNew, async |tx| {
//!         let mut book = Book::find_one(tx, "WHERE b.id = $1", &[1i64.into()]).await?;
//!         book.title = "Solaris".into();
//!         book.save(tx).await
//!     })
//!     .await?;
//! ```
pub use keel_core::*;
pub use keel_macros::Entity;
pub use keel_postgres::*;
