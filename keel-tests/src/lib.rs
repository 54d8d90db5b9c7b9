mod books;
mod nested;
mod pageable;
mod transactions;
mod upsert;

use books::books;
use log::LevelFilter;
use nested::nested;
use pageable::pageable;
use std::{env, path::Path};
use transactions::transactions;
use upsert::upsert;

pub use keel::Database;

pub fn init_logs() {
    let mut logger = env_logger::builder();
    logger
        .is_test(true)
        .format_file(true)
        .format_line_number(true);
    if env::var("RUST_LOG").is_err() {
        logger.filter_level(LevelFilter::Warn);
    }
    let _ = logger.try_init();
}

/// Goose migrations creating the tables used by the suites.
pub fn migrations() -> &'static Path {
    Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/migrations"))
}

/// Runs every suite against a database migrated with [`migrations`].
pub async fn execute_tests(database: &Database) {
    books(database).await;
    upsert(database).await;
    pageable(database).await;
    transactions(database).await;
    nested(database).await;
}

#[macro_export]
macro_rules! silent_logs {
    ($($code:tt)+) => {{
        let level = log::max_level();
        log::set_max_level(log::LevelFilter::Off);
        $($code)+
        log::set_max_level(level);
    }};
}
