use crate::PgConnection;
use keel_core::{Error, Result};
use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

const TRACKING_TABLE: &str = "keel_schema_migrations";
/// Advisory lock key serialising concurrent runners ("keel" in ASCII).
const LOCK_KEY: i64 = 0x6b65_656c;

/// One versioned schema change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub version: i64,
    pub name: String,
    pub up: String,
    /// Kept for tooling, never run automatically.
    pub down: String,
}

impl Migration {
    pub fn new(version: i64, name: impl Into<String>, up: impl Into<String>) -> Self {
        Self {
            version,
            name: name.into(),
            up: up.into(),
            down: String::new(),
        }
    }

    pub fn with_down(mut self, down: impl Into<String>) -> Self {
        self.down = down.into();
        self
    }

    /// Parses a `<version>_<name>.sql` file made of `-- +goose Up` and
    /// `-- +goose Down` sections.
    pub fn parse(file_name: &str, content: &str) -> Result<Self> {
        let stem = file_name.strip_suffix(".sql").unwrap_or(file_name);
        let Some((version, name)) = stem.split_once('_') else {
            return Err(Error::Migration(format!(
                "`{file_name}` must be named like `<version>_<name>.sql`"
            )));
        };
        let version = version.parse::<i64>().map_err(|_| {
            Error::Migration(format!("`{file_name}` does not start with a numeric version"))
        })?;
        enum Section {
            None,
            Up,
            Down,
        }
        let mut section = Section::None;
        let mut seen_up = false;
        let (mut up, mut down) = (String::new(), String::new());
        for line in content.lines() {
            let trimmed = line.trim();
            if let Some(annotation) = trimmed.strip_prefix("-- +goose") {
                match annotation.trim() {
                    v if v.eq_ignore_ascii_case("up") => {
                        section = Section::Up;
                        seen_up = true;
                    }
                    v if v.eq_ignore_ascii_case("down") => section = Section::Down,
                    "StatementBegin" | "StatementEnd" => {}
                    v => {
                        return Err(Error::Migration(format!(
                            "`{file_name}` has an unknown annotation `-- +goose {v}`"
                        )));
                    }
                }
                continue;
            }
            let target = match section {
                Section::Up => &mut up,
                Section::Down => &mut down,
                Section::None if trimmed.is_empty() || trimmed.starts_with("--") => continue,
                Section::None => {
                    return Err(Error::Migration(format!(
                        "`{file_name}` has statements before `-- +goose Up`"
                    )));
                }
            };
            target.push_str(line);
            target.push('\n');
        }
        if !seen_up {
            return Err(Error::Migration(format!(
                "`{file_name}` has no `-- +goose Up` section"
            )));
        }
        Ok(Self {
            version,
            name: name.to_string(),
            up: up.trim().to_string(),
            down: down.trim().to_string(),
        })
    }
}

/// Where the schema migrations come from.
pub trait MigrationSource {
    fn migrations(&self) -> Result<Vec<Migration>>;
}

impl MigrationSource for Path {
    fn migrations(&self) -> Result<Vec<Migration>> {
        let context = |e: std::io::Error| {
            Error::Migration(format!("Could not read `{}`: {}", self.display(), e))
        };
        let mut result = Vec::new();
        for entry in fs::read_dir(self).map_err(context)? {
            let path = entry.map_err(context)?.path();
            let Some(file_name) = path.file_name().and_then(|v| v.to_str()) else {
                continue;
            };
            if !path.is_file() || !file_name.ends_with(".sql") {
                continue;
            }
            let content = fs::read_to_string(&path).map_err(context)?;
            result.push(Migration::parse(file_name, &content)?);
        }
        Ok(result)
    }
}

impl MigrationSource for PathBuf {
    fn migrations(&self) -> Result<Vec<Migration>> {
        self.as_path().migrations()
    }
}

impl MigrationSource for [Migration] {
    fn migrations(&self) -> Result<Vec<Migration>> {
        Ok(self.to_vec())
    }
}

impl MigrationSource for Vec<Migration> {
    fn migrations(&self) -> Result<Vec<Migration>> {
        Ok(self.clone())
    }
}

impl<T: MigrationSource + ?Sized> MigrationSource for &T {
    fn migrations(&self) -> Result<Vec<Migration>> {
        (**self).migrations()
    }
}

/// Migrations sorted by version, rejecting duplicated versions.
pub(crate) fn ordered(source: &(impl MigrationSource + ?Sized)) -> Result<Vec<Migration>> {
    let mut migrations = source.migrations()?;
    migrations.sort_by_key(|m| m.version);
    if let Some(pair) = migrations.windows(2).find(|w| w[0].version == w[1].version) {
        return Err(Error::Migration(format!(
            "version {} is used by both `{}` and `{}`",
            pair[0].version, pair[0].name, pair[1].name
        )));
    }
    Ok(migrations)
}

fn failed(context: String) -> impl FnOnce(tokio_postgres::Error) -> Error {
    move |e| {
        let e = Error::execution(context, e);
        log::error!("{}", e.report());
        e
    }
}

/// Applies the pending migrations of `source`, each one in its own
/// transaction. Returns how many were applied.
pub(crate) async fn migrate(
    connection: &mut PgConnection,
    source: &(impl MigrationSource + ?Sized),
) -> Result<usize> {
    let migrations = ordered(source)?;
    let client: &mut tokio_postgres::Client = &mut connection.object;
    {
        let tx = client
            .transaction()
            .await
            .map_err(failed("While preparing the migrations".into()))?;
        tx.execute("SELECT pg_advisory_xact_lock($1)", &[&LOCK_KEY])
            .await
            .map_err(failed("While locking the migrations".into()))?;
        tx.batch_execute(&format!(
            "CREATE TABLE IF NOT EXISTS {TRACKING_TABLE} (\
             version BIGINT PRIMARY KEY, \
             name TEXT NOT NULL, \
             applied_at TIMESTAMPTZ NOT NULL DEFAULT now())"
        ))
        .await
        .map_err(failed(format!("While creating {TRACKING_TABLE}")))?;
        tx.commit()
            .await
            .map_err(failed(format!("While creating {TRACKING_TABLE}")))?;
    }
    let applied: HashSet<i64> = client
        .query(&format!("SELECT version FROM {TRACKING_TABLE}"), &[])
        .await
        .map_err(failed("While reading the applied migrations".into()))?
        .iter()
        .map(|row| row.get::<_, i64>(0))
        .collect();
    let mut count = 0;
    for migration in migrations.iter().filter(|m| !applied.contains(&m.version)) {
        let context = format!(
            "While applying migration {} `{}`",
            migration.version, migration.name
        );
        let tx = client
            .transaction()
            .await
            .map_err(failed(context.clone()))?;
        tx.execute("SELECT pg_advisory_xact_lock($1)", &[&LOCK_KEY])
            .await
            .map_err(failed(context.clone()))?;
        let done = tx
            .query_opt(
                &format!("SELECT 1 FROM {TRACKING_TABLE} WHERE version = $1"),
                &[&migration.version],
            )
            .await
            .map_err(failed(context.clone()))?;
        if done.is_some() {
            continue;
        }
        tx.batch_execute(&migration.up)
            .await
            .map_err(failed(context.clone()))?;
        tx.execute(
            &format!("INSERT INTO {TRACKING_TABLE} (version, name) VALUES ($1, $2)"),
            &[&migration.version, &migration.name],
        )
        .await
        .map_err(failed(context.clone()))?;
        tx.commit().await.map_err(failed(context))?;
        log::info!("Applied migration {} `{}`", migration.version, migration.name);
        count += 1;
    }
    Ok(count)
}
