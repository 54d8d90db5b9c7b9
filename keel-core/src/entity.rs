use crate::{
    EntityMapping, EntityTags, Executor, Page, PageRequest, Result, RowLabeled, Value, exec,
    generate_insert_upsert, generate_select, registry, select_many, select_one, select_pageable,
};
use std::{future::Future, sync::Arc};

/// Decoding of a labeled result row.
pub trait FromRow: Sized {
    fn from_row(row: RowLabeled) -> Result<Self>;
}

/// A type mapped to a table, usually through `#[derive(Entity)]`.
///
/// The `fragment` arguments of the finders are raw SQL appended after the
/// generated `SELECT` (a `WHERE`, `ORDER BY`, ... clause). They are trusted
/// text, values must go through `args`.
pub trait Entity: FromRow + Send + Sync + 'static {
    /// Annotations captured from the type definition.
    fn tags() -> &'static EntityTags;

    /// Values of the mapped fields, aligned with `EntityMapping::columns`.
    fn row(&self) -> Vec<Value>;

    fn mapping() -> Result<Arc<EntityMapping>> {
        registry::entity_mapping::<Self>()
    }

    /// Generated select followed by `fragment`.
    fn select_query(fragment: &str) -> Result<String> {
        let mut query = generate_select::<Self>()?;
        let fragment = fragment.trim();
        if !fragment.is_empty() {
            query.push(' ');
            query.push_str(fragment);
        }
        Ok(query)
    }

    fn find_one<Exec: Executor>(
        executor: &mut Exec,
        fragment: &str,
        args: &[Value],
    ) -> impl Future<Output = Result<Self>> + Send {
        async move {
            let query = Self::select_query(fragment)?;
            select_one(executor, &query, args).await
        }
    }

    fn find<Exec: Executor>(
        executor: &mut Exec,
        fragment: &str,
        args: &[Value],
    ) -> impl Future<Output = Result<Vec<Self>>> + Send {
        async move {
            let query = Self::select_query(fragment)?;
            select_many(executor, &query, args).await
        }
    }

    /// `fragment` must not contain `ORDER BY`, `LIMIT` or `OFFSET`, the page
    /// request supplies them.
    fn find_page<Exec: Executor>(
        executor: &mut Exec,
        request: &PageRequest,
        fragment: &str,
        args: &[Value],
    ) -> impl Future<Output = Result<Page<Self>>> + Send {
        async move {
            let query = Self::select_query(fragment)?;
            select_pageable(executor, request, &query, args).await
        }
    }

    /// Insert the entity, or update the non-key columns of the existing row.
    fn save<Exec: Executor>(&self, executor: &mut Exec) -> impl Future<Output = Result<()>> + Send {
        let statement = generate_insert_upsert(self);
        async move {
            let (query, args) = statement?;
            exec(executor, &query, &args).await
        }
    }
}
