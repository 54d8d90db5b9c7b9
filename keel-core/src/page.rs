use crate::{
    Error, Executor, FromRow, GenericSqlWriter, Result, SqlWriter, Value, select_many,
};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Requested page: zero-based `page`, `size` rows per page and sort
/// directives (`column` or `column,asc|desc`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
    #[serde(default)]
    pub sort: Vec<String>,
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page,
            size,
            sort: Vec::new(),
        }
    }

    pub fn with_sort(mut self, directive: impl Into<String>) -> Self {
        self.sort.push(directive.into());
        self
    }

    pub fn offset(&self) -> u64 {
        self.page as u64 * self.size as u64
    }
}

/// One page of results plus the totals needed to navigate the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub pageable: PageRequest,
    pub total_elements: u64,
    pub total_pages: u64,
    pub number: u32,
    pub size: u32,
    pub number_of_elements: u32,
    #[serde(rename = "last")]
    pub is_last: bool,
    #[serde(rename = "first")]
    pub is_first: bool,
    #[serde(rename = "empty")]
    pub is_empty: bool,
}

impl<T> Page<T> {
    /// Envelope for `content`, fetched with `request` out of `total_elements`
    /// rows. `request.size` must be positive.
    pub fn new(content: Vec<T>, request: PageRequest, total_elements: u64) -> Self {
        let size = request.size.max(1) as u64;
        let total_pages = total_elements.div_ceil(size);
        let number = request.page;
        let number_of_elements = content.len() as u32;
        Self {
            content,
            total_elements,
            total_pages,
            number,
            size: request.size,
            number_of_elements,
            is_last: total_pages == 0 || number as u64 + 1 >= total_pages,
            is_first: number == 0,
            is_empty: number_of_elements == 0,
            pageable: request,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        let Page {
            content,
            pageable,
            total_elements,
            total_pages,
            number,
            size,
            number_of_elements,
            is_last,
            is_first,
            is_empty,
        } = self;
        Page {
            content: content.into_iter().map(f).collect(),
            pageable,
            total_elements,
            total_pages,
            number,
            size,
            number_of_elements,
            is_last,
            is_first,
            is_empty,
        }
    }

    /// Same envelope around different content, the counters are kept as they
    /// are.
    pub fn with_content<U>(self, content: Vec<U>) -> Page<U> {
        Page {
            content,
            pageable: self.pageable,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
            number: self.number,
            size: self.size,
            number_of_elements: self.number_of_elements,
            is_last: self.is_last,
            is_first: self.is_first,
            is_empty: self.is_empty,
        }
    }
}

/// Run `query` as a page of `request`.
///
/// The sort directives become an `ORDER BY`, `LIMIT` and `OFFSET` bind to the
/// two placeholders after `args`. The total comes from
/// `SELECT COUNT(*) FROM (<query ORDER BY ...>) AS count_query` bound to
/// `args` only. `query` must not end with its own `ORDER BY`/`LIMIT`.
pub fn select_pageable<T, E>(
    executor: &mut E,
    request: &PageRequest,
    query: &str,
    args: &[Value],
) -> impl Future<Output = Result<Page<T>>> + Send
where
    T: FromRow + Send,
    E: Executor,
{
    async move {
        if request.size == 0 {
            return Err(Error::InvalidArgument(
                "the page size must be greater than zero".into(),
            ));
        }
        let offset = i64::try_from(request.offset()).map_err(|_| {
            Error::InvalidArgument(format!(
                "page {} of size {} is out of range",
                request.page, request.size
            ))
        })?;
        let writer = GenericSqlWriter::new();
        let mut ordered = query.trim_end().trim_end_matches(';').to_string();
        writer.write_order_by(&mut ordered, &request.sort);
        let mut paged = ordered.clone();
        writer.write_limit_offset(&mut paged, args.len());
        let mut paged_args = Vec::with_capacity(args.len() + 2);
        paged_args.extend_from_slice(args);
        paged_args.push(Value::Int64(Some(request.size.into())));
        paged_args.push(Value::Int64(Some(offset)));
        let content = select_many::<T, E>(executor, &paged, &paged_args).await?;

        let mut count = String::with_capacity(ordered.len() + 48);
        writer.write_count(&mut count, &ordered);
        let total = executor.fetch_scalar(&count, args).await?;
        let total = total
            .as_i64()
            .flatten()
            .and_then(|v| u64::try_from(v).ok())
            .ok_or_else(|| Error::decode::<u64>(format!("unexpected row count {total:?}")))?;
        Ok(Page::new(content, request.clone(), total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        AsValue, RowLabeled, RowsAffected,
        stream::{self, Stream},
    };
    use std::sync::Arc;

    #[derive(Debug, PartialEq)]
    struct Item(i64);

    impl FromRow for Item {
        fn from_row(row: RowLabeled) -> Result<Self> {
            let value = row
                .get_column("id")
                .cloned()
                .ok_or_else(|| Error::decode::<Self>("missing id"))?;
            Ok(Item(i64::try_from_value(value)?))
        }
    }

    /// Five rows with ids 1..=5, honouring `LIMIT`/`OFFSET` from the last two
    /// arguments.
    #[derive(Default)]
    struct FiveRows {
        statements: Vec<(String, Vec<Value>)>,
    }

    impl Executor for FiveRows {
        async fn execute(&mut self, _sql: &str, _args: &[Value]) -> Result<RowsAffected> {
            Ok(RowsAffected::default())
        }

        fn fetch(
            &mut self,
            sql: &str,
            args: &[Value],
        ) -> impl Stream<Item = Result<RowLabeled>> + Send {
            self.statements.push((sql.to_string(), args.to_vec()));
            let labels: Arc<[String]> = Arc::from(["id".to_string()]);
            let rows: Vec<i64> = if sql.starts_with("SELECT COUNT(*)") {
                vec![5]
            } else {
                let n = args.len();
                let limit = args[n - 2].as_i64().flatten().unwrap_or(0) as usize;
                let offset = args[n - 1].as_i64().flatten().unwrap_or(0) as usize;
                (1..=5).skip(offset).take(limit).collect()
            };
            stream::iter(rows.into_iter().map(move |v| {
                Ok(RowLabeled::new(
                    labels.clone(),
                    [Value::Int64(Some(v))].into(),
                ))
            }))
        }
    }

    #[tokio::test]
    async fn second_page_of_two() {
        let mut executor = FiveRows::default();
        let request = PageRequest::new(1, 2).with_sort("id,asc");
        let page: Page<Item> = select_pageable(
            &mut executor,
            &request,
            "SELECT i.* FROM items i WHERE i.kind = $1",
            &[Value::from("book")],
        )
        .await
        .unwrap();
        assert_eq!(page.content, [Item(3), Item(4)]);
        assert_eq!(page.total_elements, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.number_of_elements, 2);
        assert!(!page.is_first);
        assert!(!page.is_last);
        assert!(!page.is_empty);

        let (content, content_args) = &executor.statements[0];
        assert_eq!(
            content,
            "SELECT i.* FROM items i WHERE i.kind = $1 ORDER BY id ASC LIMIT $2 OFFSET $3"
        );
        assert_eq!(content_args.len(), 3);
        let (count, count_args) = &executor.statements[1];
        assert_eq!(
            count,
            "SELECT COUNT(*) FROM (SELECT i.* FROM items i WHERE i.kind = $1 ORDER BY id ASC) AS count_query"
        );
        assert_eq!(count_args, &vec![Value::from("book")]);
    }

    #[tokio::test]
    async fn last_page_is_partial() {
        let mut executor = FiveRows::default();
        let page: Page<Item> = select_pageable(
            &mut executor,
            &PageRequest::new(2, 2),
            "SELECT i.* FROM items i",
            &[],
        )
        .await
        .unwrap();
        assert_eq!(page.content, [Item(5)]);
        assert_eq!(page.number_of_elements, 1);
        assert!(page.is_last);
        assert_eq!(
            executor.statements[0].0,
            "SELECT i.* FROM items i LIMIT $1 OFFSET $2"
        );
    }

    #[tokio::test]
    async fn zero_size_is_rejected_before_querying() {
        let mut executor = FiveRows::default();
        let error = select_pageable::<Item, _>(
            &mut executor,
            &PageRequest::new(0, 0),
            "SELECT 1",
            &[],
        )
        .await
        .unwrap_err();
        assert_eq!(error.kind(), crate::ErrorKind::InvalidArgument);
        assert!(executor.statements.is_empty());
    }

    #[tokio::test]
    async fn huge_offset_is_rejected_before_querying() {
        let mut executor = FiveRows::default();
        let error = select_pageable::<Item, _>(
            &mut executor,
            &PageRequest::new(u32::MAX, u32::MAX),
            "SELECT 1",
            &[],
        )
        .await
        .unwrap_err();
        assert_eq!(error.kind(), crate::ErrorKind::InvalidArgument);
        assert!(executor.statements.is_empty());
    }

    #[test]
    fn envelope_flags() {
        let empty = Page::<i32>::new(vec![], PageRequest::new(0, 10), 0);
        assert_eq!(empty.total_pages, 0);
        assert!(empty.is_first && empty.is_last && empty.is_empty);

        let page = Page::new(vec![1, 2], PageRequest::new(0, 2), 3);
        assert!(page.is_first && !page.is_last);
        let page = page.map(|v| v.to_string());
        assert_eq!(page.content, ["1", "2"]);
        assert_eq!(page.total_pages, 2);
        let page = page.with_content(vec![true]);
        assert_eq!(page.number_of_elements, 2);
    }

    #[test]
    fn serialized_names() {
        let page = Page::new(vec![7], PageRequest::new(0, 5).with_sort("name"), 1);
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "content": [7],
                "pageable": { "page": 0, "size": 5, "sort": ["name"] },
                "totalElements": 1,
                "totalPages": 1,
                "number": 0,
                "size": 5,
                "numberOfElements": 1,
                "last": true,
                "first": true,
                "empty": false,
            })
        );
    }
}
