use keel::{Database, Entity, ErrorKind, PageRequest, TxScope, Value, exec};

#[derive(Entity, Debug, Clone, PartialEq)]
#[keel(table = "positions p")]
struct Position {
    #[keel(primary)]
    position: i32,
    label: String,
}

pub async fn pageable(database: &Database) {
    database
        .with_tx::<_, anyhow::Error, _>(TxScope::OpenNew, async |tx| {
            exec(tx, "DELETE FROM positions", &[]).await?;
            for position in 1..=23 {
                Position {
                    position,
                    label: format!("#{position:02}"),
                }
                .save(tx)
                .await?;
            }
            Ok(())
        })
        .await
        .expect("Could not store the positions");

    let page = database
        .with_read_tx::<_, anyhow::Error, _>(TxScope::OpenNew, async |tx| {
            let request = PageRequest::new(1, 10).with_sort("position,desc");
            Ok(Position::find_page(tx, &request, "WHERE p.position > $1", &[Value::from(0i32)]).await?)
        })
        .await
        .expect("Could not read the second page");
    let positions: Vec<_> = page.content.iter().map(|p| p.position).collect();
    assert_eq!(positions, (4..=13).rev().collect::<Vec<_>>());
    assert_eq!(page.total_elements, 23);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.number, 1);
    assert_eq!(page.number_of_elements, 10);
    assert!(!page.is_first);
    assert!(!page.is_last);

    let mut connection = database.acquire().await.expect("Could not acquire a connection");
    let request = PageRequest::new(2, 10).with_sort("label");
    let last = Position::find_page(&mut connection, &request, "", &[])
        .await
        .expect("Could not read the last page");
    let labels: Vec<_> = last.content.iter().map(|p| p.label.as_str()).collect();
    assert_eq!(labels, ["#21", "#22", "#23"]);
    assert!(last.is_last);
    assert_eq!(last.number_of_elements, 3);

    // The count ignores the page bounds
    let filtered = Position::find_page(
        &mut connection,
        &PageRequest::new(0, 4),
        "WHERE p.position <= $1",
        &[Value::from(6i32)],
    )
    .await
    .expect("Could not read the filtered page");
    assert_eq!(filtered.total_elements, 6);
    assert_eq!(filtered.total_pages, 2);
    assert_eq!(filtered.content.len(), 4);

    let beyond = Position::find_page(&mut connection, &PageRequest::new(9, 10), "", &[])
        .await
        .expect("A page past the end is empty, not an error");
    assert!(beyond.is_empty);
    assert!(beyond.is_last);
    assert_eq!(beyond.total_elements, 23);

    let error = Position::find_page(&mut connection, &PageRequest::new(0, 0), "", &[])
        .await
        .expect_err("A zero page size is rejected");
    assert_eq!(error.kind(), ErrorKind::InvalidArgument);
}
