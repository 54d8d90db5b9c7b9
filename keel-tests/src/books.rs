use keel::{
    AccessMode, Database, Entity, ErrorKind, Executor, TxScope, Value, exec, select_one,
};
use uuid::Uuid;

#[derive(Entity, Debug, Clone, PartialEq)]
#[keel(table = "authors a")]
pub struct Author {
    #[keel(primary)]
    pub id: Uuid,
    pub name: String,
    pub country: Option<String>,
}

#[derive(Entity, Debug, Clone, PartialEq)]
#[keel(table = "books b")]
pub struct Book {
    #[keel(primary)]
    pub id: Uuid,
    pub title: String,
    #[keel(column = "author_id")]
    pub author: Uuid,
    pub year: Option<i32>,
    #[keel(query = "(SELECT count(*) FROM reviews r WHERE r.book_id = b.id)")]
    pub reviews: i64,
    #[keel(ignore)]
    pub shelf_hint: Option<String>,
}

#[derive(Entity, Debug, Clone, PartialEq)]
#[keel(table = "reviews r")]
pub struct Review {
    #[keel(primary)]
    pub book_id: Uuid,
    #[keel(primary)]
    pub reviewer: String,
    pub stars: i16,
}

pub(crate) async fn clear<E: Executor>(executor: &mut E) {
    for table in ["shelf_books", "reviews", "books", "authors"] {
        exec(executor, &format!("DELETE FROM {table}"), &[])
            .await
            .expect("Could not clear the library tables");
    }
}

pub async fn books(database: &Database) {
    let mut connection = database.acquire().await.expect("Could not acquire a connection");
    clear(&mut connection).await;

    let ursula = Author {
        id: Uuid::new_v4(),
        name: "Ursula K. Le Guin".into(),
        country: Some("United States".into()),
    };
    let stanislaw = Author {
        id: Uuid::new_v4(),
        name: "Stanisław Lem".into(),
        country: None,
    };
    let dispossessed = Book {
        id: Uuid::new_v4(),
        title: "The Dispossessed".into(),
        author: ursula.id,
        year: Some(1974),
        reviews: 0,
        shelf_hint: Some("not stored".into()),
    };
    let earthsea = Book {
        id: Uuid::new_v4(),
        title: "A Wizard of Earthsea".into(),
        author: ursula.id,
        year: Some(1968),
        reviews: 0,
        shelf_hint: None,
    };
    let solaris = Book {
        id: Uuid::new_v4(),
        title: "Solaris".into(),
        author: stanislaw.id,
        year: None,
        reviews: 0,
        shelf_hint: None,
    };
    database
        .with_tx::<_, anyhow::Error, _>(TxScope::OpenNew, async |tx| {
            ursula.save(tx).await?;
            stanislaw.save(tx).await?;
            for book in [&dispossessed, &earthsea, &solaris] {
                book.save(tx).await?;
            }
            for (reviewer, stars) in [("kim", 5i16), ("ana", 4)] {
                Review {
                    book_id: dispossessed.id,
                    reviewer: reviewer.into(),
                    stars,
                }
                .save(tx)
                .await?;
            }
            Ok(())
        })
        .await
        .expect("Could not store the library");

    // Computed column and ignored field
    let found = Book::find_one(&mut connection, "WHERE b.id = $1", &[dispossessed.id.into()])
        .await
        .expect("Could not find The Dispossessed");
    assert_eq!(found.title, "The Dispossessed");
    assert_eq!(found.year, Some(1974));
    assert_eq!(found.reviews, 2);
    assert_eq!(found.shelf_hint, None);

    let by_ursula = Book::find(
        &mut connection,
        "WHERE b.author_id = $1 ORDER BY b.year",
        &[ursula.id.into()],
    )
    .await
    .expect("Could not list the books of Ursula");
    let titles: Vec<_> = by_ursula.iter().map(|b| b.title.as_str()).collect();
    assert_eq!(titles, ["A Wizard of Earthsea", "The Dispossessed"]);
    assert!(by_ursula.iter().all(|b| b.author == ursula.id));

    let lem = Author::find_one(&mut connection, "WHERE a.name LIKE $1", &["Stanis%".into()])
        .await
        .expect("Could not find Lem");
    assert_eq!(lem, stanislaw);
    let undated = Book::find_one(&mut connection, "WHERE b.year IS NULL", &[])
        .await
        .expect("Could not find the undated book");
    assert_eq!(undated.title, "Solaris");
    assert_eq!(undated.year, None);
    assert_eq!(undated.reviews, 0);

    // Exactly one row
    let error = Book::find_one(&mut connection, "WHERE b.id = $1", &[Uuid::new_v4().into()])
        .await
        .expect_err("A random id should not be found");
    assert_eq!(error.kind(), ErrorKind::NotFound);
    let error = Book::find_one(&mut connection, "WHERE b.author_id = $1", &[ursula.id.into()])
        .await
        .expect_err("Two books cannot decode into one");
    assert_eq!(error.kind(), ErrorKind::Decode);

    // Strict decoding
    let error = select_one::<Review, _>(
        &mut connection,
        "SELECT r.*, 1 AS extra FROM reviews r WHERE r.reviewer = $1",
        &["kim".into()],
    )
    .await
    .expect_err("An unexpected column must be rejected");
    assert_eq!(error.kind(), ErrorKind::Decode);
    let error = select_one::<Review, _>(
        &mut connection,
        "SELECT r.book_id, r.reviewer FROM reviews r WHERE r.reviewer = $1",
        &["kim".into()],
    )
    .await
    .expect_err("A missing column must be rejected");
    assert_eq!(error.kind(), ErrorKind::Decode);

    // Scalars and statements
    let count = connection
        .fetch_scalar("SELECT count(*) FROM books", &[])
        .await
        .expect("Could not count the books");
    assert_eq!(count.as_i64(), Some(Some(3)));
    let affected = connection
        .execute(
            "UPDATE books SET year = $1 WHERE id = $2",
            &[Value::from(1961i32), solaris.id.into()],
        )
        .await
        .expect("Could not date Solaris");
    assert_eq!(affected.rows_affected, 1);

    // Read only transactions refuse writes
    let error = database
        .with_transaction::<_, keel::Error, _>(AccessMode::ReadOnly, TxScope::OpenNew, async |tx| {
            exec(tx, "DELETE FROM reviews", &[]).await
        })
        .await
        .expect_err("A read only transaction cannot delete");
    assert_eq!(error.kind(), ErrorKind::Execution);
}
