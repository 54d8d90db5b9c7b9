use crate::books::{Author, Book, Review, clear};
use keel::{Database, Entity, TxScope, generate_insert_upsert};
use uuid::Uuid;

#[derive(Entity, Debug, Clone, PartialEq)]
#[keel(table = "shelf_books s")]
struct ShelfBook {
    #[keel(primary)]
    shelf: String,
    #[keel(primary)]
    book_id: Uuid,
}

pub async fn upsert(database: &Database) {
    let mut connection = database.acquire().await.expect("Could not acquire a connection");
    clear(&mut connection).await;
    let author = Author {
        id: Uuid::new_v4(),
        name: "Italo Calvino".into(),
        country: Some("Italy".into()),
    };
    let mut book = Book {
        id: Uuid::new_v4(),
        title: "Invisible Cities".into(),
        author: author.id,
        year: None,
        reviews: 0,
        shelf_hint: None,
    };
    author.save(&mut connection).await.expect("Could not save the author");
    book.save(&mut connection).await.expect("Could not save the book");

    // Second save updates the non key columns
    book.year = Some(1972);
    book.title = "Le città invisibili".into();
    book.save(&mut connection).await.expect("Could not update the book");
    let books = Book::find(&mut connection, "WHERE b.author_id = $1", &[author.id.into()])
        .await
        .expect("Could not list the books");
    assert_eq!(books.len(), 1);
    assert_eq!(books[0].title, "Le città invisibili");
    assert_eq!(books[0].year, Some(1972));

    let mut review = Review {
        book_id: book.id,
        reviewer: "marco".into(),
        stars: 3,
    };
    review.save(&mut connection).await.expect("Could not save the review");
    review.stars = 5;
    review.save(&mut connection).await.expect("Could not update the review");
    let stored = Review::find_one(&mut connection, "WHERE r.book_id = $1", &[book.id.into()])
        .await
        .expect("Could not find the review");
    assert_eq!(stored.stars, 5);

    // Keys only: a conflict does nothing
    let (sql, args) = generate_insert_upsert(&ShelfBook {
        shelf: "fiction".into(),
        book_id: book.id,
    })
    .expect("Could not generate the shelf upsert");
    assert!(sql.ends_with("ON CONFLICT(shelf, book_id) DO NOTHING"));
    assert_eq!(args.len(), 2);
    database
        .with_tx::<_, anyhow::Error, _>(TxScope::OpenNew, async |tx| {
            for _ in 0..2 {
                ShelfBook {
                    shelf: "fiction".into(),
                    book_id: book.id,
                }
                .save(tx)
                .await?;
            }
            Ok(())
        })
        .await
        .expect("Saving the same shelf entry twice should succeed");
    let shelves = ShelfBook::find(&mut connection, "", &[])
        .await
        .expect("Could not list the shelves");
    assert_eq!(shelves.len(), 1);
}
