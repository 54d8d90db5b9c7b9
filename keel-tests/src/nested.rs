use crate::{
    books::{Author, Book, clear},
    transactions::{Account, balance},
};
use keel::{Database, Entity, PgTransaction, TxScope};
use uuid::Uuid;

async fn publish(
    database: &Database,
    scope: TxScope<'_, PgTransaction<'_>>,
    author: &Author,
    titles: &[&str],
) -> anyhow::Result<Vec<Uuid>> {
    database
        .with_tx(scope, async |tx| {
            author.save(tx).await?;
            let mut ids = Vec::with_capacity(titles.len());
            for title in titles {
                let book = Book {
                    id: Uuid::new_v4(),
                    title: title.to_string(),
                    author: author.id,
                    year: None,
                    reviews: 0,
                    shelf_hint: None,
                };
                book.save(tx).await?;
                ids.push(book.id);
            }
            Ok(ids)
        })
        .await
}

async fn pay_royalties(
    database: &Database,
    scope: TxScope<'_, PgTransaction<'_>>,
    amount: i64,
) -> anyhow::Result<()> {
    database
        .with_tx(scope, async |tx| {
            let mut account = Account::find_one(tx, "WHERE acc.id = $1", &[1i32.into()]).await?;
            account.balance += amount;
            account.save(tx).await?;
            Ok(())
        })
        .await
}

pub async fn nested(database: &Database) {
    let mut connection = database.acquire().await.expect("Could not acquire a connection");
    clear(&mut connection).await;
    let before = balance(database, 1).await;
    let started = database.transactions_started();

    // Both units join the outer transaction and fail with it
    let borges = Author {
        id: Uuid::new_v4(),
        name: "Jorge Luis Borges".into(),
        country: Some("Argentina".into()),
    };
    let result = database
        .with_tx::<(), anyhow::Error, _>(TxScope::OpenNew, async |tx| {
            let scope = TxScope::from(&mut *tx);
            assert!(scope.is_nested());
            publish(database, scope, &borges, &["Ficciones", "El Aleph"]).await?;
            pay_royalties(database, TxScope::from(&mut *tx), 40).await?;
            anyhow::bail!("the contract was not signed")
        })
        .await;
    let error = result.expect_err("The outer unit fails");
    assert_eq!(error.to_string(), "the contract was not signed");
    let books = Book::find(&mut connection, "WHERE b.author_id = $1", &[borges.id.into()])
        .await
        .expect("Could not list the books");
    assert!(books.is_empty());
    assert_eq!(balance(database, 1).await, before);

    // And commit with it
    let ids = database
        .with_tx::<_, anyhow::Error, _>(TxScope::OpenNew, async |tx| {
            let ids = publish(database, TxScope::from(&mut *tx), &borges, &["Ficciones"]).await?;
            pay_royalties(database, TxScope::from(&mut *tx), 40).await?;
            Ok(ids)
        })
        .await
        .expect("The outer unit succeeds");
    let found = Book::find_one(&mut connection, "WHERE b.id = $1", &[ids[0].into()])
        .await
        .expect("The nested insert was committed");
    assert_eq!(found.title, "Ficciones");
    assert_eq!(balance(database, 1).await, before + 40);

    // Without an outer transaction each unit opens its own
    let scope: TxScope<'_, PgTransaction<'_>> = None.into();
    assert!(!scope.is_nested());
    publish(database, scope, &borges, &["Labyrinths"])
        .await
        .expect("A standalone unit commits");
    let books = Book::find(&mut connection, "WHERE b.author_id = $1", &[borges.id.into()])
        .await
        .expect("Could not list the books");
    assert_eq!(books.len(), 2);

    // Two outer transactions, one standalone, two balance reads
    assert_eq!(database.transactions_started() - started, 5);
}
