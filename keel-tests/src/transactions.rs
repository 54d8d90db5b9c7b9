use keel::{AccessMode, Database, Entity, PgTransaction, Transaction, TxScope, exec};
use std::sync::LazyLock;
use tokio::sync::Mutex;

#[derive(Entity, Debug, Clone, PartialEq)]
#[keel(table = "accounts acc")]
pub struct Account {
    #[keel(primary)]
    pub id: i32,
    pub owner: String,
    pub balance: i64,
}

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub(crate) async fn balance(database: &Database, id: i32) -> i64 {
    database
        .with_read_tx::<_, keel::Error, _>(TxScope::OpenNew, async |tx| {
            Account::find_one(tx, "WHERE acc.id = $1", &[id.into()]).await
        })
        .await
        .expect("Could not read the balance")
        .balance
}

async fn transfer(tx: &mut PgTransaction<'_>, from: i32, to: i32, amount: i64) -> anyhow::Result<()> {
    let mut source = Account::find_one(tx, "WHERE acc.id = $1 FOR UPDATE", &[from.into()]).await?;
    let mut target = Account::find_one(tx, "WHERE acc.id = $1 FOR UPDATE", &[to.into()]).await?;
    if source.balance < amount {
        anyhow::bail!("account {} cannot pay {}", source.id, amount);
    }
    source.balance -= amount;
    target.balance += amount;
    source.save(tx).await?;
    target.save(tx).await?;
    Ok(())
}

pub async fn transactions(database: &Database) {
    let _lock = MUTEX.lock().await;
    let started = database.transactions_started();

    database
        .with_tx::<_, anyhow::Error, _>(TxScope::OpenNew, async |tx| {
            exec(tx, "DELETE FROM accounts", &[]).await?;
            for (id, owner, balance) in [(1, "alice", 100), (2, "bob", 20)] {
                Account {
                    id,
                    owner: owner.into(),
                    balance,
                }
                .save(tx)
                .await?;
            }
            Ok(())
        })
        .await
        .expect("Could not open the accounts");

    // Committed
    database
        .with_tx(TxScope::OpenNew, async |tx| transfer(tx, 1, 2, 30).await)
        .await
        .expect("The transfer should succeed");
    assert_eq!(balance(database, 1).await, 70);
    assert_eq!(balance(database, 2).await, 50);

    // Rolled back, the error of the closure is returned
    let error = database
        .with_tx(TxScope::OpenNew, async |tx| {
            transfer(tx, 1, 2, 10).await?;
            transfer(tx, 2, 1, 500).await
        })
        .await
        .expect_err("Bob cannot pay 500");
    assert_eq!(error.to_string(), "account 2 cannot pay 500");
    assert_eq!(balance(database, 1).await, 70);
    assert_eq!(balance(database, 2).await, 50);

    // Manual transactions
    let mut connection = database.acquire().await.expect("Could not acquire a connection");
    let mut tx = connection
        .begin(AccessMode::ReadWrite)
        .await
        .expect("Could not begin a transaction");
    assert_eq!(tx.access_mode(), AccessMode::ReadWrite);
    transfer(&mut tx, 2, 1, 50).await.expect("Bob can pay 50");
    tx.rollback().await.expect("Could not roll back");
    assert_eq!(balance(database, 2).await, 50);
    let mut tx = connection
        .begin(AccessMode::ReadWrite)
        .await
        .expect("Could not begin a transaction");
    transfer(&mut tx, 2, 1, 50).await.expect("Bob can pay 50");
    // Not visible to others before the commit
    assert_eq!(balance(database, 2).await, 50);
    tx.commit().await.expect("Could not commit");
    assert_eq!(balance(database, 1).await, 120);
    assert_eq!(balance(database, 2).await, 0);

    // begin() on a connection is not counted, with_* transactions are
    assert_eq!(database.transactions_started() - started, 11);
}
