//! Transaction control: the scope helper and manual commit/rollback.
//!
//! The pool here fakes a backend by printing every statement; swap it for
//! `executor::postgres::PostgresPool` (behind the `postgres` feature) to run
//! against a real database.

use curd_core::{
    transaction, Executor, Result, ResultSet, Transaction, TransactionalExecutor, Value,
};
use futures::future::BoxFuture;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
struct Account {
    id: i64,
    owner: String,
    balance: i64,
}

curd_core::model!(Account { id, owner, balance });

#[derive(Clone)]
struct PrintingPool;

struct PrintingTransaction;

impl Executor for PrintingPool {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        println!("execute: {sql} {params:?}");
        Ok(1)
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<ResultSet> {
        println!("query:   {sql} {params:?}");
        Ok(ResultSet::default())
    }
}

impl Transaction for PrintingTransaction {
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        println!("tx execute: {sql} {params:?}");
        Ok(1)
    }

    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<ResultSet> {
        println!("tx query:   {sql} {params:?}");
        Ok(ResultSet::new(
            vec!["id".to_string()],
            vec![vec![Value::I64(1)]],
        ))
    }

    async fn commit(&mut self) -> Result<()> {
        println!("tx commit");
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        println!("tx rollback");
        Ok(())
    }
}

impl TransactionalExecutor for PrintingPool {
    type Transaction = PrintingTransaction;

    async fn begin(&self) -> Result<Self::Transaction> {
        println!("begin");
        Ok(PrintingTransaction)
    }
}

// Debit one account and credit another inside a single transaction; either
// both updates land or neither does.
fn move_funds(tx: &mut PrintingTransaction) -> BoxFuture<'_, Result<u64>> {
    Box::pin(async move {
        let mut accounts = curd_core::of::<Account>();
        let debited = accounts
            .set("balance", 900)
            .where_eq("id", 1)
            .ups_tx(tx)
            .await?;
        let credited = accounts
            .set("balance", 1100)
            .where_eq("id", 2)
            .ups_tx(tx)
            .await?;
        Ok(debited + credited)
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let pool = PrintingPool;

    // scope helper: commits when the closure succeeds, rolls back otherwise
    let moved = transaction(&pool, move_funds).await?;
    println!("moved: {moved} rows");

    // manual control: commit stays explicit; an execution failure inside a
    // _tx finalizer rolls the transaction back before returning the error
    let mut tx = pool.begin().await?;
    let mut accounts = curd_core::of::<Account>();
    let id = accounts
        .add_tx(
            &mut tx,
            &Account {
                id: 0,
                owner: "carol".to_string(),
                balance: 0,
            },
        )
        .await?;
    accounts
        .set("balance", 50)
        .where_eq("id", id)
        .ups_tx(&mut tx)
        .await?;
    tx.commit().await?;

    Ok(())
}
