//! Basic usage of the statement builder against a stand-in executor.
//!
//! The executor here just prints every statement it receives and returns
//! empty results; swap it for `executor::postgres::PostgresPool` (behind the
//! `postgres` feature) to run against a real database.

use curd_core::{Curd, Executor, InsertRow, Result, ResultSet, Value};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
struct User {
    id: i64,
    name: String,
    email: String,
}

curd_core::model!(User { id, name, email });

struct PrintingExecutor;

impl Executor for PrintingExecutor {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        println!("execute: {sql} {params:?}");
        Ok(0)
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<ResultSet> {
        println!("query:   {sql} {params:?}");
        Ok(ResultSet::default())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let db = PrintingExecutor;
    let mut users = curd_core::of::<User>();

    // single-row read
    let found: Option<User> = users.where_eq("id", 100).one(&db).await?;
    println!("found: {found:?}");

    // multi-row read with grouping and paging
    let page: Vec<User> = users
        .cols(&["id", "name"])
        .where_gte("id", 0)
        .or_where_in("id", vec![1, 2, 3])
        .desc("id")
        .limit(10)
        .page(3)
        .more(&db)
        .await?;
    println!("page: {} rows", page.len());

    // update staged columns
    let updated = users
        .where_eq("id", 100)
        .set("email", "new@example.com")
        .ups(&db)
        .await?;
    println!("updated: {updated}");

    // batch insert grouped per table
    let rows = vec![
        InsertRow::of(&User {
            id: 0,
            name: "a".to_string(),
            email: "a@example.com".to_string(),
        }),
        InsertRow::of(&User {
            id: 0,
            name: "b".to_string(),
            email: "b@example.com".to_string(),
        }),
    ];
    let inserted = users.adds(&db, &rows).await?;
    println!("inserted: {inserted}");

    // a fresh builder works against any table name
    let mut audit = Curd::new();
    audit.table("audit_log");
    audit.where_lt("time", 0).del(&db).await?;

    Ok(())
}
