//! Execution contract between the statement builder and a database backend.
//!
//! The builder only ever needs two capabilities: run a statement for an
//! affected-row count, or run it for a [`ResultSet`]. Anything providing
//! those through [`Executor`] works as a backend — the sqlx PostgreSQL pool
//! behind the `postgres` feature, or a mock in tests.

use std::future::Future;

use futures::future::BoxFuture;

use crate::{Result, ResultSet, Value};

/// A connection-like handle statements can run against.
pub trait Executor: Send + Sync {
    /// Run a statement that returns no rows (INSERT, UPDATE, DELETE).
    fn execute(&self, sql: &str, params: &[Value]) -> impl Future<Output = Result<u64>> + Send;

    /// Run a statement and capture its rows.
    fn query(&self, sql: &str, params: &[Value]) -> impl Future<Output = Result<ResultSet>> + Send;
}

/// An open database transaction.
///
/// Commit is always explicit; transaction-bound finalizers roll back
/// automatically when execution fails.
pub trait Transaction: Send {
    /// Run a statement that returns no rows (INSERT, UPDATE, DELETE).
    fn execute(&mut self, sql: &str, params: &[Value])
        -> impl Future<Output = Result<u64>> + Send;

    /// Run a statement and capture its rows.
    fn query(
        &mut self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Result<ResultSet>> + Send;

    /// Commit the transaction.
    fn commit(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Roll the transaction back.
    fn rollback(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Extension for executors that can open transactions.
pub trait TransactionalExecutor: Executor {
    type Transaction: Transaction;

    /// Start a new transaction.
    fn begin(&self) -> impl Future<Output = Result<Self::Transaction>> + Send;
}

/// Run a closure inside a transaction scope.
///
/// Commits when the closure succeeds, rolls back when it fails. The closure
/// returns a boxed future borrowing the transaction:
///
/// ```ignore
/// let rows = transaction(&pool, |tx| Box::pin(async move {
///     curd.del_tx(tx).await
/// })).await?;
/// ```
pub async fn transaction<P, T>(
    pool: &P,
    f: impl for<'a> FnOnce(&'a mut P::Transaction) -> BoxFuture<'a, Result<T>>,
) -> Result<T>
where
    P: TransactionalExecutor,
{
    let mut txn = pool.begin().await?;
    match f(&mut txn).await {
        Ok(value) => {
            txn.commit().await?;
            Ok(value)
        }
        Err(e) => {
            let _ = txn.rollback().await;
            Err(e)
        }
    }
}

/// sqlx-backed PostgreSQL executor
#[cfg(feature = "postgres")]
pub mod postgres {
    use super::*;
    use crate::Error;
    use sqlx::postgres::{PgColumn, PgPool, PgRow};
    use sqlx::{Column, Row, TypeInfo};

    /// PostgreSQL connection pool wrapper
    #[derive(Clone)]
    pub struct PostgresPool {
        inner: PgPool,
    }

    impl PostgresPool {
        /// Connect a new pool from a connection string
        pub async fn connect(database_url: &str) -> Result<Self> {
            let pool = PgPool::connect(database_url).await?;
            Ok(Self { inner: pool })
        }

        /// Wrap an existing PgPool
        pub fn from_pool(pool: PgPool) -> Self {
            Self { inner: pool }
        }
    }

    impl Executor for PostgresPool {
        async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
            let query = bind_params(sqlx::query(sql), params);
            let result = query.execute(&self.inner).await?;
            Ok(result.rows_affected())
        }

        async fn query(&self, sql: &str, params: &[Value]) -> Result<ResultSet> {
            let query = bind_params(sqlx::query(sql), params);
            let rows = query.fetch_all(&self.inner).await?;
            capture(&rows)
        }
    }

    /// PostgreSQL transaction wrapper.
    ///
    /// The inner sqlx transaction is consumed by commit/rollback, so it lives
    /// behind an `Option`; operations on a closed transaction fail with a
    /// Configuration error.
    pub struct PostgresTransaction {
        inner: Option<sqlx::Transaction<'static, sqlx::Postgres>>,
    }

    impl PostgresTransaction {
        fn live(&mut self) -> Result<&mut sqlx::Transaction<'static, sqlx::Postgres>> {
            self.inner
                .as_mut()
                .ok_or_else(|| Error::configuration("transaction already closed"))
        }
    }

    impl Transaction for PostgresTransaction {
        async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
            let txn = self.live()?;
            let result = bind_params(sqlx::query(sql), params)
                .execute(&mut **txn)
                .await?;
            Ok(result.rows_affected())
        }

        async fn query(&mut self, sql: &str, params: &[Value]) -> Result<ResultSet> {
            let txn = self.live()?;
            let rows = bind_params(sqlx::query(sql), params)
                .fetch_all(&mut **txn)
                .await?;
            capture(&rows)
        }

        async fn commit(&mut self) -> Result<()> {
            match self.inner.take() {
                Some(txn) => {
                    txn.commit().await?;
                    Ok(())
                }
                None => Err(Error::configuration("transaction already closed")),
            }
        }

        async fn rollback(&mut self) -> Result<()> {
            match self.inner.take() {
                Some(txn) => {
                    txn.rollback().await?;
                    Ok(())
                }
                None => Err(Error::configuration("transaction already closed")),
            }
        }
    }

    impl TransactionalExecutor for PostgresPool {
        type Transaction = PostgresTransaction;

        async fn begin(&self) -> Result<Self::Transaction> {
            let txn = self.inner.begin().await?;
            Ok(PostgresTransaction { inner: Some(txn) })
        }
    }

    fn bind_params<'q>(
        mut query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
        params: &'q [Value],
    ) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
        for param in params {
            query = match param {
                Value::Null => query.bind(None::<i32>),
                Value::Bool(b) => query.bind(*b),
                Value::I32(i) => query.bind(*i),
                Value::I64(i) => query.bind(*i),
                Value::F32(f) => query.bind(*f),
                Value::F64(f) => query.bind(*f),
                Value::String(s) => query.bind(s.as_str()),
                Value::Bytes(b) => query.bind(b.as_slice()),
                Value::Json(j) => query.bind(j),
            };
        }
        query
    }

    fn capture(rows: &[PgRow]) -> Result<ResultSet> {
        let columns = match rows.first() {
            Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
            None => Vec::new(),
        };
        let mut captured = Vec::with_capacity(rows.len());
        for row in rows {
            let mut values = Vec::with_capacity(row.columns().len());
            for (index, column) in row.columns().iter().enumerate() {
                values.push(decode(row, index, column)?);
            }
            captured.push(values);
        }
        Ok(ResultSet::new(columns, captured))
    }

    fn decode(row: &PgRow, index: usize, column: &PgColumn) -> Result<Value> {
        let type_name = column.type_info().name();
        let value = match type_name {
            "BOOL" => row.try_get::<Option<bool>, _>(index)?.map(Value::Bool),
            "INT2" => row
                .try_get::<Option<i16>, _>(index)?
                .map(|v| Value::I32(i32::from(v))),
            "INT4" => row.try_get::<Option<i32>, _>(index)?.map(Value::I32),
            "INT8" => row.try_get::<Option<i64>, _>(index)?.map(Value::I64),
            "FLOAT4" => row.try_get::<Option<f32>, _>(index)?.map(Value::F32),
            "FLOAT8" => row.try_get::<Option<f64>, _>(index)?.map(Value::F64),
            "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => row
                .try_get::<Option<String>, _>(index)?
                .map(Value::String),
            "BYTEA" => row.try_get::<Option<Vec<u8>>, _>(index)?.map(Value::Bytes),
            "JSON" | "JSONB" => row
                .try_get::<Option<serde_json::Value>, _>(index)?
                .map(Value::Json),
            other => {
                return Err(Error::decode(
                    column.name(),
                    format!("unsupported column type {other}"),
                ))
            }
        };
        Ok(value.unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, Value};
    use serde::Deserialize;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct User {
        id: i64,
        name: String,
        email: String,
    }

    crate::model!(User { id, name, email });

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct OrderLine {
        id: i64,
        sku: String,
    }

    crate::model!(OrderLine { id, sku });

    fn user_set(rows: &[(i64, &str, &str)]) -> ResultSet {
        ResultSet::new(
            vec!["id".to_string(), "name".to_string(), "email".to_string()],
            rows.iter()
                .map(|(id, name, email)| {
                    vec![
                        Value::I64(*id),
                        Value::String(name.to_string()),
                        Value::String(email.to_string()),
                    ]
                })
                .collect(),
        )
    }

    #[derive(Clone, Default)]
    struct MockTransaction {
        calls: Arc<Mutex<Vec<(String, Vec<Value>)>>>,
        next: Arc<Mutex<Option<ResultSet>>>,
        fail: bool,
        committed: Arc<AtomicBool>,
        rolled_back: Arc<AtomicBool>,
    }

    impl MockTransaction {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }
    }

    impl Transaction for MockTransaction {
        async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
            if self.fail {
                return Err(Error::configuration("mock execute failure"));
            }
            self.calls
                .lock()
                .unwrap()
                .push((sql.to_string(), params.to_vec()));
            Ok(1)
        }

        async fn query(&mut self, sql: &str, params: &[Value]) -> Result<ResultSet> {
            if self.fail {
                return Err(Error::configuration("mock query failure"));
            }
            self.calls
                .lock()
                .unwrap()
                .push((sql.to_string(), params.to_vec()));
            Ok(self.next.lock().unwrap().clone().unwrap_or_default())
        }

        async fn commit(&mut self) -> Result<()> {
            self.committed.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn rollback(&mut self) -> Result<()> {
            self.rolled_back.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct MockPool {
        calls: Arc<Mutex<Vec<(String, Vec<Value>)>>>,
        next: Arc<Mutex<Option<ResultSet>>>,
        txn: MockTransaction,
    }

    impl MockPool {
        fn new() -> Self {
            Self::default()
        }

        fn with_result(set: ResultSet) -> Self {
            let pool = Self::default();
            *pool.next.lock().unwrap() = Some(set);
            pool
        }

        fn calls(&self) -> Vec<(String, Vec<Value>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Executor for MockPool {
        async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
            self.calls
                .lock()
                .unwrap()
                .push((sql.to_string(), params.to_vec()));
            Ok(1)
        }

        async fn query(&self, sql: &str, params: &[Value]) -> Result<ResultSet> {
            self.calls
                .lock()
                .unwrap()
                .push((sql.to_string(), params.to_vec()));
            Ok(self.next.lock().unwrap().clone().unwrap_or_default())
        }
    }

    impl TransactionalExecutor for MockPool {
        type Transaction = MockTransaction;

        async fn begin(&self) -> Result<Self::Transaction> {
            Ok(self.txn.clone())
        }
    }

    #[tokio::test]
    async fn one_executes_finalized_sql_and_binds_the_row() {
        let pool = MockPool::with_result(user_set(&[(1, "john", "john@example.com")]));
        let mut q = crate::table("user");
        q.where_eq("id", 1);

        let user: Option<User> = q.one(&pool).await.unwrap();
        assert_eq!(user.unwrap().name, "john");

        let calls = pool.calls();
        assert_eq!(
            calls[0].0,
            "SELECT * FROM \"user\" WHERE ( \"id\" = $1 ) LIMIT 1 OFFSET 0"
        );
        assert_eq!(calls[0].1, vec![Value::I32(1)]);
    }

    #[tokio::test]
    async fn finalization_clears_transient_state() {
        let pool = MockPool::with_result(user_set(&[(1, "a", "a@x")]));
        let mut q = crate::table("user");
        q.where_eq("id", 1);

        let _: Option<User> = q.one(&pool).await.unwrap();
        let _: Option<User> = q.one(&pool).await.unwrap();

        let calls = pool.calls();
        assert_eq!(calls[1].0, "SELECT * FROM \"user\" LIMIT 1 OFFSET 0");
        assert!(calls[1].1.is_empty());
    }

    #[tokio::test]
    async fn more_returns_every_row() {
        let pool = MockPool::with_result(user_set(&[(1, "a", "a@x"), (2, "b", "b@x")]));
        let mut q = crate::table("user");
        q.limit(10).desc("id");

        let users: Vec<User> = q.more(&pool).await.unwrap();
        assert_eq!(users.len(), 2);
        assert!(pool.calls()[0]
            .0
            .ends_with("ORDER BY \"id\" DESC LIMIT 10 OFFSET 0"));
    }

    #[tokio::test]
    async fn more_without_limit_never_reaches_the_executor() {
        let pool = MockPool::new();
        let mut q = crate::table("user");

        let err = q.more::<User, _>(&pool).await.unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        assert!(pool.calls().is_empty());
    }

    #[tokio::test]
    async fn del_and_ups_report_affected_rows() {
        let pool = MockPool::new();
        let mut q = crate::table("user");

        q.where_eq("id", 1);
        assert_eq!(q.del(&pool).await.unwrap(), 1);

        q.where_eq("id", 2).set("email", "e@x");
        assert_eq!(q.ups(&pool).await.unwrap(), 1);

        let calls = pool.calls();
        assert_eq!(calls[0].0, "DELETE FROM \"user\" WHERE ( \"id\" = $1 )");
        assert_eq!(
            calls[1].0,
            "UPDATE \"user\" SET \"email\" = $1 WHERE ( \"id\" = $2 )"
        );
    }

    #[tokio::test]
    async fn ups_with_empty_map_performs_no_io() {
        let pool = MockPool::new();
        let mut q = crate::table("user");
        q.where_eq("id", 1);

        assert_eq!(q.ups(&pool).await.unwrap(), 0);
        assert!(pool.calls().is_empty());
    }

    #[tokio::test]
    async fn add_skips_identity_and_returns_it() {
        let pool = MockPool::with_result(ResultSet::new(
            vec!["id".to_string()],
            vec![vec![Value::I64(42)]],
        ));
        let mut q = crate::table("user");

        let id = q
            .add(
                &pool,
                &User {
                    id: 0,
                    name: "a".to_string(),
                    email: "a@x".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(id, 42);

        let calls = pool.calls();
        assert_eq!(
            calls[0].0,
            "INSERT INTO \"user\" ( \"name\", \"email\" ) VALUES ( $1, $2 ) RETURNING \"id\""
        );
        assert_eq!(calls[0].1.len(), 2);
    }

    #[tokio::test]
    async fn adds_emits_one_statement_per_table() {
        let pool = MockPool::new();
        let mut q = crate::table("user");

        let rows = vec![
            crate::InsertRow::of(&User {
                id: 0,
                name: "a".to_string(),
                email: "a@x".to_string(),
            }),
            crate::InsertRow::of(&User {
                id: 0,
                name: "b".to_string(),
                email: "b@x".to_string(),
            }),
            crate::InsertRow::of(&OrderLine {
                id: 0,
                sku: "sku-1".to_string(),
            }),
        ];
        let affected = q.adds(&pool, &rows).await.unwrap();
        assert_eq!(affected, 2);

        let calls = pool.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0].0,
            "INSERT INTO \"user\" ( \"name\", \"email\" ) VALUES ( $1, $2 ), ( $3, $4 )"
        );
        assert_eq!(calls[0].1.len(), 4);
        assert_eq!(
            calls[1].0,
            "INSERT INTO \"order_line\" ( \"sku\" ) VALUES ( $1 )"
        );
    }

    #[tokio::test]
    async fn exec_passes_statements_through() {
        let pool = MockPool::new();
        let q = crate::table("user");

        let rows = q
            .exec(&pool, "UPDATE \"user\" SET \"grade\" = 0", &[])
            .await
            .unwrap();
        assert_eq!(rows, 1);
        assert_eq!(pool.calls()[0].0, "UPDATE \"user\" SET \"grade\" = 0");
    }

    #[tokio::test]
    async fn tx_finalizer_rolls_back_on_execution_failure() {
        let mut txn = MockTransaction::failing();
        let rolled_back = txn.rolled_back.clone();
        let mut q = crate::table("user");
        q.where_eq("id", 1);

        assert!(q.del_tx(&mut txn).await.is_err());
        assert!(rolled_back.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn tx_finalizers_route_through_the_transaction() {
        let mut txn = MockTransaction::default();
        let mut q = crate::table("user");

        q.set("email", "e@x").where_eq("id", 1);
        assert_eq!(q.ups_tx(&mut txn).await.unwrap(), 1);

        *txn.next.lock().unwrap() = Some(ResultSet::new(
            vec!["id".to_string()],
            vec![vec![Value::I64(7)]],
        ));
        let id = q
            .add_tx(
                &mut txn,
                &OrderLine {
                    id: 0,
                    sku: "sku-9".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(id, 7);

        let calls = txn.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 2);
        assert!(calls[1].0.starts_with("INSERT INTO \"order_line\""));
    }

    fn delete_inactive(txn: &mut MockTransaction) -> BoxFuture<'_, Result<u64>> {
        Box::pin(async move {
            let mut q = crate::table("user");
            q.where_eq("status", 0);
            q.del_tx(txn).await
        })
    }

    #[tokio::test]
    async fn transaction_scope_commits_on_success() {
        let pool = MockPool::new();
        let committed = pool.txn.committed.clone();

        let rows = transaction(&pool, delete_inactive).await.unwrap();
        assert_eq!(rows, 1);
        assert!(committed.load(Ordering::SeqCst));
    }

    fn always_fails(txn: &mut MockTransaction) -> BoxFuture<'_, Result<u64>> {
        Box::pin(async move {
            let q = crate::table("user");
            q.exec_tx(txn, "DELETE FROM \"user\"", &[]).await
        })
    }

    #[tokio::test]
    async fn transaction_scope_rolls_back_on_failure() {
        let mut pool = MockPool::new();
        pool.txn = MockTransaction::failing();
        let rolled_back = pool.txn.rolled_back.clone();
        let committed = pool.txn.committed.clone();

        assert!(transaction(&pool, always_fails).await.is_err());
        assert!(rolled_back.load(Ordering::SeqCst));
        assert!(!committed.load(Ordering::SeqCst));
    }
}
