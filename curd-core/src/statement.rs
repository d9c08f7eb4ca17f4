//! The fluent CRUD statement builder.
//!
//! [`Curd`] accumulates one statement at a time through `&mut self` chain
//! calls, then a finalizing operation (`one`, `more`, `del`, `ups`, `add`,
//! `adds`) renders the SQL, runs it through an [`Executor`] or
//! [`Transaction`] and clears the transient state. The configured table and
//! placeholder dialect survive finalization, so follow-up statements can
//! reuse the same builder.
//!
//! Assembly always emits `?` markers; the dialect rewrite happens once, at
//! finalization, so placeholder numbering matches argument order by
//! construction.

use std::collections::BTreeMap;
use std::fmt;

use crate::escape::{escape, escape_column, Placeholders};
use crate::executor::{Executor, Transaction};
use crate::model::{self, InsertRow, Model};
use crate::{row, Error, Operator, Result, Value};

/// Join flavor rendered into the FROM clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Inner => write!(f, "INNER"),
            JoinType::Left => write!(f, "LEFT"),
            JoinType::Right => write!(f, "RIGHT"),
        }
    }
}

/// ORDER BY direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => write!(f, "ASC"),
            SortDirection::Desc => write!(f, "DESC"),
        }
    }
}

#[derive(Debug, Clone)]
struct JoinClause {
    kind: JoinType,
    table: String,
    alias: String,
    left: String,
    right: String,
}

/// Stateful, chainable statement builder.
///
/// ```
/// let mut users = curd_core::table("user");
/// users
///     .cols(&["id", "name"])
///     .where_eq("status", 1)
///     .or_where_gt("grade", 5)
///     .desc("id")
///     .limit(10);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Curd {
    table: String,
    alias: String,
    columns: Vec<String>,
    update: BTreeMap<String, Value>,
    joins: Vec<JoinClause>,
    where_sql: String,
    group: Vec<String>,
    order: Vec<(String, SortDirection)>,
    limit: Option<u64>,
    offset: u64,
    page: u64,
    args: Vec<Value>,
    placeholders: Placeholders,
}

fn trace(sql: &str, args: &[Value]) {
    tracing::debug!(sql, args = ?args, "executing statement");
}

fn marker_list(count: usize) -> String {
    vec!["?"; count].join(", ")
}

impl Curd {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the placeholder dialect the backend expects.
    pub fn placeholders(&mut self, placeholders: Placeholders) -> &mut Self {
        self.placeholders = placeholders;
        self
    }

    /// Target an explicitly named table; the name is lowercased verbatim.
    /// An empty name leaves the table unset and fails at finalization.
    pub fn table(&mut self, name: &str) -> &mut Self {
        if name.is_empty() {
            self.table.clear();
        } else {
            self.table = escape(&name.to_lowercase());
        }
        self
    }

    /// Target the table mapped by `M`.
    pub fn model<M: Model>(&mut self) -> &mut Self {
        self.table = escape(&M::table());
        self
    }

    /// Alias the primary table.
    pub fn alias(&mut self, alias: &str) -> &mut Self {
        self.alias = escape(&alias.to_lowercase());
        self
    }

    /// Append select columns; expressions and aliases pass through
    /// [`escape_column`].
    pub fn cols(&mut self, cols: &[&str]) -> &mut Self {
        for col in cols {
            self.columns.push(escape_column(col));
        }
        self
    }

    fn join(&mut self, kind: JoinType, table: &str, alias: &str, left: &str, right: &str) -> &mut Self {
        self.joins.push(JoinClause {
            kind,
            table: escape(&table.to_lowercase()),
            alias: escape(&alias.to_lowercase()),
            left: escape(left),
            right: escape(right),
        });
        self
    }

    pub fn left_join(&mut self, table: &str, alias: &str, left: &str, right: &str) -> &mut Self {
        self.join(JoinType::Left, table, alias, left, right)
    }

    pub fn inner_join(&mut self, table: &str, alias: &str, left: &str, right: &str) -> &mut Self {
        self.join(JoinType::Inner, table, alias, left, right)
    }

    pub fn right_join(&mut self, table: &str, alias: &str, left: &str, right: &str) -> &mut Self {
        self.join(JoinType::Right, table, alias, left, right)
    }

    /// Append a GROUP BY column.
    pub fn group(&mut self, column: &str) -> &mut Self {
        self.group.push(escape(column));
        self
    }

    /// Append an ascending ORDER BY entry.
    pub fn asc(&mut self, column: &str) -> &mut Self {
        self.order.push((escape(column), SortDirection::Asc));
        self
    }

    /// Append a descending ORDER BY entry.
    pub fn desc(&mut self, column: &str) -> &mut Self {
        self.order.push((escape(column), SortDirection::Desc));
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.offset = offset;
        self
    }

    /// Page number; when set, the offset becomes `(page - 1) * limit` and
    /// overrides any explicit offset.
    pub fn page(&mut self, page: u64) -> &mut Self {
        self.page = page;
        self
    }

    /// Stage an update column; last write wins on duplicate columns.
    pub fn set(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.update.insert(column.to_string(), value.into());
        self
    }

    /// Replace the WHERE text and argument list wholesale.
    ///
    /// The clause uses `?` markers regardless of the configured dialect;
    /// markers are rewritten at finalization.
    pub fn where_raw(&mut self, clause: &str, args: Vec<Value>) -> &mut Self {
        self.where_sql = clause.to_string();
        self.args = args;
        self
    }

    // Joiner for the WHERE left-fold: nothing on empty text, a bare space
    // after an open bracket, the logical operator otherwise.
    fn joiner(&self, logic: &str) -> String {
        let where_sql = self.where_sql.trim();
        if where_sql.is_empty() {
            return String::new();
        }
        if where_sql.ends_with('(') {
            return format!("{where_sql} ");
        }
        format!("{where_sql} {logic} ")
    }

    fn push_compare(&mut self, logic: &str, column: &str, op: Operator, value: Value) {
        let joiner = self.joiner(logic);
        self.args.push(value);
        self.where_sql = format!("{}{} {} ?", joiner, escape(column), op);
    }

    fn push_in(&mut self, logic: &str, column: &str, op: Operator, values: Vec<Value>) {
        let joiner = self.joiner(logic);
        let markers = marker_list(values.len());
        self.args.extend(values);
        self.where_sql = format!("{}{} {} ( {} )", joiner, escape(column), op, markers);
    }

    fn push_between(&mut self, logic: &str, column: &str, low: Value, high: Value) {
        let joiner = self.joiner(logic);
        self.args.push(low);
        self.args.push(high);
        self.where_sql = format!(
            "{}{} {} ? AND ?",
            joiner,
            escape(column),
            Operator::BETWEEN
        );
    }

    pub fn where_eq(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.push_compare("AND", column, Operator::EQ, value.into());
        self
    }

    pub fn where_ne(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.push_compare("AND", column, Operator::NEQ, value.into());
        self
    }

    pub fn where_gt(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.push_compare("AND", column, Operator::GT, value.into());
        self
    }

    pub fn where_gte(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.push_compare("AND", column, Operator::GTE, value.into());
        self
    }

    pub fn where_lt(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.push_compare("AND", column, Operator::LT, value.into());
        self
    }

    pub fn where_lte(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.push_compare("AND", column, Operator::LTE, value.into());
        self
    }

    pub fn where_in<V: Into<Value>>(&mut self, column: &str, values: Vec<V>) -> &mut Self {
        let values = values.into_iter().map(Into::into).collect();
        self.push_in("AND", column, Operator::IN, values);
        self
    }

    pub fn where_not_in<V: Into<Value>>(&mut self, column: &str, values: Vec<V>) -> &mut Self {
        let values = values.into_iter().map(Into::into).collect();
        self.push_in("AND", column, Operator::NOT_IN, values);
        self
    }

    pub fn where_between(
        &mut self,
        column: &str,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> &mut Self {
        self.push_between("AND", column, low.into(), high.into());
        self
    }

    pub fn or_where_eq(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.push_compare("OR", column, Operator::EQ, value.into());
        self
    }

    pub fn or_where_ne(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.push_compare("OR", column, Operator::NEQ, value.into());
        self
    }

    pub fn or_where_gt(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.push_compare("OR", column, Operator::GT, value.into());
        self
    }

    pub fn or_where_gte(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.push_compare("OR", column, Operator::GTE, value.into());
        self
    }

    pub fn or_where_lt(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.push_compare("OR", column, Operator::LT, value.into());
        self
    }

    pub fn or_where_lte(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.push_compare("OR", column, Operator::LTE, value.into());
        self
    }

    pub fn or_where_in<V: Into<Value>>(&mut self, column: &str, values: Vec<V>) -> &mut Self {
        let values = values.into_iter().map(Into::into).collect();
        self.push_in("OR", column, Operator::IN, values);
        self
    }

    pub fn or_where_not_in<V: Into<Value>>(&mut self, column: &str, values: Vec<V>) -> &mut Self {
        let values = values.into_iter().map(Into::into).collect();
        self.push_in("OR", column, Operator::NOT_IN, values);
        self
    }

    pub fn or_where_between(
        &mut self,
        column: &str,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> &mut Self {
        self.push_between("OR", column, low.into(), high.into());
        self
    }

    /// Open an AND-joined bracket group.
    pub fn open_group(&mut self) -> &mut Self {
        if self.where_sql.is_empty() {
            self.where_sql = "(".to_string();
        } else {
            self.where_sql = format!("{} AND (", self.where_sql);
        }
        self
    }

    /// Open an OR-joined bracket group.
    pub fn or_open_group(&mut self) -> &mut Self {
        if self.where_sql.is_empty() {
            self.where_sql = "(".to_string();
        } else {
            self.where_sql = format!("{} OR (", self.where_sql);
        }
        self
    }

    /// Close the innermost bracket group. Balance is not validated; an
    /// unbalanced group surfaces as a SQL syntax error from the backend.
    pub fn close_group(&mut self) -> &mut Self {
        self.where_sql = format!("{} )", self.where_sql);
        self
    }

    /// Reset transient statement state, keeping the table and dialect.
    pub fn clear(&mut self) {
        self.alias.clear();
        self.columns.clear();
        self.update.clear();
        self.joins.clear();
        self.where_sql.clear();
        self.group.clear();
        self.order.clear();
        self.limit = None;
        self.offset = 0;
        self.page = 0;
        self.args.clear();
    }

    fn require_table(&self) -> Result<()> {
        if self.table.is_empty() {
            return Err(Error::configuration("no table configured"));
        }
        Ok(())
    }

    fn build_select(&self, limit: u64) -> Result<(String, Vec<Value>)> {
        self.require_table()?;
        let columns = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        };
        let mut sql = format!("SELECT {} FROM {}", columns, self.table);
        if !self.alias.is_empty() {
            sql.push(' ');
            sql.push_str(&self.alias);
        }
        for join in &self.joins {
            sql.push_str(&format!(
                " {} JOIN {} {} ON {} = {}",
                join.kind, join.table, join.alias, join.left, join.right
            ));
        }
        if !self.where_sql.is_empty() {
            sql.push_str(&format!(" WHERE ( {} )", self.where_sql));
        }
        if !self.group.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group.join(", "));
        }
        if !self.order.is_empty() {
            sql.push_str(" ORDER BY ");
            let order: Vec<String> = self
                .order
                .iter()
                .map(|(column, direction)| format!("{column} {direction}"))
                .collect();
            sql.push_str(&order.join(", "));
        }
        sql.push_str(&format!(" LIMIT {limit}"));
        let offset = if self.page > 0 {
            (self.page - 1) * limit
        } else {
            self.offset
        };
        sql.push_str(&format!(" OFFSET {offset}"));
        Ok((self.placeholders.finalize(&sql), self.args.clone()))
    }

    fn build_one(&self) -> Result<(String, Vec<Value>)> {
        if let Some(limit) = self.limit {
            if limit > 1 {
                return Err(Error::configuration(
                    "limit above 1 requires a multi-row read, use more()",
                ));
            }
        }
        self.build_select(1)
    }

    fn build_more(&self) -> Result<(String, Vec<Value>)> {
        match self.limit {
            Some(limit) if limit > 1 => self.build_select(limit),
            _ => Err(Error::configuration(
                "multi-row read requires an explicit limit above 1",
            )),
        }
    }

    fn build_delete(&self) -> Result<(String, Vec<Value>)> {
        self.require_table()?;
        let mut sql = format!("DELETE FROM {}", self.table);
        if !self.where_sql.is_empty() {
            sql.push_str(&format!(" WHERE ( {} )", self.where_sql));
        }
        Ok((self.placeholders.finalize(&sql), self.args.clone()))
    }

    fn build_update(&self) -> Result<Option<(String, Vec<Value>)>> {
        self.require_table()?;
        if self.update.is_empty() {
            return Ok(None);
        }
        let set: Vec<String> = self
            .update
            .keys()
            .map(|column| format!("{} = ?", escape(column)))
            .collect();
        let mut args: Vec<Value> = self.update.values().cloned().collect();
        let mut sql = format!("UPDATE {} SET {}", self.table, set.join(", "));
        if !self.where_sql.is_empty() {
            sql.push_str(&format!(" WHERE ( {} )", self.where_sql));
            args.extend(self.args.iter().cloned());
        }
        Ok(Some((self.placeholders.finalize(&sql), args)))
    }

    /// Fetch at most one row into `T`. Fails before any I/O when a limit
    /// above 1 is configured.
    pub async fn one<T, E>(&mut self, db: &E) -> Result<Option<T>>
    where
        T: Model,
        E: Executor,
    {
        let built = self.build_one();
        self.clear();
        let (sql, args) = built?;
        trace(&sql, &args);
        let set = db.query(&sql, &args).await?;
        row::map_one(set)
    }

    /// Transaction-bound [`one`](Curd::one); rolls back on execution failure.
    pub async fn one_tx<T, Tx>(&mut self, tx: &mut Tx) -> Result<Option<T>>
    where
        T: Model,
        Tx: Transaction,
    {
        let built = self.build_one();
        self.clear();
        let (sql, args) = built?;
        trace(&sql, &args);
        match tx.query(&sql, &args).await {
            Ok(set) => row::map_one(set),
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }

    /// Fetch every row into a `Vec<T>`. Fails before any I/O unless a limit
    /// of at least 2 is configured.
    pub async fn more<T, E>(&mut self, db: &E) -> Result<Vec<T>>
    where
        T: Model,
        E: Executor,
    {
        let built = self.build_more();
        self.clear();
        let (sql, args) = built?;
        trace(&sql, &args);
        let set = db.query(&sql, &args).await?;
        row::map_many(set)
    }

    /// Transaction-bound [`more`](Curd::more); rolls back on execution
    /// failure.
    pub async fn more_tx<T, Tx>(&mut self, tx: &mut Tx) -> Result<Vec<T>>
    where
        T: Model,
        Tx: Transaction,
    {
        let built = self.build_more();
        self.clear();
        let (sql, args) = built?;
        trace(&sql, &args);
        match tx.query(&sql, &args).await {
            Ok(set) => row::map_many(set),
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }

    /// Delete rows matching the accumulated WHERE clause.
    pub async fn del<E: Executor>(&mut self, db: &E) -> Result<u64> {
        let built = self.build_delete();
        self.clear();
        let (sql, args) = built?;
        trace(&sql, &args);
        db.execute(&sql, &args).await
    }

    /// Transaction-bound [`del`](Curd::del); rolls back on execution failure.
    pub async fn del_tx<Tx: Transaction>(&mut self, tx: &mut Tx) -> Result<u64> {
        let built = self.build_delete();
        self.clear();
        let (sql, args) = built?;
        trace(&sql, &args);
        match tx.execute(&sql, &args).await {
            Ok(rows) => Ok(rows),
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }

    /// Apply the staged update map. An empty map is a no-op returning 0
    /// without touching the backend.
    pub async fn ups<E: Executor>(&mut self, db: &E) -> Result<u64> {
        let built = self.build_update();
        self.clear();
        match built? {
            Some((sql, args)) => {
                trace(&sql, &args);
                db.execute(&sql, &args).await
            }
            None => Ok(0),
        }
    }

    /// Transaction-bound [`ups`](Curd::ups); rolls back on execution failure.
    pub async fn ups_tx<Tx: Transaction>(&mut self, tx: &mut Tx) -> Result<u64> {
        let built = self.build_update();
        self.clear();
        match built? {
            Some((sql, args)) => {
                trace(&sql, &args);
                match tx.execute(&sql, &args).await {
                    Ok(rows) => Ok(rows),
                    Err(e) => {
                        let _ = tx.rollback().await;
                        Err(e)
                    }
                }
            }
            None => Ok(0),
        }
    }

    /// Insert one row, returning the generated identity. The destination
    /// table comes from the model, not the builder.
    pub async fn add<M, E>(&mut self, db: &E, row: &M) -> Result<i64>
    where
        M: Model,
        E: Executor,
    {
        let built = model::insert_sql(row);
        self.clear();
        let (sql, args) = built?;
        let sql = self.placeholders.finalize(&sql);
        trace(&sql, &args);
        let set = db.query(&sql, &args).await?;
        set.returned_id()
    }

    /// Transaction-bound [`add`](Curd::add); rolls back on execution failure.
    pub async fn add_tx<M, Tx>(&mut self, tx: &mut Tx, row: &M) -> Result<i64>
    where
        M: Model,
        Tx: Transaction,
    {
        let built = model::insert_sql(row);
        self.clear();
        let (sql, args) = built?;
        let sql = self.placeholders.finalize(&sql);
        trace(&sql, &args);
        match tx.query(&sql, &args).await {
            Ok(set) => set.returned_id(),
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }

    /// Insert a batch of rows, one multi-row statement per destination
    /// table. Returns the summed affected-row count.
    pub async fn adds<E: Executor>(&mut self, db: &E, rows: &[InsertRow]) -> Result<u64> {
        let plans = model::plan_batch(rows);
        self.clear();
        let mut affected = 0;
        for plan in plans? {
            let sql = self.placeholders.finalize(&plan.sql);
            trace(&sql, &plan.args);
            affected += db.execute(&sql, &plan.args).await?;
        }
        Ok(affected)
    }

    /// Transaction-bound [`adds`](Curd::adds); rolls back on execution
    /// failure.
    pub async fn adds_tx<Tx: Transaction>(
        &mut self,
        tx: &mut Tx,
        rows: &[InsertRow],
    ) -> Result<u64> {
        let plans = model::plan_batch(rows);
        self.clear();
        let mut affected = 0;
        for plan in plans? {
            let sql = self.placeholders.finalize(&plan.sql);
            trace(&sql, &plan.args);
            match tx.execute(&sql, &plan.args).await {
                Ok(rows) => affected += rows,
                Err(e) => {
                    let _ = tx.rollback().await;
                    return Err(e);
                }
            }
        }
        Ok(affected)
    }

    /// Run a raw statement against the backend.
    pub async fn exec<E: Executor>(&self, db: &E, sql: &str, args: &[Value]) -> Result<u64> {
        trace(sql, args);
        db.execute(sql, args).await
    }

    /// Transaction-bound [`exec`](Curd::exec); rolls back on execution
    /// failure.
    pub async fn exec_tx<Tx: Transaction>(
        &self,
        tx: &mut Tx,
        sql: &str,
        args: &[Value],
    ) -> Result<u64> {
        trace(sql, args);
        match tx.execute(sql, args).await {
            Ok(rows) => Ok(rows),
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }
}
