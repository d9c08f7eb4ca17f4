//! Table mapping descriptors and insert planning.
//!
//! A [`Model`] describes how a struct maps onto a table: its derived table
//! name, its column names in declaration order and the values behind them.
//! The insert planner turns model instances into single-row `INSERT ...
//! RETURNING` statements, and groups heterogeneous batches into one multi-row
//! statement per destination table.

use serde::de::DeserializeOwned;

use crate::{escape, ident, Error, Result, Value};

/// Schema descriptor for a struct mapped onto a table.
///
/// Implementations are normally generated with the [`model!`](crate::model)
/// macro:
///
/// ```
/// use serde::Deserialize;
///
/// #[derive(Debug, Clone, Deserialize)]
/// struct Account {
///     id: i64,
///     name: String,
/// }
///
/// curd_core::model!(Account { id, name });
///
/// assert_eq!(<Account as curd_core::Model>::table(), "account");
/// ```
pub trait Model: DeserializeOwned {
    /// Type name the table name is derived from.
    const NAME: &'static str;

    /// Identity column, skipped on insert and returned from `add`.
    const IDENTITY: &'static str = "id";

    /// Column names in declaration order, storage casing.
    fn fields() -> &'static [&'static str];

    /// Field values aligned with [`fields`](Model::fields).
    fn values(&self) -> Vec<Value>;

    /// Storage-cased table name derived from [`NAME`](Model::NAME).
    fn table() -> String {
        ident::to_storage(Self::NAME)
    }
}

/// Implement [`Model`] for a struct from its field list.
///
/// Field names double as column names; every field type must convert into
/// [`Value`] and the struct must derive `serde::Deserialize` for the read
/// path.
#[macro_export]
macro_rules! model {
    ($ty:ident { $($field:ident),+ $(,)? }) => {
        impl $crate::Model for $ty {
            const NAME: &'static str = stringify!($ty);

            fn fields() -> &'static [&'static str] {
                &[$(stringify!($field)),+]
            }

            fn values(&self) -> Vec<$crate::Value> {
                vec![$($crate::Value::from(self.$field.clone())),+]
            }
        }
    };
}

/// One logical insert row: destination table, non-identity columns and their
/// values.
#[derive(Debug, Clone)]
pub struct InsertRow {
    pub(crate) table: String,
    pub(crate) columns: Vec<String>,
    pub(crate) values: Vec<Value>,
}

impl InsertRow {
    /// Derive an insert row from a model instance, skipping the identity
    /// column.
    pub fn of<M: Model>(row: &M) -> Self {
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for (field, value) in M::fields().iter().zip(row.values()) {
            if *field == M::IDENTITY {
                continue;
            }
            columns.push((*field).to_string());
            values.push(value);
        }
        Self {
            table: M::table(),
            columns,
            values,
        }
    }

    /// Destination table name.
    pub fn table(&self) -> &str {
        &self.table
    }
}

/// One executable statement of a batch insert plan.
#[derive(Debug)]
pub(crate) struct InsertPlan {
    pub sql: String,
    pub args: Vec<Value>,
}

fn column_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| escape::escape(c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn marker_list(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Build a single-row insert returning the generated identity.
pub(crate) fn insert_sql<M: Model>(row: &M) -> Result<(String, Vec<Value>)> {
    let plan = InsertRow::of(row);
    if plan.columns.is_empty() {
        return Err(Error::configuration(format!(
            "no insertable columns on table '{}'",
            plan.table
        )));
    }
    let sql = format!(
        "INSERT INTO {} ( {} ) VALUES ( {} ) RETURNING {}",
        escape::escape(&plan.table),
        column_list(&plan.columns),
        marker_list(plan.values.len()),
        escape::escape(M::IDENTITY),
    );
    Ok((sql, plan.values))
}

/// Collapse a batch of insert rows into one multi-row statement per distinct
/// destination table, preserving first-seen table order.
///
/// Rows targeting the same table must share an identical column list.
pub(crate) fn plan_batch(rows: &[InsertRow]) -> Result<Vec<InsertPlan>> {
    struct Group<'a> {
        table: &'a str,
        columns: &'a [String],
        sql: String,
        args: Vec<Value>,
    }

    let mut groups: Vec<Group> = Vec::new();
    for row in rows {
        if row.columns.is_empty() {
            return Err(Error::configuration(format!(
                "no insertable columns on table '{}'",
                row.table
            )));
        }
        match groups.iter_mut().find(|g| g.table == row.table) {
            Some(group) => {
                if group.columns != row.columns.as_slice() {
                    return Err(Error::configuration(format!(
                        "batch rows for table '{}' must share the same columns",
                        row.table
                    )));
                }
                group.sql.push_str(&format!(", ( {} )", marker_list(row.values.len())));
                group.args.extend(row.values.iter().cloned());
            }
            None => {
                groups.push(Group {
                    table: &row.table,
                    columns: &row.columns,
                    sql: format!(
                        "INSERT INTO {} ( {} ) VALUES ( {} )",
                        escape::escape(&row.table),
                        column_list(&row.columns),
                        marker_list(row.values.len()),
                    ),
                    args: row.values.clone(),
                });
            }
        }
    }

    Ok(groups
        .into_iter()
        .map(|g| InsertPlan {
            sql: g.sql,
            args: g.args,
        })
        .collect())
}
