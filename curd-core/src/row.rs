//! Result-set capture and column-to-field row mapping.
//!
//! Backends hand query results over as a [`ResultSet`]: ordered column names
//! plus one [`Value`] vector per row. The mapper resolves columns against a
//! [`Model`]'s field set once per query, then binds each row through serde.

use crate::{ident, Error, Model, Result, Value};

/// Driver-neutral query result.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// Column names in select order.
    pub columns: Vec<String>,
    /// One value per column, per row.
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Extract the generated identity from an `INSERT ... RETURNING` result.
    pub(crate) fn returned_id(&self) -> Result<i64> {
        match self.rows.first().and_then(|row| row.first()) {
            Some(Value::I64(id)) => Ok(*id),
            Some(Value::I32(id)) => Ok(i64::from(*id)),
            _ => Err(Error::configuration(
                "insert did not return an identity value",
            )),
        }
    }
}

/// Resolve every result column against the model's field set.
///
/// Column names are normalized to lowercase before matching. A column with no
/// matching field fails the whole mapping; partial binding is not permitted.
fn resolve<T: Model>(columns: &[String]) -> Result<Vec<String>> {
    columns
        .iter()
        .map(|column| {
            let key = column.to_lowercase();
            if T::fields().contains(&key.as_str()) {
                Ok(key)
            } else {
                Err(Error::missing_field(ident::to_external(&key)))
            }
        })
        .collect()
}

fn bind<T: Model>(keys: &[String], row: Vec<Value>) -> Result<T> {
    let mut object = serde_json::Map::with_capacity(keys.len());
    for (key, value) in keys.iter().zip(row) {
        object.insert(key.clone(), value.to_json());
    }
    Ok(serde_json::from_value(serde_json::Value::Object(object))?)
}

/// Bind at most one row into a model instance.
///
/// An empty result is `Ok(None)`; no rows is not a failure.
pub fn map_one<T: Model>(set: ResultSet) -> Result<Option<T>> {
    let keys = resolve::<T>(&set.columns)?;
    match set.rows.into_iter().next() {
        Some(row) => Ok(Some(bind::<T>(&keys, row)?)),
        None => Ok(None),
    }
}

/// Bind every row into a model instance.
///
/// Column resolution is hoisted out of the row loop; the field set is
/// identical across rows.
pub fn map_many<T: Model>(set: ResultSet) -> Result<Vec<T>> {
    let keys = resolve::<T>(&set.columns)?;
    set.rows
        .into_iter()
        .map(|row| bind::<T>(&keys, row))
        .collect()
}
