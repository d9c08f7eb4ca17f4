//! Curd Core - a fluent CRUD statement builder and row mapper
//!
//! Statements are composed through chained calls on a [`Curd`] builder and
//! executed against anything implementing the [`Executor`] contract; query
//! results bind back into plain structs described by the [`Model`] trait.

pub mod error;
pub mod escape;
pub mod executor;
pub mod ident;
pub mod model;
pub mod operator;
pub mod row;
pub mod statement;
pub mod value;

// Re-export main types
pub use error::{Error, Result};
pub use escape::{escape, escape_column, Placeholders};
pub use executor::{transaction, Executor, Transaction, TransactionalExecutor};
pub use model::{InsertRow, Model};
pub use operator::Operator;
pub use row::{map_many, map_one, ResultSet};
pub use statement::{Curd, JoinType, SortDirection};
pub use value::Value;

/// Create a statement builder for an explicitly named table.
pub fn table(name: &str) -> Curd {
    let mut curd = Curd::new();
    curd.table(name);
    curd
}

/// Create a statement builder for the table mapped by `M`.
pub fn of<M: Model>() -> Curd {
    let mut curd = Curd::new();
    curd.model::<M>();
    curd
}
