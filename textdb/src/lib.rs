//! textdb - a schema-typed data store kept as plain directories.
//!
//! Every table is a directory, every row a Markdown file with a YAML header
//! block, and every table's properties live in `.properties/<table>.yaml`.
//! A [`Database`] loads the whole tree into memory, is edited in memory, and is
//! written back by [`Database::save`], which also deletes tables and rows that
//! no longer exist in the model.
//!
//! Lookups (`table`, `get_row`, `get_property`, [`Keyed::get`]) return `None`
//! on a miss. Mutations aimed at something that does not exist (`edit_row`,
//! `edit_property`, `del_property`, `link`) return an error.

pub mod document;
pub mod error;
pub mod naming;
pub mod schema;
pub mod store;
pub mod table;
pub mod validation;
pub mod value;

pub use error::{Result, TextDbError};
pub use schema::{ColumnType, Property};
pub use store::Database;
pub use table::{Keyed, PropertyEdit, Row, Table};
pub use value::{Relation, Value, ValueKind};
