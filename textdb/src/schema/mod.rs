mod parser;
mod types;

pub use parser::{parse_descriptor, parse_descriptor_str, render_descriptor};
pub use types::{is_reserved, ColumnType, Property, CONTENT_PROPERTY, NAME_PROPERTY};
