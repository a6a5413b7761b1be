use thiserror::Error;

#[derive(Error, Debug)]
pub enum TextDbError {
    #[error("Unknown property type '{name}': type must be one of the following: {valid}")]
    UnknownType { name: String, valid: String },

    #[error("Missing name argument")]
    MissingName,

    #[error("Type mismatch: property '{property}' should be of type {expected}, but is {actual}")]
    TypeMismatch {
        property: String,
        expected: String,
        actual: String,
    },

    #[error("Row not found: {table}/{row}")]
    RowNotFound { table: String, row: String },

    #[error("Property not found: {table}.{property}")]
    PropertyNotFound { table: String, property: String },

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Property descriptor missing for table '{table}'")]
    DescriptorMissing { table: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TextDbError>;
