//! Error types for column planning, row hydration and query execution.

use thiserror::Error;

/// Umbrella error returned by the query wrapper and typed hydration.
#[derive(Error, Debug)]
pub enum MapperError {
    /// Invalid schema description or column plan
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// A row could not be turned into an instance
    #[error("Construction error: {0}")]
    Construction(#[from] ConstructionError),

    /// Failure reported by the database client, passed through untouched
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),
}

/// Problems with a schema description, detected when it is built or planned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("type name must not be empty")]
    EmptyTypeName,

    #[error("{type_name}: field name must not be empty")]
    EmptyFieldName { type_name: String },

    #[error("{type_name}: duplicate field `{field}`")]
    DuplicateField { type_name: String, field: String },

    /// Relations may only point at schemas made of scalar fields.
    #[error("{type_name}.{field}: relation `{nested}` has its own relation `{nested_field}`, only one level of nesting is supported")]
    NestedTooDeep {
        type_name: String,
        field: String,
        nested: String,
        nested_field: String,
    },

    #[error("{type_name}: relations `{first}` and `{second}` both alias their columns as `{prefix}_*`")]
    DuplicateRelationPrefix {
        type_name: String,
        first: String,
        second: String,
        prefix: String,
    },

    /// Two selected columns would come back under the same name.
    #[error("{type_name}: column alias `{alias}` is produced twice")]
    DuplicateAlias { type_name: String, alias: String },

    #[error("{type_name}: cannot exclude unknown field `{field}`")]
    UnknownExclude { type_name: String, field: String },

    #[error("{type_name}: cannot exclude required field `{field}`")]
    ExcludedRequiredField { type_name: String, field: String },
}

/// A row did not carry what the target type needs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstructionError {
    #[error("{type_name}: missing column `{column}` for field `{field}`")]
    MissingField {
        type_name: String,
        field: String,
        column: String,
    },

    #[error("{type_name}.{field}: expected {expected}, found {found}")]
    TypeMismatch {
        type_name: String,
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{type_name}.{field}: unexpected NULL for a required field")]
    UnexpectedNull { type_name: String, field: String },

    #[error("{type_name}: no relation `{field}` in record")]
    MissingRelation { type_name: String, field: String },
}

/// Opaque failure from the external database client.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, MapperError>;
