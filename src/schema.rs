//! Static descriptions of mappable record types.
//!
//! A [`SchemaDescription`] is declared once per type through [`SchemaBuilder`]
//! and is immutable afterwards, so it can be shared freely between concurrent
//! queries. Relations nest exactly one level deep.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ConstructionError, SchemaError};
use crate::hydrator::Record;
use crate::value::Value;

/// Declared storage type of a scalar field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Integer,
    Real,
    Text,
    Blob,
    Boolean,
}

impl DataType {
    pub fn name(self) -> &'static str {
        match self {
            DataType::Integer => "integer",
            DataType::Real => "real",
            DataType::Text => "text",
            DataType::Blob => "blob",
            DataType::Boolean => "boolean",
        }
    }

    /// SQLite column type used when rendering DDL.
    pub fn sql_type(self) -> &'static str {
        match self {
            DataType::Integer | DataType::Boolean => "INTEGER",
            DataType::Real => "REAL",
            DataType::Text => "TEXT",
            DataType::Blob => "BLOB",
        }
    }

    /// Whether a non-null value returned by the driver fits this type.
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (DataType::Integer, Value::Integer(_) | Value::Boolean(_)) => true,
            (DataType::Real, Value::Real(_) | Value::Integer(_)) => true,
            (DataType::Text, Value::Text(_)) => true,
            (DataType::Blob, Value::Blob(_)) => true,
            (DataType::Boolean, Value::Boolean(_) | Value::Integer(0 | 1)) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Scalar(DataType),
    Relation(Arc<SchemaDescription>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    /// Optional fields may be excluded from a plan or come back NULL.
    pub optional: bool,
}

impl FieldDescriptor {
    pub fn is_relation(&self) -> bool {
        matches!(self.kind, FieldKind::Relation(_))
    }
}

/// Ordered field list of one record type.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDescription {
    type_name: String,
    fields: Vec<FieldDescriptor>,
}

impl SchemaDescription {
    pub fn builder(type_name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Alias prefix used when this type appears as a relation: its lower-cased name.
    pub fn relation_prefix(&self) -> String {
        self.type_name.to_lowercase()
    }
}

/// Explicit field-list builder standing in for reflection over a struct.
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    type_name: String,
    fields: Vec<FieldDescriptor>,
}

impl SchemaBuilder {
    pub fn scalar(self, name: impl Into<String>, data_type: DataType) -> Self {
        self.push(name, FieldKind::Scalar(data_type), false)
    }

    pub fn optional_scalar(self, name: impl Into<String>, data_type: DataType) -> Self {
        self.push(name, FieldKind::Scalar(data_type), true)
    }

    pub fn relation(self, name: impl Into<String>, schema: &SchemaDescription) -> Self {
        self.push(name, FieldKind::Relation(Arc::new(schema.clone())), false)
    }

    pub fn optional_relation(self, name: impl Into<String>, schema: &SchemaDescription) -> Self {
        self.push(name, FieldKind::Relation(Arc::new(schema.clone())), true)
    }

    fn push(mut self, name: impl Into<String>, kind: FieldKind, optional: bool) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.into(),
            kind,
            optional,
        });
        self
    }

    /// Validate and freeze the description.
    pub fn build(self) -> Result<SchemaDescription, SchemaError> {
        validate(&self.type_name, &self.fields)?;
        Ok(SchemaDescription {
            type_name: self.type_name,
            fields: self.fields,
        })
    }
}

fn validate(type_name: &str, fields: &[FieldDescriptor]) -> Result<(), SchemaError> {
    if type_name.is_empty() {
        return Err(SchemaError::EmptyTypeName);
    }

    let mut seen: Vec<&str> = Vec::with_capacity(fields.len());
    let mut prefixes: HashMap<String, &str> = HashMap::new();
    for field in fields {
        if field.name.is_empty() {
            return Err(SchemaError::EmptyFieldName {
                type_name: type_name.to_string(),
            });
        }
        if seen.contains(&field.name.as_str()) {
            return Err(SchemaError::DuplicateField {
                type_name: type_name.to_string(),
                field: field.name.clone(),
            });
        }
        seen.push(&field.name);

        if let FieldKind::Relation(nested) = &field.kind {
            if let Some(deep) = nested.fields.iter().find(|f| f.is_relation()) {
                return Err(SchemaError::NestedTooDeep {
                    type_name: type_name.to_string(),
                    field: field.name.clone(),
                    nested: nested.type_name.clone(),
                    nested_field: deep.name.clone(),
                });
            }
            let prefix = nested.relation_prefix();
            if let Some(first) = prefixes.get(&prefix) {
                return Err(SchemaError::DuplicateRelationPrefix {
                    type_name: type_name.to_string(),
                    first: first.to_string(),
                    second: field.name.clone(),
                    prefix,
                });
            }
            prefixes.insert(prefix, &field.name);
        }
    }
    Ok(())
}

/// A record type that can be planned and hydrated.
///
/// Implementations usually keep their description in a `static OnceLock`.
pub trait Mappable: Sized {
    fn schema() -> &'static SchemaDescription;

    fn from_record(record: Record) -> Result<Self, ConstructionError>;
}
