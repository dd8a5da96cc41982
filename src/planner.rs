//! SELECT column lists with deterministic aliases.
//!
//! Each occurrence of a type in a query gets a prefix; its scalar columns are
//! selected as `<prefix>.<field> AS <prefix>_<field>`. Relation fields select
//! the nested type's columns under the nested type's lower-cased name instead.

use std::collections::HashSet;
use std::fmt;

use crate::error::SchemaError;
use crate::schema::{FieldKind, SchemaDescription};

/// Column alias for `field` under `prefix`, or the bare field name.
pub(crate) fn column_alias(prefix: Option<&str>, field: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}_{field}"),
        None => field.to_string(),
    }
}

/// One selected column and the field it feeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnBinding {
    /// Table alias qualifying the column, `None` for bare columns.
    pub source: Option<String>,
    pub field: String,
    pub alias: String,
    /// Relation field this column belongs to, `None` for the type's own scalars.
    pub relation: Option<String>,
}

impl fmt::Display for ColumnBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}.{} AS {}", source, self.field, self.alias),
            None => f.write_str(&self.field),
        }
    }
}

/// Ordered column-to-field bindings for one occurrence of a type in a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPlan {
    bindings: Vec<ColumnBinding>,
}

impl ColumnPlan {
    pub fn new(
        schema: &SchemaDescription,
        prefix: Option<&str>,
        excludes: &[&str],
    ) -> Result<Self, SchemaError> {
        for excluded in excludes {
            match schema.field(excluded) {
                None => {
                    return Err(SchemaError::UnknownExclude {
                        type_name: schema.type_name().to_string(),
                        field: excluded.to_string(),
                    })
                }
                Some(field) if !field.optional => {
                    return Err(SchemaError::ExcludedRequiredField {
                        type_name: schema.type_name().to_string(),
                        field: excluded.to_string(),
                    })
                }
                Some(_) => {}
            }
        }

        let mut bindings = Vec::with_capacity(schema.fields().len());
        for field in schema.fields() {
            if excludes.contains(&field.name.as_str()) {
                continue;
            }
            match &field.kind {
                FieldKind::Scalar(_) => bindings.push(ColumnBinding {
                    source: prefix.map(str::to_string),
                    field: field.name.clone(),
                    alias: column_alias(prefix, &field.name),
                    relation: None,
                }),
                FieldKind::Relation(nested) => {
                    let relation_prefix = nested.relation_prefix();
                    for nested_field in nested.fields() {
                        bindings.push(ColumnBinding {
                            source: Some(relation_prefix.clone()),
                            field: nested_field.name.clone(),
                            alias: column_alias(Some(&relation_prefix), &nested_field.name),
                            relation: Some(field.name.clone()),
                        });
                    }
                }
            }
        }

        let mut aliases = HashSet::with_capacity(bindings.len());
        if let Some(duplicate) = bindings.iter().find(|b| !aliases.insert(b.alias.as_str())) {
            return Err(SchemaError::DuplicateAlias {
                type_name: schema.type_name().to_string(),
                alias: duplicate.alias.clone(),
            });
        }
        drop(aliases);

        Ok(Self { bindings })
    }

    pub fn bindings(&self) -> &[ColumnBinding] {
        &self.bindings
    }

    /// Binding of a top-level scalar (`relation` = `None`) or of a relation's field.
    pub fn binding(&self, relation: Option<&str>, field: &str) -> Option<&ColumnBinding> {
        self.bindings
            .iter()
            .find(|b| b.relation.as_deref() == relation && b.field == field)
    }

    /// Aliases in selection order, i.e. the column names the driver will return.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|b| b.alias.as_str())
    }

    pub fn to_sql(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ColumnPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, binding) in self.bindings.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{binding}")?;
        }
        Ok(())
    }
}

/// Column list for a SELECT clause. Identifiers are not quoted or escaped.
pub fn plan(
    schema: &SchemaDescription,
    prefix: Option<&str>,
    excludes: &[&str],
) -> Result<String, SchemaError> {
    ColumnPlan::new(schema, prefix, excludes).map(|plan| plan.to_sql())
}
