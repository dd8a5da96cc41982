//! Rebuild typed instances from aliased rows.
//!
//! Every column is located through the [`ColumnPlan`] binding table of the
//! schema under its prefix, so a row holding several occurrences of a type (a
//! self-join) is demultiplexed without ever reading another occurrence's
//! columns. Plans with colliding aliases are rejected before any row is read.

use std::collections::HashMap;

use crate::error::{ConstructionError, MapperError};
use crate::planner::ColumnPlan;
use crate::row::Row;
use crate::schema::{DataType, FieldDescriptor, FieldKind, Mappable, SchemaDescription};
use crate::value::{FromValue, Value};

/// Attribute set of one hydrated row: scalar values plus nested relation records.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    type_name: String,
    values: HashMap<String, Value>,
    relations: HashMap<String, Record>,
}

impl Record {
    fn empty(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            values: HashMap::new(),
            relations: HashMap::new(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Raw value of a scalar field, `None` when its column was not selected.
    pub fn value(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Typed value of a scalar field.
    pub fn get<T: FromValue>(&self, field: &str) -> Result<T, ConstructionError> {
        match self.values.get(field) {
            Some(value) => T::from_value(value.clone()).ok_or_else(|| {
                if value.is_null() {
                    ConstructionError::UnexpectedNull {
                        type_name: self.type_name.clone(),
                        field: field.to_string(),
                    }
                } else {
                    ConstructionError::TypeMismatch {
                        type_name: self.type_name.clone(),
                        field: field.to_string(),
                        expected: T::EXPECTED,
                        found: value.kind_name(),
                    }
                }
            }),
            None => T::from_missing().ok_or_else(|| ConstructionError::MissingField {
                type_name: self.type_name.clone(),
                field: field.to_string(),
                column: field.to_string(),
            }),
        }
    }

    /// Nested record of a relation field.
    pub fn record(&self, field: &str) -> Option<&Record> {
        self.relations.get(field)
    }

    pub fn relation<T: Mappable>(&self, field: &str) -> Result<T, ConstructionError> {
        match self.optional_relation(field)? {
            Some(related) => Ok(related),
            None => Err(ConstructionError::MissingRelation {
                type_name: self.type_name.clone(),
                field: field.to_string(),
            }),
        }
    }

    pub fn optional_relation<T: Mappable>(&self, field: &str) -> Result<Option<T>, ConstructionError> {
        self.relations
            .get(field)
            .cloned()
            .map(T::from_record)
            .transpose()
    }
}

/// Hydrate the attribute set of `schema` from `row`.
///
/// `prefix` must be the one the columns were planned with (`None` for bare
/// column names). Hydration is all-or-nothing: any missing required column,
/// unexpected NULL or ill-typed value fails the whole row.
pub fn hydrate_record(
    schema: &SchemaDescription,
    prefix: Option<&str>,
    row: &Row,
) -> Result<Record, MapperError> {
    let plan = ColumnPlan::new(schema, prefix, &[])?;
    Ok(hydrate_planned(schema, &plan, row)?)
}

/// Hydrate `row` through an existing plan of `schema`.
///
/// Fields the plan does not select are treated as absent columns, so this is
/// the way to hydrate rows fetched with a plan that has exclusions.
pub fn hydrate_planned(
    schema: &SchemaDescription,
    plan: &ColumnPlan,
    row: &Row,
) -> Result<Record, ConstructionError> {
    let mut record = Record::empty(schema.type_name());

    for field in schema.fields() {
        match &field.kind {
            FieldKind::Scalar(data_type) => {
                let alias = plan.binding(None, &field.name).map(|b| b.alias.as_str());
                if let Some(value) = read_scalar(schema, field, *data_type, alias, row)? {
                    record.values.insert(field.name.clone(), value);
                }
            }
            FieldKind::Relation(nested) => {
                let aliases: Vec<Option<&str>> = nested
                    .fields()
                    .iter()
                    .map(|f| plan.binding(Some(field.name.as_str()), &f.name).map(|b| b.alias.as_str()))
                    .collect();
                if field.optional && relation_absent(&aliases, row) {
                    continue;
                }

                let mut related = Record::empty(nested.type_name());
                for (nested_field, alias) in nested.fields().iter().zip(aliases) {
                    // nested schemas hold scalars only
                    let FieldKind::Scalar(data_type) = nested_field.kind else {
                        continue;
                    };
                    if let Some(value) = read_scalar(nested, nested_field, data_type, alias, row)? {
                        related.values.insert(nested_field.name.clone(), value);
                    }
                }
                record.relations.insert(field.name.clone(), related);
            }
        }
    }

    Ok(record)
}

// `Ok(None)` for an optional field whose column was not selected.
fn read_scalar(
    schema: &SchemaDescription,
    field: &FieldDescriptor,
    data_type: DataType,
    alias: Option<&str>,
    row: &Row,
) -> Result<Option<Value>, ConstructionError> {
    match alias.and_then(|alias| row.get(alias)) {
        None if field.optional => Ok(None),
        None => Err(ConstructionError::MissingField {
            type_name: schema.type_name().to_string(),
            field: field.name.clone(),
            column: alias.unwrap_or(&field.name).to_string(),
        }),
        Some(Value::Null) if !field.optional => Err(ConstructionError::UnexpectedNull {
            type_name: schema.type_name().to_string(),
            field: field.name.clone(),
        }),
        Some(value) if value.is_null() || data_type.accepts(value) => Ok(Some(value.clone())),
        Some(value) => Err(ConstructionError::TypeMismatch {
            type_name: schema.type_name().to_string(),
            field: field.name.clone(),
            expected: data_type.name(),
            found: value.kind_name(),
        }),
    }
}

// No column of the relation selected, or all of them NULL (an unmatched LEFT JOIN).
fn relation_absent(aliases: &[Option<&str>], row: &Row) -> bool {
    aliases
        .iter()
        .all(|alias| alias.and_then(|alias| row.get(alias)).map_or(true, Value::is_null))
}

/// Hydrate one instance of `T` from `row`.
pub fn hydrate<T: Mappable>(prefix: Option<&str>, row: &Row) -> Result<T, MapperError> {
    let record = hydrate_record(T::schema(), prefix, row)?;
    Ok(T::from_record(record)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaError;

    fn kind() -> SchemaDescription {
        SchemaDescription::builder("Kind")
            .scalar("id", DataType::Integer)
            .scalar("name", DataType::Text)
            .build()
            .unwrap()
    }

    fn dog() -> SchemaDescription {
        SchemaDescription::builder("Dog")
            .scalar("id", DataType::Text)
            .scalar("name", DataType::Text)
            .optional_scalar("weight", DataType::Integer)
            .optional_relation("kind", &kind())
            .build()
            .unwrap()
    }

    #[test]
    fn reads_only_its_own_prefix() {
        let row = Row::new()
            .with_column("d1_id", "a")
            .with_column("d1_name", "rex")
            .with_column("d2_id", "b")
            .with_column("d2_name", "fido");
        let record = hydrate_record(&dog(), Some("d2"), &row).unwrap();
        assert_eq!(record.get::<String>("id").unwrap(), "b");
        assert_eq!(record.get::<String>("name").unwrap(), "fido");
        assert_eq!(record.get::<Option<i64>>("weight").unwrap(), None);
        assert!(record.record("kind").is_none());
    }

    #[test]
    fn field_names_with_separator_do_not_leak_across_prefixes() {
        let schema = SchemaDescription::builder("Pair")
            .scalar("x", DataType::Integer)
            .build()
            .unwrap();
        // stripping `d_` from `d_d_x` would yield a bogus field `d_x`
        let row = Row::new().with_column("d_d_x", 1).with_column("d_x", 2);
        let record = hydrate_record(&schema, Some("d"), &row).unwrap();
        assert_eq!(record.get::<i64>("x").unwrap(), 2);
    }

    #[test]
    fn nests_relation_under_field_name() {
        let row = Row::new()
            .with_column("dog_id", "a")
            .with_column("dog_name", "rex")
            .with_column("kind_id", 3)
            .with_column("kind_name", "terrier");
        let record = hydrate_record(&dog(), Some("dog"), &row).unwrap();
        let kind = record.record("kind").unwrap();
        assert_eq!(kind.type_name(), "Kind");
        assert_eq!(kind.get::<i64>("id").unwrap(), 3);
    }

    #[test]
    fn null_relation_columns_leave_optional_relation_empty() {
        let row = Row::new()
            .with_column("dog_id", "a")
            .with_column("dog_name", "rex")
            .with_column("kind_id", Value::Null)
            .with_column("kind_name", Value::Null);
        let record = hydrate_record(&dog(), Some("dog"), &row).unwrap();
        assert!(record.record("kind").is_none());
    }

    #[test]
    fn missing_required_column_fails() {
        let schema = dog();
        let plan = ColumnPlan::new(&schema, Some("dog"), &[]).unwrap();
        let row = Row::new().with_column("dog_id", "a");
        let err = hydrate_planned(&schema, &plan, &row).unwrap_err();
        assert_eq!(
            err,
            ConstructionError::MissingField {
                type_name: "Dog".to_string(),
                field: "name".to_string(),
                column: "dog_name".to_string(),
            }
        );
    }

    #[test]
    fn excluded_optional_field_is_left_unset() {
        let schema = dog();
        let plan = ColumnPlan::new(&schema, Some("dog"), &["weight"]).unwrap();
        // a stray column under the excluded alias is not read
        let row = Row::new()
            .with_column("dog_id", "a")
            .with_column("dog_name", "rex")
            .with_column("dog_weight", 12);
        let record = hydrate_planned(&schema, &plan, &row).unwrap();
        assert_eq!(record.value("id"), Some(&Value::Text("a".to_string())));
        assert_eq!(record.value("weight"), None);
    }

    #[test]
    fn ill_typed_and_null_values_fail() {
        let row = Row::new().with_column("id", 1).with_column("name", "rex");
        assert!(matches!(
            hydrate_record(&dog(), None, &row),
            Err(MapperError::Construction(ConstructionError::TypeMismatch {
                expected: "text",
                found: "integer",
                ..
            }))
        ));

        let row = Row::new().with_column("id", "a").with_column("name", Value::Null);
        assert!(matches!(
            hydrate_record(&dog(), None, &row),
            Err(MapperError::Construction(ConstructionError::UnexpectedNull { .. }))
        ));
    }

    #[test]
    fn colliding_aliases_fail_before_reading_the_row() {
        // bare `kind_id` and the relation's `kind.id` both come back as `kind_id`
        let schema = SchemaDescription::builder("Pet")
            .scalar("kind_id", DataType::Integer)
            .relation("kind", &kind())
            .build()
            .unwrap();
        let row = Row::new()
            .with_column("kind_id", 7)
            .with_column("kind_name", "cat");
        assert!(matches!(
            hydrate_record(&schema, None, &row),
            Err(MapperError::Schema(SchemaError::DuplicateAlias { ref alias, .. })) if alias == "kind_id"
        ));

        let row = Row::new()
            .with_column("pet_kind_id", 1)
            .with_column("kind_id", 7)
            .with_column("kind_name", "cat");
        let record = hydrate_record(&schema, Some("pet"), &row).unwrap();
        assert_eq!(record.get::<i64>("kind_id").unwrap(), 1);
        assert_eq!(record.record("kind").unwrap().get::<i64>("id").unwrap(), 7);
    }

    #[test]
    fn record_getters_report_mismatches() {
        let row = Row::new().with_column("id", "a").with_column("name", "rex");
        let record = hydrate_record(&dog(), None, &row).unwrap();
        assert!(matches!(
            record.get::<i64>("name"),
            Err(ConstructionError::TypeMismatch { expected: "integer", .. })
        ));
        assert!(matches!(
            record.get::<i64>("weight"),
            Err(ConstructionError::MissingField { .. })
        ));
    }
}
