// Record types and executors shared by the integration tests.
#![allow(dead_code)]

use std::sync::{Mutex, OnceLock};

use async_trait::async_trait;
use rust_sqlite_mapper::sqlite::{DatabaseSchema, TableDefinition};
use rust_sqlite_mapper::{
    ConstructionError, DataType, DriverError, Executor, Mappable, Record, Row, SchemaDescription,
    SqlQuery, SqliteConfig, SqliteExecutor,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Dog {
    pub id: String,
    pub age: i64,
    pub name: String,
    pub weight: i64,
}

impl Dog {
    pub fn new(id: &str, age: i64, name: &str, weight: i64) -> Self {
        Self {
            id: id.to_string(),
            age,
            name: name.to_string(),
            weight,
        }
    }
}

impl Mappable for Dog {
    fn schema() -> &'static SchemaDescription {
        static SCHEMA: OnceLock<SchemaDescription> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            SchemaDescription::builder("Dog")
                .scalar("age", DataType::Integer)
                .scalar("id", DataType::Text)
                .scalar("name", DataType::Text)
                .scalar("weight", DataType::Integer)
                .build()
                .expect("valid Dog schema")
        })
    }

    fn from_record(record: Record) -> Result<Self, ConstructionError> {
        Ok(Self {
            id: record.get("id")?,
            age: record.get("age")?,
            name: record.get("name")?,
            weight: record.get("weight")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Kind {
    pub id: i64,
    pub name: String,
}

impl Mappable for Kind {
    fn schema() -> &'static SchemaDescription {
        static SCHEMA: OnceLock<SchemaDescription> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            SchemaDescription::builder("Kind")
                .scalar("id", DataType::Integer)
                .scalar("name", DataType::Text)
                .build()
                .expect("valid Kind schema")
        })
    }

    fn from_record(record: Record) -> Result<Self, ConstructionError> {
        Ok(Self {
            id: record.get("id")?,
            name: record.get("name")?,
        })
    }
}

/// A pet whose kind is joined in from the `kinds` table.
#[derive(Debug, Clone, PartialEq)]
pub struct Pet {
    pub id: String,
    pub name: String,
    pub nickname: Option<String>,
    pub kind: Kind,
}

impl Mappable for Pet {
    fn schema() -> &'static SchemaDescription {
        static SCHEMA: OnceLock<SchemaDescription> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            SchemaDescription::builder("Pet")
                .scalar("id", DataType::Text)
                .scalar("name", DataType::Text)
                .optional_scalar("nickname", DataType::Text)
                .relation("kind", Kind::schema())
                .build()
                .expect("valid Pet schema")
        })
    }

    fn from_record(record: Record) -> Result<Self, ConstructionError> {
        Ok(Self {
            id: record.get("id")?,
            name: record.get("name")?,
            nickname: record.get("nickname")?,
            kind: record.relation("kind")?,
        })
    }
}

/// In-memory database with a `dogs` table derived from [`Dog`].
pub fn dog_executor() -> SqliteExecutor {
    let schema = DatabaseSchema::new()
        .add_table(TableDefinition::from_schema("dogs", Dog::schema()).with_primary_key(&["id"]));
    SqliteExecutor::open(&SqliteConfig::in_memory(schema)).expect("open in-memory database")
}

pub async fn insert_dog(executor: &SqliteExecutor, dog: &Dog) {
    let insert = SqlQuery::new("INSERT INTO dogs (id, age, name, weight) VALUES (:id, :age, :name, :weight)")
        .with_params(
            rust_sqlite_mapper::Params::new()
                .with_named(":id", dog.id.as_str())
                .with_named(":age", dog.age)
                .with_named(":name", dog.name.as_str())
                .with_named(":weight", dog.weight),
        );
    let affected = executor.execute(&insert).await.expect("insert dog");
    assert_eq!(affected, 1);
}

/// Executor returning canned rows, recording every statement it receives.
#[derive(Default)]
pub struct CannedExecutor {
    pub rows: Vec<Row>,
    pub statements: Mutex<Vec<String>>,
}

impl CannedExecutor {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows,
            statements: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Executor for CannedExecutor {
    async fn execute(&self, query: &SqlQuery) -> Result<usize, DriverError> {
        self.statements.lock().unwrap().push(query.statement.clone());
        Ok(0)
    }

    async fn fetch(&self, query: &SqlQuery) -> Result<Vec<Row>, DriverError> {
        self.statements.lock().unwrap().push(query.statement.clone());
        Ok(self.rows.clone())
    }
}

/// Executor whose backend is always down.
pub struct UnreachableExecutor;

#[async_trait]
impl Executor for UnreachableExecutor {
    async fn execute(&self, _query: &SqlQuery) -> Result<usize, DriverError> {
        Err(anyhow::anyhow!("connection refused").into())
    }

    async fn fetch(&self, _query: &SqlQuery) -> Result<Vec<Row>, DriverError> {
        Err(anyhow::anyhow!("connection refused").into())
    }
}
