//! SQLite-backed [`Executor`] and the table definitions it can initialize.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::lock::Mutex;
use rusqlite::{Connection, Statement};
use serde::{Deserialize, Serialize};

use crate::error::DriverError;
use crate::query::{Executor, SqlQuery};
use crate::row::Row;
use crate::schema::{DataType, FieldKind, SchemaDescription};
use crate::value::Value;

/// Environment variable read by [`SqliteConfig::from_env`].
pub const DB_PATH_ENV: &str = "RUST_SQLITE_MAPPER_DB_PATH";

const IN_MEMORY: &str = ":memory:";

/// Tables to create when a database is opened
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSchema {
    pub tables: Vec<TableDefinition>,
}

impl DatabaseSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(mut self, table: TableDefinition) -> Self {
        self.tables.push(table);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    pub primary_key: Vec<String>,
    pub indexes: Vec<IndexDefinition>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Table holding the scalar fields of a record type. Relation fields are
    /// skipped; their rows live in the related type's own table.
    pub fn from_schema(name: impl Into<String>, schema: &SchemaDescription) -> Self {
        let columns = schema
            .fields()
            .iter()
            .filter_map(|field| match field.kind {
                FieldKind::Scalar(data_type) => Some(ColumnDefinition {
                    name: field.name.clone(),
                    data_type,
                    constraints: if field.optional {
                        Vec::new()
                    } else {
                        vec![ColumnConstraint::NotNull]
                    },
                }),
                FieldKind::Relation(_) => None,
            })
            .collect();
        Self {
            columns,
            ..Self::new(name)
        }
    }

    pub fn add_column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn add_index(mut self, index: IndexDefinition) -> Self {
        self.indexes.push(index);
        self
    }

    /// `CREATE TABLE` plus `CREATE INDEX` statements, separated by `;`.
    pub fn create_sql(&self) -> String {
        let mut definitions: Vec<String> = self.columns.iter().map(ColumnDefinition::sql).collect();
        if !self.primary_key.is_empty() {
            definitions.push(format!("PRIMARY KEY ({})", self.primary_key.join(", ")));
        }
        let mut sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({});",
            self.name,
            definitions.join(", ")
        );
        for index in &self.indexes {
            sql.push_str(&format!(
                "\nCREATE {}INDEX IF NOT EXISTS {} ON {} ({});",
                if index.unique { "UNIQUE " } else { "" },
                index.name,
                self.name,
                index.columns.join(", ")
            ));
        }
        sql
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: DataType,
    pub constraints: Vec<ColumnConstraint>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            constraints: Vec::new(),
        }
    }

    pub fn with_constraint(mut self, constraint: ColumnConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    fn sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.data_type.sql_type());
        for constraint in &self.constraints {
            sql.push(' ');
            sql.push_str(constraint.sql());
        }
        sql
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnConstraint {
    PrimaryKey,
    NotNull,
    Unique,
}

impl ColumnConstraint {
    fn sql(self) -> &'static str {
        match self {
            ColumnConstraint::PrimaryKey => "PRIMARY KEY",
            ColumnConstraint::NotNull => "NOT NULL",
            ColumnConstraint::Unique => "UNIQUE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

/// SQLite executor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// Path to the SQLite database file, `:memory:` for a private in-memory database
    pub db_path: String,
    /// How long to wait on a locked database before failing
    pub busy_timeout_ms: Option<u64>,
    pub foreign_keys: bool,
    /// Tables created on open if missing
    pub schema: DatabaseSchema,
}

impl SqliteConfig {
    /// Create a new SQLite config with path and schema
    pub fn new(db_path: impl Into<String>, schema: DatabaseSchema) -> Self {
        Self {
            db_path: db_path.into(),
            busy_timeout_ms: None,
            foreign_keys: true,
            schema,
        }
    }

    pub fn in_memory(schema: DatabaseSchema) -> Self {
        Self::new(IN_MEMORY, schema)
    }

    /// Path from `RUST_SQLITE_MAPPER_DB_PATH`, in-memory when unset.
    pub fn from_env(schema: DatabaseSchema) -> Self {
        let path = std::env::var(DB_PATH_ENV).unwrap_or_else(|_| IN_MEMORY.to_string());
        Self::new(path, schema)
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }
}

/// [`Executor`] over a single SQLite connection.
pub struct SqliteExecutor {
    connection: Mutex<Connection>,
}

impl SqliteExecutor {
    pub fn new(connection: Connection) -> Self {
        Self {
            connection: Mutex::new(connection),
        }
    }

    /// Open the configured database and create its tables.
    pub fn open(config: &SqliteConfig) -> Result<Self, DriverError> {
        let connection = if config.db_path == IN_MEMORY {
            Connection::open_in_memory()?
        } else {
            Connection::open(&config.db_path)?
        };
        if let Some(timeout) = config.busy_timeout_ms {
            connection.busy_timeout(Duration::from_millis(timeout))?;
        }
        if config.foreign_keys {
            connection.execute_batch("PRAGMA foreign_keys = ON;")?;
        }
        initialize_schema(&connection, &config.schema)?;
        tracing::info!(
            path = %config.db_path,
            tables = config.schema.tables.len(),
            "opened sqlite database"
        );
        Ok(Self::new(connection))
    }

    /// Run several `;`-separated statements without parameters.
    pub async fn execute_batch(&self, sql: &str) -> Result<(), DriverError> {
        let connection = self.connection.lock().await;
        connection.execute_batch(sql)?;
        Ok(())
    }
}

#[async_trait]
impl Executor for SqliteExecutor {
    async fn execute(&self, query: &SqlQuery) -> Result<usize, DriverError> {
        let started = Instant::now();
        let connection = self.connection.lock().await;
        let affected = execute_statement(&connection, query)?;
        tracing::debug!(
            statement = %query.statement,
            params = query.params.len(),
            affected,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "executed statement"
        );
        Ok(affected)
    }

    async fn fetch(&self, query: &SqlQuery) -> Result<Vec<Row>, DriverError> {
        let started = Instant::now();
        let connection = self.connection.lock().await;
        let rows = fetch_rows(&connection, query)?;
        tracing::debug!(
            statement = %query.statement,
            params = query.params.len(),
            rows = rows.len(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "fetched rows"
        );
        Ok(rows)
    }
}

fn initialize_schema(conn: &Connection, schema: &DatabaseSchema) -> rusqlite::Result<()> {
    for table in &schema.tables {
        conn.execute_batch(&table.create_sql())?;
    }
    Ok(())
}

fn prepare_bound<'c>(conn: &'c Connection, query: &SqlQuery) -> rusqlite::Result<Statement<'c>> {
    let mut stmt = conn.prepare(&query.statement)?;
    for (i, value) in query.params.positional.iter().enumerate() {
        stmt.raw_bind_parameter(i + 1, value)?;
    }
    for (name, value) in &query.params.named {
        let index = stmt
            .parameter_index(name)?
            .ok_or_else(|| rusqlite::Error::InvalidParameterName(name.clone()))?;
        stmt.raw_bind_parameter(index, value)?;
    }
    Ok(stmt)
}

fn execute_statement(conn: &Connection, query: &SqlQuery) -> rusqlite::Result<usize> {
    let mut stmt = prepare_bound(conn, query)?;
    stmt.raw_execute()
}

fn fetch_rows(conn: &Connection, query: &SqlQuery) -> rusqlite::Result<Vec<Row>> {
    let mut stmt = prepare_bound(conn, query)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
    let mut rows = stmt.raw_query();
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        let mut out = Row::new();
        for (i, name) in columns.iter().enumerate() {
            let raw = row.get_ref(i)?;
            let data_type = raw.data_type();
            let value = Value::try_from(raw)
                .map_err(|err| rusqlite::Error::FromSqlConversionFailure(i, data_type, Box::new(err)))?;
            out.push(name.clone(), value);
        }
        result.push(out);
    }
    Ok(result)
}
