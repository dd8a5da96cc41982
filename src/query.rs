//! Fetch-then-hydrate query wrapper and the contract expected from a database client.
//!
//! All I/O happens in the single awaited [`Executor::fetch`] call; the returned
//! sequence only does in-memory hydration, one row per `next()`. Dropping the
//! sequence early skips hydrating the remaining rows.

use std::iter::FusedIterator;
use std::marker::PhantomData;

use async_trait::async_trait;
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};

use crate::error::{ConstructionError, DriverError, MapperError, SchemaError};
use crate::hydrator::{hydrate_planned, Record};
use crate::planner::ColumnPlan;
use crate::row::Row;
use crate::schema::{Mappable, SchemaDescription};
use crate::value::Value;

/// Parameter bindings for SQL queries
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Params {
    /// Bound to `?1`, `?2`, ... in order
    pub positional: Vec<Value>,
    /// Bound by name, e.g. `:id`
    pub named: Vec<(String, Value)>,
}

impl Params {
    /// Create a new Params object
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional value
    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Add a named value
    pub fn with_named(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.named.push((name.to_string(), value.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.positional.len() + self.named.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// SQL statement with typed parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlQuery {
    pub statement: String,
    pub params: Params,
}

impl SqlQuery {
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            params: Params::new(),
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }
}

/// The database client: runs statements and returns fully materialized rows.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run a DDL/DML statement, returning the number of affected rows.
    async fn execute(&self, query: &SqlQuery) -> Result<usize, DriverError>;

    /// Run a SELECT and return every row in driver order.
    async fn fetch(&self, query: &SqlQuery) -> Result<Vec<Row>, DriverError>;
}

struct Cursor<'s> {
    schema: &'s SchemaDescription,
    plan: ColumnPlan,
    rows: std::vec::IntoIter<Row>,
    position: usize,
    stopped: bool,
}

impl<'s> Cursor<'s> {
    fn new(
        schema: &'s SchemaDescription,
        prefix: Option<&str>,
        rows: Vec<Row>,
    ) -> Result<Self, SchemaError> {
        Ok(Self {
            schema,
            plan: ColumnPlan::new(schema, prefix, &[])?,
            rows: rows.into_iter(),
            position: 0,
            stopped: false,
        })
    }

    fn next_record(&mut self) -> Option<Result<Record, ConstructionError>> {
        if self.stopped {
            return None;
        }
        let row = self.rows.next()?;
        self.position += 1;
        tracing::trace!(
            type_name = self.schema.type_name(),
            row = self.position,
            "hydrating row"
        );
        Some(hydrate_planned(self.schema, &self.plan, &row))
    }

    fn stop(&mut self, err: &MapperError) {
        tracing::warn!(
            type_name = self.schema.type_name(),
            row = self.position,
            remaining = self.rows.len(),
            error = %err,
            "hydration failed, ending sequence"
        );
        self.stopped = true;
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.stopped {
            (0, Some(0))
        } else {
            (0, Some(self.rows.len()))
        }
    }
}

/// Lazy sequence of hydrated `T`s, in row order, ending at the first failure.
pub struct Hydrated<T> {
    cursor: Cursor<'static>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Mappable> Hydrated<T> {
    /// Hydrate `rows` lazily against `T`'s schema.
    ///
    /// Fails up front when the schema cannot be planned under `prefix`.
    pub fn new(prefix: Option<&str>, rows: Vec<Row>) -> Result<Self, SchemaError> {
        Ok(Self {
            cursor: Cursor::new(T::schema(), prefix, rows)?,
            _marker: PhantomData,
        })
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<T, MapperError>> {
        stream::iter(self)
    }
}

impl<T: Mappable> Iterator for Hydrated<T> {
    type Item = Result<T, MapperError>;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self
            .cursor
            .next_record()?
            .map_err(MapperError::from)
            .and_then(|record| T::from_record(record).map_err(MapperError::from));
        if let Err(err) = &result {
            self.cursor.stop(err);
        }
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.cursor.size_hint()
    }
}

impl<T: Mappable> FusedIterator for Hydrated<T> {}

/// Lazy sequence of untyped [`Record`]s, ending at the first failure.
pub struct Records<'s> {
    cursor: Cursor<'s>,
}

impl Iterator for Records<'_> {
    type Item = Result<Record, MapperError>;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.cursor.next_record()?.map_err(MapperError::from);
        if let Err(err) = &result {
            self.cursor.stop(err);
        }
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.cursor.size_hint()
    }
}

impl FusedIterator for Records<'_> {}

/// Fetch `sql` through `executor` and hydrate each row as a `T` under `prefix`.
///
/// Driver failures, and schemas whose planned aliases collide under `prefix`,
/// are returned before any hydration starts.
pub async fn query<T, E>(
    executor: &E,
    prefix: Option<&str>,
    sql: &SqlQuery,
) -> Result<Hydrated<T>, MapperError>
where
    T: Mappable,
    E: Executor + ?Sized,
{
    let rows = executor.fetch(sql).await?;
    tracing::debug!(
        type_name = T::schema().type_name(),
        prefix = prefix,
        rows = rows.len(),
        "fetched rows for hydration"
    );
    Ok(Hydrated::new(prefix, rows)?)
}

/// Like [`query`], for callers holding only a [`SchemaDescription`].
pub async fn query_records<'s, E>(
    executor: &E,
    schema: &'s SchemaDescription,
    prefix: Option<&str>,
    sql: &SqlQuery,
) -> Result<Records<'s>, MapperError>
where
    E: Executor + ?Sized,
{
    let rows = executor.fetch(sql).await?;
    tracing::debug!(
        type_name = schema.type_name(),
        prefix = prefix,
        rows = rows.len(),
        "fetched rows for hydration"
    );
    Ok(Records {
        cursor: Cursor::new(schema, prefix, rows)?,
    })
}
