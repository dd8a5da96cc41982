//! Convention-based column planning and row hydration for the Runar ecosystem.
//!
//! # Intention
//!
//! - Generate aliased SELECT column lists for record types, including one
//!   level of nested relations ([`planner`]).
//! - Rebuild typed instances from the flat rows a database client returns,
//!   demultiplexing columns by alias prefix ([`hydrator`]).
//! - Tie a fetch to lazy hydration ([`query`]), with SQLite as the bundled
//!   client ([`sqlite`]).
//!
//! # Architectural Boundaries
//!
//! - No SQL parsing, connection pooling, transactions, caching or retries.
//! - Database errors are passed through, never interpreted.
//!
//! # Example
//!
//! ```rust,ignore
//! let columns = plan(Dog::schema(), Some("d"), &[])?;
//! let sql = SqlQuery::new(format!("SELECT {columns} FROM dogs d"));
//! for dog in query::<Dog, _>(&executor, Some("d"), &sql).await? {
//!     println!("{:?}", dog?);
//! }
//! ```

pub mod error;
pub mod hydrator;
pub mod logging;
pub mod planner;
pub mod query;
pub mod row;
pub mod schema;
pub mod sqlite;
pub mod value;

pub use error::{ConstructionError, DriverError, MapperError, Result, SchemaError};
pub use hydrator::{hydrate, hydrate_planned, hydrate_record, Record};
pub use planner::{plan, ColumnBinding, ColumnPlan};
pub use query::{query, query_records, Executor, Hydrated, Params, Records, SqlQuery};
pub use row::Row;
pub use schema::{DataType, FieldDescriptor, FieldKind, Mappable, SchemaBuilder, SchemaDescription};
pub use sqlite::{SqliteConfig, SqliteExecutor};
pub use value::{FromValue, Value};
