pub mod catalog;
pub mod compiler;
pub mod config;
pub mod decode;
pub mod error;
pub mod executor;
pub mod expansion;
pub mod filter;
pub mod materialize;
pub mod odata;
pub mod reader;
pub mod sql_builder;

pub use catalog::{Catalog, EntitySchema, FieldDef, FieldKind, JoinCondition};
pub use compiler::{CompiledQuery, QueryCompiler, Scope};
pub use config::QueryConfig;
pub use error::{MaterializeError, QueryError};
pub use executor::{ExecutionError, QueryExecutor, Row};
pub use expansion::{PREFIXES, QueryNode};
pub use materialize::materialize;
pub use odata::{
    Comparison, ExpandOperation, FilterOperator, FilterValue, OrderByItem, Predicate, QueryOptions,
};
pub use reader::{EntityPage, EntityReader, ReaderError};
pub use sql_builder::{BuiltQuery, SortOrder, SqlValue};
