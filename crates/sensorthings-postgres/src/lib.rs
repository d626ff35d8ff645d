//! PostgreSQL/PostGIS executor for SensorThings entity reads.
//!
//! Compiled statements from `sensorthings-query` run on a sqlx pool and the
//! rows come back as column-name/JSON maps ready for materialization.
//!
//! # Example
//!
//! ```ignore
//! use sensorthings_core::EntityType;
//! use sensorthings_postgres::{StoreConfig, connect_reader};
//! use sensorthings_query::QueryOptions;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StoreConfig::load("sensorthings.toml")?;
//! let reader = connect_reader(&config).await?;
//!
//! let options = QueryOptions::new().with_top(10);
//! let page = reader.get_entities(EntityType::Thing, &options).await?;
//! # Ok(())
//! # }
//! ```
//!
//! - [`config`]: pool and store settings
//! - [`error`]: error types specific to PostgreSQL operations
//! - [`executor`]: the [`QueryExecutor`](sensorthings_query::QueryExecutor) implementation
//! - [`pool`]: connection pool management

pub mod config;
pub mod error;
pub mod executor;
pub mod pool;

pub use config::{PostgresConfig, StoreConfig};
pub use error::{PostgresError, Result};
pub use executor::PgExecutor;
pub use pool::{create_pool, test_connection};

use sensorthings_query::EntityReader;
use tracing::info;

/// Validates `config`, connects, and returns a reader bound to the pool.
pub async fn connect_reader(config: &StoreConfig) -> Result<EntityReader<PgExecutor>> {
    config.validate()?;
    let executor = PgExecutor::connect(&config.postgres).await?;
    let reader = EntityReader::from_config(config.query.clone(), executor)?;
    info!(schema = %config.query.schema, "entity reader ready");
    Ok(reader)
}
