//! Entity reads: compile, execute, materialize.

use std::sync::Arc;

use sensorthings_core::{Entity, EntityType};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::catalog::Catalog;
use crate::compiler::{QueryCompiler, Scope};
use crate::config::QueryConfig;
use crate::error::{MaterializeError, QueryError};
use crate::executor::{ExecutionError, QueryExecutor};
use crate::materialize::materialize;
use crate::odata::QueryOptions;

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("{entity_type} with id {id} not found")]
    NotFound { entity_type: EntityType, id: i64 },

    #[error("No {entity_type} found for {from} with id {id}")]
    RelatedNotFound {
        entity_type: EntityType,
        from: EntityType,
        id: i64,
    },

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Materialize(#[from] MaterializeError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl ReaderError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::RelatedNotFound { .. })
    }
}

/// One page of a collection read.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityPage {
    pub entities: Vec<Entity>,
    /// Total number of matches ignoring paging; `None` with `$count=false`.
    pub count: Option<i64>,
}

/// Reads entities through a [`QueryExecutor`].
pub struct EntityReader<E> {
    catalog: Arc<Catalog>,
    config: QueryConfig,
    executor: E,
}

impl<E: QueryExecutor> EntityReader<E> {
    pub fn new(catalog: Arc<Catalog>, config: QueryConfig, executor: E) -> Self {
        Self {
            catalog,
            config,
            executor,
        }
    }

    /// Builds the catalog from `config`.
    pub fn from_config(config: QueryConfig, executor: E) -> Result<Self, QueryError> {
        let catalog = Arc::new(config.catalog()?);
        Ok(Self::new(catalog, config, executor))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// `/Things(1)`
    #[instrument(skip(self, options))]
    pub async fn get_entity(
        &self,
        entity_type: EntityType,
        id: i64,
        options: &QueryOptions,
    ) -> Result<Entity, ReaderError> {
        let page = self
            .read(entity_type, Scope::Entity(id), options, false)
            .await?;
        page.entities
            .into_iter()
            .next()
            .ok_or(ReaderError::NotFound { entity_type, id })
    }

    /// `/Things`
    #[instrument(skip(self, options))]
    pub async fn get_entities(
        &self,
        entity_type: EntityType,
        options: &QueryOptions,
    ) -> Result<EntityPage, ReaderError> {
        self.read(entity_type, Scope::Collection, options, true)
            .await
    }

    /// `/Datastreams(1)/Thing`
    #[instrument(skip(self, options))]
    pub async fn get_entity_by(
        &self,
        entity_type: EntityType,
        from: EntityType,
        from_id: i64,
        options: &QueryOptions,
    ) -> Result<Entity, ReaderError> {
        let scope = Scope::Related { from, id: from_id };
        let page = self.read(entity_type, scope, options, false).await?;
        page.entities
            .into_iter()
            .next()
            .ok_or(ReaderError::RelatedNotFound {
                entity_type,
                from,
                id: from_id,
            })
    }

    /// `/Things(1)/Datastreams`
    #[instrument(skip(self, options))]
    pub async fn get_entities_by(
        &self,
        entity_type: EntityType,
        from: EntityType,
        from_id: i64,
        options: &QueryOptions,
    ) -> Result<EntityPage, ReaderError> {
        let scope = Scope::Related { from, id: from_id };
        self.read(entity_type, scope, options, true).await
    }

    async fn read(
        &self,
        entity_type: EntityType,
        scope: Scope,
        options: &QueryOptions,
        with_count: bool,
    ) -> Result<EntityPage, ReaderError> {
        let compiler = QueryCompiler::new(&self.catalog, self.config.max_top);
        let compiled = compiler.compile_select(entity_type, scope, options)?;
        let count_query = if with_count {
            compiler.compile_count(entity_type, scope, options)?
        } else {
            None
        };

        let rows = self.executor.fetch_rows(&compiled.query);
        let (rows, count) = match &count_query {
            Some(count_query) => {
                let (rows, count) =
                    tokio::try_join!(rows, self.executor.fetch_count(count_query))
                        .inspect_err(|e| warn!(error = %e, %entity_type, "read failed"))?;
                (rows, Some(count))
            }
            None => {
                let rows = rows
                    .await
                    .inspect_err(|e| warn!(error = %e, %entity_type, "read failed"))?;
                (rows, None)
            }
        };

        let entities = materialize(&self.catalog, &compiled.tree, &rows)?;
        debug!(
            %entity_type,
            rows = rows.len(),
            entities = entities.len(),
            "materialized"
        );
        Ok(EntityPage { entities, count })
    }
}
