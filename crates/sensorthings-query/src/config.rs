use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::QueryError;

/// Settings of the query compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Database schema the entity tables live in. Empty for none.
    #[serde(default = "default_schema")]
    pub schema: String,
    /// Page size of expansion levels that do not set `$top`.
    #[serde(default = "default_max_top")]
    pub max_top: u64,
}

fn default_schema() -> String {
    "v1".into()
}
fn default_max_top() -> u64 {
    200
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            schema: default_schema(),
            max_top: default_max_top(),
        }
    }
}

impl QueryConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_top == 0 {
            return Err("query.max_top must be > 0".into());
        }
        self.catalog().map_err(|e| format!("query.schema: {e}"))?;
        Ok(())
    }

    /// Catalog bound to the configured schema.
    pub fn catalog(&self) -> Result<Catalog, QueryError> {
        Catalog::new(self.schema.as_str())
    }
}
