//! Conduit Store
//!
//! The narrow persistence interface conduit handlers talk to. The [`Store`]
//! trait covers:
//! - Querying records of one kind by field equality
//! - Creating, patching and removing records
//! - Counting matches for pagination metadata
//!
//! [`MemoryStore`] keeps everything in process and backs the built-in routes
//! and tests.

mod memory;
mod page;
mod types;

pub use memory::MemoryStore;
pub use page::{Page, paginate};
pub use types::{Query, Record};

use async_trait::async_trait;
use serde_json::{Map, Value};

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  /// Record fields may not shadow the record's own members.
  #[error("field '{0}' is reserved")]
  ReservedField(String),

  #[error("invalid record kind: '{0}'")]
  InvalidKind(String),
}

/// Storage trait for kind-partitioned JSON records.
#[async_trait]
pub trait Store: Send + Sync {
  /// Records matching `query`, oldest first, honouring limit and offset.
  async fn execute(&self, query: &Query) -> Result<Vec<Record>, StoreError>;

  /// Number of records matching `query`, ignoring limit and offset.
  async fn count(&self, query: &Query) -> Result<u64, StoreError>;

  /// Create a record and return it with its generated id.
  async fn save_entity(
    &self,
    kind: &str,
    fields: Map<String, Value>,
  ) -> Result<Record, StoreError>;

  /// Merge `fields` into every record matching `query`. Returns how many
  /// records changed.
  async fn patch_entity(
    &self,
    query: &Query,
    fields: Map<String, Value>,
  ) -> Result<u64, StoreError>;

  /// Delete every record matching `query`. Returns how many were removed.
  async fn remove_entity(&self, query: &Query) -> Result<u64, StoreError>;
}
