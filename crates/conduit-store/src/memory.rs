use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::types::{Query, RESERVED_FIELDS, Record};
use crate::{Store, StoreError};

/// In-process store. Records are kept in insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
  records: RwLock<Vec<Record>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

fn check_kind(kind: &str) -> Result<(), StoreError> {
  if kind.is_empty() || kind.contains('/') {
    return Err(StoreError::InvalidKind(kind.to_string()));
  }
  Ok(())
}

fn check_fields(fields: &Map<String, Value>) -> Result<(), StoreError> {
  match RESERVED_FIELDS.iter().find(|r| fields.contains_key(**r)) {
    Some(reserved) => Err(StoreError::ReservedField(reserved.to_string())),
    None => Ok(()),
  }
}

#[async_trait]
impl Store for MemoryStore {
  async fn execute(&self, query: &Query) -> Result<Vec<Record>, StoreError> {
    check_kind(&query.kind)?;
    let records = self.records.read().await;
    Ok(
      records
        .iter()
        .filter(|r| query.matches(r))
        .skip(query.offset)
        .take(query.limit.unwrap_or(usize::MAX))
        .cloned()
        .collect(),
    )
  }

  async fn count(&self, query: &Query) -> Result<u64, StoreError> {
    check_kind(&query.kind)?;
    let records = self.records.read().await;
    Ok(records.iter().filter(|r| query.matches(r)).count() as u64)
  }

  async fn save_entity(
    &self,
    kind: &str,
    fields: Map<String, Value>,
  ) -> Result<Record, StoreError> {
    check_kind(kind)?;
    check_fields(&fields)?;

    let record = Record {
      id: uuid::Uuid::new_v4().to_string(),
      kind: kind.to_string(),
      created_at: Utc::now(),
      fields,
    };
    self.records.write().await.push(record.clone());
    Ok(record)
  }

  async fn patch_entity(
    &self,
    query: &Query,
    fields: Map<String, Value>,
  ) -> Result<u64, StoreError> {
    check_kind(&query.kind)?;
    check_fields(&fields)?;

    let mut records = self.records.write().await;
    let mut changed = 0;
    for record in records.iter_mut().filter(|r| query.matches(r)) {
      record
        .fields
        .extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
      changed += 1;
    }
    Ok(changed)
  }

  async fn remove_entity(&self, query: &Query) -> Result<u64, StoreError> {
    check_kind(&query.kind)?;
    let mut records = self.records.write().await;
    let before = records.len();
    records.retain(|r| !query.matches(r));
    Ok((before - records.len()) as u64)
  }
}
