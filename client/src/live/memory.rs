//! A document source kept entirely in memory, for tests and offline play.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use super::{DocumentSource, Error, Query};

type Collections = BTreeMap<String, BTreeMap<String, Value>>;

#[derive(Default)]
pub struct MemorySource {
    collections: Mutex<Collections>,
    fetches: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `collection/id`.
    pub fn put(&self, collection: &str, id: &str, fields: Value) {
        self.lock()
            .entry(collection.into())
            .or_default()
            .insert(id.into(), fields);
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<Value> {
        self.lock()
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| with_id(id, fields))
    }

    /// How many queries have been run against this source.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Acquire)
    }

    fn lock(&self) -> MutexGuard<'_, Collections> {
        self.collections.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DocumentSource for MemorySource {
    async fn fetch(&self, query: &Query) -> Result<Option<Value>, Error> {
        self.fetches.fetch_add(1, Ordering::AcqRel);
        match query {
            Query::Document { collection, id } => Ok(self.get(collection, id)),
            Query::Collection {
                collection,
                filter,
                limit,
            } => {
                let collections = self.lock();
                let docs = collections
                    .get(collection)
                    .into_iter()
                    .flatten()
                    .filter(|(_, fields)| match filter {
                        Some((field, value)) => {
                            fields.get(field).and_then(Value::as_str) == Some(value.as_str())
                        }
                        None => true,
                    })
                    .take(limit.unwrap_or(usize::MAX))
                    .map(|(id, fields)| with_id(id, fields))
                    .collect();
                Ok(Some(Value::Array(docs)))
            }
        }
    }

    async fn create(&self, collection: &str, id: &str, fields: Value) -> Result<(), Error> {
        let mut collections = self.lock();
        let docs = collections.entry(collection.into()).or_default();
        if docs.contains_key(id) {
            return Err(Error::Exists {
                what: format!("{}/{}", collection, id),
            });
        }
        docs.insert(id.into(), fields);
        Ok(())
    }
}

fn with_id(id: &str, fields: &Value) -> Value {
    let mut doc = fields.clone();
    if let Value::Object(map) = &mut doc {
        map.insert("id".into(), Value::String(id.into()));
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn collection_queries_filter_and_limit() {
        let source = MemorySource::new();
        source.put("players", "a", json!({"tableId": "t1", "position": 1}));
        source.put("players", "b", json!({"tableId": "t2", "position": 1}));
        source.put("players", "c", json!({"tableId": "t1", "position": 2}));

        let query = Query::collection("players").filter_eq("tableId", "t1");
        let found = source.fetch(&query).await.unwrap().unwrap();
        let ids: Vec<_> = found
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["id"].as_str().unwrap().to_owned())
            .collect();
        assert_eq!(ids, vec!["a", "c"]);

        let limited = source.fetch(&query.limit(1)).await.unwrap().unwrap();
        assert_eq!(limited.as_array().unwrap().len(), 1);
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn create_refuses_existing_documents() {
        let source = MemorySource::new();
        source.create("accounts", "x", json!({"balance": 0})).await.unwrap();
        assert!(matches!(
            source.create("accounts", "x", json!({})).await,
            Err(Error::Exists { .. })
        ));
        assert_eq!(source.get("accounts", "x").unwrap()["id"], "x");
    }
}
