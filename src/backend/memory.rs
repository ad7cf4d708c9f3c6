//! In-process collection service backed by fixture records.
//!
//! Records are stored already expanded, so the `expand` option is accepted
//! and ignored. Filters support `field = "value"` terms joined with `&&`.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use super::subscriptions::{topic_name, ChangeHandler, RecordEvent, SubscriptionId, SubscriptionRegistry};
use super::{CollectionService, ListOptions, RecordPage, ALL_RECORDS};
use crate::error::{Result, ScheduleError};

#[derive(Default)]
pub struct InMemoryService {
    collections: RwLock<HashMap<String, Vec<Value>>>,
    subscriptions: SubscriptionRegistry,
    failing: Mutex<HashSet<String>>,
    fail_unsubscribe: AtomicBool,
    fetches: Mutex<Vec<String>>,
}

impl InMemoryService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a fixture file: a JSON object mapping collection names to record arrays.
    pub fn from_fixture(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let fixture: HashMap<String, Vec<Value>> = serde_json::from_str(&text)?;
        let service = Self::new();
        for (collection, records) in fixture {
            service.set_collection(&collection, records);
        }
        Ok(service)
    }

    pub fn set_collection(&self, collection: &str, records: Vec<Value>) {
        let mut collections = self.collections.write().unwrap_or_else(|e| e.into_inner());
        collections.insert(collection.to_string(), records);
    }

    pub fn insert(&self, collection: &str, record: Value) {
        let mut collections = self.collections.write().unwrap_or_else(|e| e.into_inner());
        collections.entry(collection.to_string()).or_default().push(record);
    }

    /// Inserts a record and notifies subscribers with a `create` event.
    pub fn insert_and_emit(&self, collection: &str, record: Value) -> usize {
        self.insert(collection, record.clone());
        self.emit(collection, "create", record)
    }

    /// Delivers a record event to `collection/*` and `collection/<id>` subscribers.
    pub fn emit(&self, collection: &str, action: &str, record: Value) -> usize {
        let event = RecordEvent {
            collection: collection.to_string(),
            action: action.to_string(),
            record,
        };
        let mut delivered = self
            .subscriptions
            .dispatch(&topic_name(collection, ALL_RECORDS), &event);
        if let Some(id) = event.record.get("id").and_then(Value::as_str) {
            delivered += self.subscriptions.dispatch(&topic_name(collection, id), &event);
        }
        delivered
    }

    /// Makes every fetch from `collection` fail until [`Self::recover`] is called.
    pub fn fail_collection(&self, collection: &str) {
        let mut failing = self.failing.lock().unwrap_or_else(|e| e.into_inner());
        failing.insert(collection.to_string());
    }

    pub fn recover(&self, collection: &str) {
        let mut failing = self.failing.lock().unwrap_or_else(|e| e.into_inner());
        failing.remove(collection);
    }

    pub fn fail_unsubscribe(&self, fail: bool) {
        self.fail_unsubscribe.store(fail, AtomicOrdering::SeqCst);
    }

    /// How many list calls reached `collection`.
    pub fn fetch_count(&self, collection: &str) -> usize {
        let fetches = self.fetches.lock().unwrap_or_else(|e| e.into_inner());
        fetches.iter().filter(|c| c.as_str() == collection).count()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.handler_count()
    }

    fn query(&self, collection: &str, options: &ListOptions) -> Result<Vec<Value>> {
        {
            let mut fetches = self.fetches.lock().unwrap_or_else(|e| e.into_inner());
            fetches.push(collection.to_string());
        }
        {
            let failing = self.failing.lock().unwrap_or_else(|e| e.into_inner());
            if failing.contains(collection) {
                return Err(ScheduleError::fetch(collection, "service unavailable"));
            }
        }

        let terms = match &options.filter {
            Some(filter) => parse_filter(filter)
                .ok_or_else(|| ScheduleError::fetch(collection, format!("unsupported filter: {filter}")))?,
            None => Vec::new(),
        };

        let collections = self.collections.read().unwrap_or_else(|e| e.into_inner());
        let mut records: Vec<Value> = collections
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| terms.iter().all(|(field, value)| field_matches(record, field, value)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(sort) = &options.sort {
            sort_records(&mut records, sort);
        }
        Ok(records)
    }
}

fn field_text(record: &Value, field: &str) -> Option<String> {
    match record.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn field_matches(record: &Value, field: &str, expected: &str) -> bool {
    field_text(record, field).as_deref() == Some(expected)
}

/// Parses `a = "x" && b = "y"` into field/value pairs.
fn parse_filter(filter: &str) -> Option<Vec<(String, String)>> {
    filter
        .split("&&")
        .map(|term| {
            let (field, value) = term.split_once('=')?;
            let field = field.trim();
            let value = value.trim();
            if field.is_empty() || field.ends_with('!') || field.ends_with('>') || field.ends_with('<') {
                return None;
            }
            let inner = value.strip_prefix('"')?.strip_suffix('"')?;
            Some((field.to_string(), inner.replace("\\\"", "\"").replace("\\\\", "\\")))
        })
        .collect()
}

/// Sorts by comma-separated fields; a leading `-` sorts descending.
fn sort_records(records: &mut [Value], sort: &str) {
    let keys: Vec<(&str, bool)> = sort
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(|k| match k.strip_prefix('-') {
            Some(field) => (field, true),
            None => (k.strip_prefix('+').unwrap_or(k), false),
        })
        .collect();

    records.sort_by(|a, b| {
        keys.iter()
            .map(|(field, descending)| {
                let ordering = field_text(a, field).cmp(&field_text(b, field));
                if *descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            })
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}

#[async_trait]
impl CollectionService for InMemoryService {
    async fn get_full_list(&self, collection: &str, options: &ListOptions) -> Result<Vec<Value>> {
        self.query(collection, options)
    }

    async fn get_list(
        &self,
        collection: &str,
        page: u32,
        per_page: u32,
        options: &ListOptions,
    ) -> Result<RecordPage> {
        let records = self.query(collection, options)?;
        let per_page = per_page.max(1);
        let page = page.max(1);
        let total_items = records.len();
        let skip = (page as usize - 1) * per_page as usize;
        let items: Vec<Value> = records.into_iter().skip(skip).take(per_page as usize).collect();
        Ok(RecordPage {
            page,
            per_page,
            total_items: total_items as i64,
            total_pages: total_items.div_ceil(per_page as usize) as i64,
            items,
        })
    }

    async fn subscribe(
        &self,
        collection: &str,
        topic: &str,
        handler: ChangeHandler,
    ) -> Result<SubscriptionId> {
        Ok(self.subscriptions.add(topic_name(collection, topic), handler))
    }

    async fn unsubscribe(&self, collection: &str, topic: &str, id: SubscriptionId) -> Result<()> {
        if self.fail_unsubscribe.load(AtomicOrdering::SeqCst) {
            return Err(ScheduleError::Subscription(format!(
                "could not remove subscription on {collection}"
            )));
        }
        self.subscriptions.remove(&topic_name(collection, topic), id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_parser_reads_equality_terms() {
        let terms = parse_filter(r#"date = "2025-03-10" && teacher = "t\"1""#).unwrap();
        assert_eq!(
            terms,
            vec![
                ("date".to_string(), "2025-03-10".to_string()),
                ("teacher".to_string(), "t\"1".to_string())
            ]
        );
        assert!(parse_filter("date != \"x\"").is_none());
        assert!(parse_filter("date = x").is_none());
    }

    #[tokio::test]
    async fn list_filters_sorts_and_pages() {
        let service = InMemoryService::new();
        service.set_collection(
            "teacher",
            vec![
                json!({ "id": "3", "name": "Cy", "active": true }),
                json!({ "id": "1", "name": "Ann", "active": true }),
                json!({ "id": "2", "name": "Bo", "active": false }),
            ],
        );

        let all = service
            .get_full_list("teacher", &ListOptions::new().sort("name"))
            .await
            .unwrap();
        let names: Vec<&str> = all.iter().map(|r| r["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["Ann", "Bo", "Cy"]);

        let page = service
            .get_list(
                "teacher",
                2,
                1,
                &ListOptions::new().sort("-name").filter("active = \"true\""),
            )
            .await
            .unwrap();
        assert_eq!(page.total_items, 2);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.items[0]["name"], "Ann");
        assert_eq!(service.fetch_count("teacher"), 2);
    }

    #[tokio::test]
    async fn failing_collection_returns_fetch_error() {
        let service = InMemoryService::new();
        service.fail_collection("timeSlot");
        let err = service
            .get_full_list("timeSlot", &ListOptions::new())
            .await
            .unwrap_err();
        assert!(err.is_transient());

        service.recover("timeSlot");
        assert!(service.get_full_list("timeSlot", &ListOptions::new()).await.is_ok());
    }

    #[tokio::test]
    async fn loads_fixture_file() {
        let dir = std::env::temp_dir().join(format!("schedule-board-fixture-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("fixture.json");
        std::fs::write(&path, r#"{ "teacher": [ { "id": "t1", "name": "Ann" } ] }"#).unwrap();

        let service = InMemoryService::from_fixture(&path).unwrap();
        let teachers = service.get_full_list("teacher", &ListOptions::new()).await.unwrap();
        assert_eq!(teachers.len(), 1);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
