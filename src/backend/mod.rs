//! The remote collection service the board reads from.
//!
//! [`CollectionService`] is the seam: [`PocketBaseClient`] talks to a real
//! backend over HTTP and Server-Sent Events, [`InMemoryService`] serves
//! fixture data in-process.

pub mod memory;
pub mod pocketbase;
pub mod realtime;
pub mod subscriptions;

pub use memory::InMemoryService;
pub use pocketbase::PocketBaseClient;
pub use subscriptions::{ChangeHandler, RecordEvent, SubscriptionId, SubscriptionRegistry};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

pub const TIMESLOT_COLLECTION: &str = "timeSlot";
pub const TEACHER_COLLECTION: &str = "teacher";
pub const LESSON_COLLECTION: &str = "lessonSchedule";
pub const GROUP_LESSON_COLLECTION: &str = "groupLessonSchedule";

/// Subscription topic covering every record event of a collection.
pub const ALL_RECORDS: &str = "*";

/// Query options shared by the list calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub sort: Option<String>,
    pub filter: Option<String>,
    pub expand: Option<String>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    #[must_use]
    pub fn expand(mut self, expand: impl Into<String>) -> Self {
        self.expand = Some(expand.into());
        self
    }
}

/// One page of a list query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPage {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub per_page: u32,
    #[serde(default)]
    pub total_items: i64,
    #[serde(default)]
    pub total_pages: i64,
    #[serde(default)]
    pub items: Vec<Value>,
}

/// Filter expressions understood by the collection service.
pub mod filter {
    use super::NaiveDate;

    /// Quotes a string literal for a filter expression.
    pub fn quote(value: &str) -> String {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    }

    /// `field = "value"`
    pub fn field_equals(field: &str, value: &str) -> String {
        format!("{} = {}", field, quote(value))
    }

    /// `date = "YYYY-MM-DD"`
    pub fn date_equals(date: NaiveDate) -> String {
        field_equals("date", &date.format("%Y-%m-%d").to_string())
    }
}

/// Query and realtime surface of the collection service.
#[async_trait]
pub trait CollectionService: Send + Sync {
    /// Fetches every record of a collection matching `options`.
    async fn get_full_list(&self, collection: &str, options: &ListOptions) -> Result<Vec<Value>>;

    /// Fetches one page of records. `page` is 1-based.
    async fn get_list(
        &self,
        collection: &str,
        page: u32,
        per_page: u32,
        options: &ListOptions,
    ) -> Result<RecordPage>;

    /// Registers `handler` for record events on `collection`/`topic`.
    async fn subscribe(
        &self,
        collection: &str,
        topic: &str,
        handler: ChangeHandler,
    ) -> Result<SubscriptionId>;

    /// Removes a handler registered with [`CollectionService::subscribe`].
    async fn unsubscribe(&self, collection: &str, topic: &str, id: SubscriptionId) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_filter_uses_iso_date() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        assert_eq!(filter::date_equals(date), "date = \"2025-03-09\"");
    }

    #[test]
    fn quotes_are_escaped() {
        assert_eq!(filter::field_equals("name", "a\"b"), "name = \"a\\\"b\"");
    }

    #[test]
    fn record_page_reads_camel_case() {
        let page: RecordPage = serde_json::from_str(
            r#"{"page":1,"perPage":200,"totalItems":2,"totalPages":1,"items":[{"id":"a"},{"id":"b"}]}"#,
        )
        .unwrap();
        assert_eq!(page.per_page, 200);
        assert_eq!(page.items.len(), 2);
    }
}
