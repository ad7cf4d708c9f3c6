use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use serde_json::Value;

/// A record change delivered by the realtime feed. Handlers only use it as a
/// signal; the record payload is informational.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecordEvent {
    #[serde(default)]
    pub collection: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub record: Value,
}

pub type ChangeHandler = Arc<dyn Fn(RecordEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Full topic name as the realtime feed spells it: `collection/topic`.
pub fn topic_name(collection: &str, topic: &str) -> String {
    format!("{}/{}", collection, topic)
}

/// Handlers keyed by topic.
#[derive(Default)]
pub struct SubscriptionRegistry {
    next_id: AtomicU64,
    topics: Mutex<BTreeMap<String, Vec<(SubscriptionId, ChangeHandler)>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, topic: String, handler: ChangeHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        topics.entry(topic).or_default().push((id, handler));
        id
    }

    /// Removes a handler. Returns false if it was not registered under `topic`.
    pub fn remove(&self, topic: &str, id: SubscriptionId) -> bool {
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        let Some(handlers) = topics.get_mut(topic) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            topics.remove(topic);
        }
        removed
    }

    /// Topics with at least one handler, sorted.
    pub fn topics(&self) -> Vec<String> {
        let topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        topics.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        let topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        topics.is_empty()
    }

    pub fn handler_count(&self) -> usize {
        let topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        topics.values().map(Vec::len).sum()
    }

    /// Calls every handler registered for `topic`. Returns how many ran.
    pub fn dispatch(&self, topic: &str, event: &RecordEvent) -> usize {
        // Handlers run outside the lock so they may subscribe or unsubscribe.
        let handlers: Vec<ChangeHandler> = {
            let topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
            topics
                .get(topic)
                .map(|hs| hs.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default()
        };
        for handler in &handlers {
            handler(event.clone());
        }
        handlers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_handler(counter: &Arc<AtomicUsize>) -> ChangeHandler {
        let counter = Arc::clone(counter);
        Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn event() -> RecordEvent {
        RecordEvent {
            collection: "lessonSchedule".to_string(),
            action: "create".to_string(),
            record: Value::Null,
        }
    }

    #[test]
    fn dispatch_reaches_only_matching_topic() {
        let registry = SubscriptionRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        registry.add(topic_name("lessonSchedule", "*"), counting_handler(&hits));
        registry.add(topic_name("groupLessonSchedule", "*"), counting_handler(&hits));

        assert_eq!(registry.dispatch("lessonSchedule/*", &event()), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(registry.topics().len(), 2);
    }

    #[test]
    fn removing_last_handler_drops_topic() {
        let registry = SubscriptionRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let id = registry.add("lessonSchedule/*".to_string(), counting_handler(&hits));

        assert!(registry.remove("lessonSchedule/*", id));
        assert!(!registry.remove("lessonSchedule/*", id));
        assert!(registry.is_empty());
        assert_eq!(registry.dispatch("lessonSchedule/*", &event()), 0);
    }
}
