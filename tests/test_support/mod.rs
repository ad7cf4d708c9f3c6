#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};
use tokio::sync::Notify;

use schedule_board::backend::{
    ChangeHandler, CollectionService, InMemoryService, ListOptions, RecordPage, SubscriptionId,
    GROUP_LESSON_COLLECTION, LESSON_COLLECTION, TEACHER_COLLECTION, TIMESLOT_COLLECTION,
};
use schedule_board::schedule::ColumnSchema;
use schedule_board::session::{ScheduleSession, SessionOptions};
use schedule_board::widget::{GridConfig, GridData, ScheduleWidget, WidgetHost};

pub const WINDOW: Duration = Duration::from_millis(250);

pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 10).expect("valid date")
}

pub fn timeslot(id: &str, start: &str, end: &str) -> Value {
    json!({ "id": id, "start": start, "end": end })
}

pub fn teacher(id: &str, name: &str) -> Value {
    json!({ "id": id, "name": name })
}

pub fn named(id: &str, name: &str) -> Value {
    json!({ "id": id, "name": name })
}

/// An expanded `lessonSchedule` record.
pub fn lesson(id: &str, date: NaiveDate, teacher: Value, student: Value, subject: Value, room: Value, slot: Value) -> Value {
    json!({
        "id": id,
        "date": date.format("%Y-%m-%d").to_string(),
        "expand": {
            "teacher": teacher,
            "student": student,
            "subject": subject,
            "room": room,
            "timeslot": slot
        }
    })
}

/// An expanded `groupLessonSchedule` record.
pub fn group_lesson(id: &str, date: NaiveDate, teacher: Value, students: Vec<Value>, subject: Value, room: Value, slot: Value) -> Value {
    json!({
        "id": id,
        "date": date.format("%Y-%m-%d").to_string(),
        "expand": {
            "teacher": teacher,
            "student": students,
            "subject": subject,
            "grouproom": room,
            "timeslot": slot
        }
    })
}

/// Teachers Alice (a) and Bert (b), timeslots 09:00 and 10:00.
pub fn seeded_service() -> Arc<InMemoryService> {
    let service = InMemoryService::new();
    service.set_collection(
        TIMESLOT_COLLECTION,
        vec![timeslot("ts2", "10:00", "11:00"), timeslot("ts1", "09:00", "10:00")],
    );
    service.set_collection(TEACHER_COLLECTION, vec![teacher("a", "Alice"), teacher("b", "Bert")]);
    service.set_collection(LESSON_COLLECTION, Vec::new());
    service.set_collection(GROUP_LESSON_COLLECTION, Vec::new());
    Arc::new(service)
}

pub fn math_lesson(id: &str, date: NaiveDate, room: &str) -> Value {
    lesson(
        id,
        date,
        teacher("a", "Alice"),
        named("s1", "Sam"),
        named("math", "Math"),
        named(room, room),
        timeslot("ts1", "09:00", "10:00"),
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetEvent {
    Mounted { columns: ColumnSchema, data: GridData },
    Updated(GridData),
    Rendered,
    Notice(String),
    Destroyed,
}

/// Widget host that records every call made on its widgets.
#[derive(Clone, Default)]
pub struct RecordingHost {
    events: Arc<Mutex<Vec<WidgetEvent>>>,
}

impl RecordingHost {
    pub fn events(&self) -> Vec<WidgetEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn mount_count(&self) -> usize {
        self.count(|e| matches!(e, WidgetEvent::Mounted { .. }))
    }

    pub fn destroy_count(&self) -> usize {
        self.count(|e| matches!(e, WidgetEvent::Destroyed))
    }

    pub fn notices(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                WidgetEvent::Notice(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    /// The data the widget currently shows.
    pub fn shown(&self) -> Option<GridData> {
        self.events().into_iter().rev().find_map(|e| match e {
            WidgetEvent::Mounted { data, .. } | WidgetEvent::Updated(data) => Some(data),
            _ => None,
        })
    }

    fn count(&self, pred: impl Fn(&WidgetEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| pred(e)).count()
    }
}

impl WidgetHost for RecordingHost {
    fn mount(&self, config: GridConfig) -> Box<dyn ScheduleWidget> {
        self.events.lock().unwrap().push(WidgetEvent::Mounted {
            columns: config.columns,
            data: config.data,
        });
        Box::new(RecordingWidget {
            events: Arc::clone(&self.events),
        })
    }
}

struct RecordingWidget {
    events: Arc<Mutex<Vec<WidgetEvent>>>,
}

impl ScheduleWidget for RecordingWidget {
    fn update_config(&mut self, data: GridData) {
        self.events.lock().unwrap().push(WidgetEvent::Updated(data));
    }

    fn force_render(&mut self) {
        self.events.lock().unwrap().push(WidgetEvent::Rendered);
    }

    fn destroy(&mut self) {
        self.events.lock().unwrap().push(WidgetEvent::Destroyed);
    }

    fn notice(&mut self, message: &str) {
        self.events.lock().unwrap().push(WidgetEvent::Notice(message.to_string()));
    }
}

pub fn session(service: &Arc<InMemoryService>, host: &RecordingHost) -> Arc<ScheduleSession> {
    session_over(Arc::clone(service) as _, host)
}

pub fn session_over(service: Arc<dyn CollectionService>, host: &RecordingHost) -> Arc<ScheduleSession> {
    ScheduleSession::new(
        service,
        Arc::new(host.clone()),
        SessionOptions {
            debounce: WINDOW,
            page_size: 200,
            start_date: day(),
        },
    )
}

/// Lets pending debounce windows expire and the resulting loads finish.
pub async fn settle() {
    tokio::time::sleep(WINDOW * 4).await;
}

/// Holds back the next `lessonSchedule` page request until released.
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

/// Wraps an [`InMemoryService`]; while a gate is armed, the next lesson page
/// request waits on it.
pub struct GatedService {
    inner: Arc<InMemoryService>,
    armed: Mutex<Option<Arc<Gate>>>,
}

impl GatedService {
    pub fn new(inner: Arc<InMemoryService>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            armed: Mutex::new(None),
        })
    }

    pub fn arm(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate {
            entered: Notify::new(),
            release: Notify::new(),
        });
        *self.armed.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }
}

#[async_trait]
impl CollectionService for GatedService {
    async fn get_full_list(&self, collection: &str, options: &ListOptions) -> schedule_board::Result<Vec<Value>> {
        self.inner.get_full_list(collection, options).await
    }

    async fn get_list(
        &self,
        collection: &str,
        page: u32,
        per_page: u32,
        options: &ListOptions,
    ) -> schedule_board::Result<RecordPage> {
        let gate = if collection == LESSON_COLLECTION {
            self.armed.lock().unwrap().take()
        } else {
            None
        };
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        self.inner.get_list(collection, page, per_page, options).await
    }

    async fn subscribe(
        &self,
        collection: &str,
        topic: &str,
        handler: ChangeHandler,
    ) -> schedule_board::Result<SubscriptionId> {
        self.inner.subscribe(collection, topic, handler).await
    }

    async fn unsubscribe(&self, collection: &str, topic: &str, id: SubscriptionId) -> schedule_board::Result<()> {
        self.inner.unsubscribe(collection, topic, id).await
    }
}
