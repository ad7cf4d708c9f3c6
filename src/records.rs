//! Record shapes delivered by the collection service and their conversion
//! into typed assignments.
//!
//! Expanded references are resolved leniently: a missing, null or malformed
//! expansion member becomes `None` instead of failing the whole page.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Identifier of a record in the collection service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A bookable period of the day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeslot {
    pub id: RecordId,
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub end: String,
}

/// A member of the teacher roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teacher {
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
}

/// Student, subject or room reference with its display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
}

/// Raw `lessonSchedule` record with its expansions.
#[derive(Debug, Clone, Deserialize)]
pub struct IndividualLessonRecord {
    pub id: RecordId,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub expand: IndividualExpand,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndividualExpand {
    #[serde(default, deserialize_with = "lenient")]
    pub teacher: Option<Teacher>,
    #[serde(default, deserialize_with = "lenient")]
    pub student: Option<NamedRef>,
    #[serde(default, deserialize_with = "lenient")]
    pub subject: Option<NamedRef>,
    #[serde(default, deserialize_with = "lenient")]
    pub room: Option<NamedRef>,
    #[serde(default, deserialize_with = "lenient")]
    pub timeslot: Option<Timeslot>,
}

/// Raw `groupLessonSchedule` record with its expansions.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupLessonRecord {
    pub id: RecordId,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub expand: GroupExpand,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupExpand {
    #[serde(default, deserialize_with = "lenient")]
    pub teacher: Option<Teacher>,
    /// Only a list expansion yields students; a single object or null is treated as empty.
    #[serde(default, deserialize_with = "lenient_list")]
    pub student: Vec<NamedRef>,
    #[serde(default, deserialize_with = "lenient")]
    pub subject: Option<NamedRef>,
    #[serde(default, deserialize_with = "lenient")]
    pub grouproom: Option<NamedRef>,
    #[serde(default, deserialize_with = "lenient")]
    pub timeslot: Option<Timeslot>,
}

/// One student's lesson.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndividualLesson {
    pub id: RecordId,
    pub date: String,
    pub teacher: Option<Teacher>,
    pub student: Option<NamedRef>,
    pub subject: Option<NamedRef>,
    pub room: Option<NamedRef>,
    pub timeslot: Option<Timeslot>,
}

/// A lesson shared by several students.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupLesson {
    pub id: RecordId,
    pub date: String,
    pub teacher: Option<Teacher>,
    /// Sorted by name, then id.
    pub students: Vec<NamedRef>,
    pub subject: Option<NamedRef>,
    pub room: Option<NamedRef>,
    pub timeslot: Option<Timeslot>,
}

/// A lesson assignment of either kind, validated at the ingestion boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    Individual(IndividualLesson),
    Group(GroupLesson),
}

impl IndividualLessonRecord {
    pub fn into_assignment(self) -> Assignment {
        let expand = self.expand;
        Assignment::Individual(IndividualLesson {
            id: self.id,
            date: self.date,
            teacher: expand.teacher,
            student: expand.student,
            subject: expand.subject,
            room: expand.room,
            timeslot: expand.timeslot,
        })
    }
}

impl GroupLessonRecord {
    pub fn into_assignment(self) -> Assignment {
        let expand = self.expand;
        let mut students = expand.student;
        students.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Assignment::Group(GroupLesson {
            id: self.id,
            date: self.date,
            teacher: expand.teacher,
            students,
            subject: expand.subject,
            room: expand.grouproom,
            timeslot: expand.timeslot,
        })
    }
}

/// Decodes a page of raw records, converting each into an [`Assignment`].
pub fn individual_assignments(items: Vec<Value>) -> serde_json::Result<Vec<Assignment>> {
    items
        .into_iter()
        .map(|item| serde_json::from_value::<IndividualLessonRecord>(item).map(IndividualLessonRecord::into_assignment))
        .collect()
}

pub fn group_assignments(items: Vec<Value>) -> serde_json::Result<Vec<Assignment>> {
    items
        .into_iter()
        .map(|item| serde_json::from_value::<GroupLessonRecord>(item).map(GroupLessonRecord::into_assignment))
        .collect()
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}
