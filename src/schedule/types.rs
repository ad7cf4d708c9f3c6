use chrono::NaiveDate;
use serde::Serialize;

use crate::records::{NamedRef, RecordId, Teacher, Timeslot};

/// Who attends a merged assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssignmentKind {
    Individual { student: Option<NamedRef> },
    Group { group_id: RecordId, students: Vec<NamedRef> },
}

/// Normalized view of an individual or group lesson for one load cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedAssignment {
    pub subject: Option<NamedRef>,
    pub teacher: Option<Teacher>,
    pub timeslot: Option<Timeslot>,
    pub room: Option<NamedRef>,
    #[serde(flatten)]
    pub kind: AssignmentKind,
}

impl MergedAssignment {
    pub fn is_group(&self) -> bool {
        matches!(self.kind, AssignmentKind::Group { .. })
    }

    pub fn teacher_id(&self) -> Option<&RecordId> {
        self.teacher.as_ref().map(|t| &t.id)
    }

    pub fn timeslot_id(&self) -> Option<&RecordId> {
        self.timeslot.as_ref().map(|t| &t.id)
    }
}

/// Uniqueness key of a merged assignment.
///
/// Individual and group keys never compare equal, so a group lesson and an
/// individual lesson in the same slot are always kept apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AssignmentKey {
    Individual {
        student: Option<RecordId>,
        subject: Option<RecordId>,
        timeslot: Option<RecordId>,
    },
    Group {
        record: RecordId,
        subject: Option<RecordId>,
        timeslot: Option<RecordId>,
    },
}

/// How a column's cells are rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "renderer", content = "timeslot", rename_all = "snake_case")]
pub enum CellRenderer {
    TeacherName,
    Assignments(RecordId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub label: String,
    #[serde(flatten)]
    pub renderer: CellRenderer,
}

/// Ordered column list: the teacher name column followed by one column per timeslot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ColumnSchema {
    pub columns: Vec<Column>,
}

impl ColumnSchema {
    pub fn labels(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.label.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// One teacher's day: a cell per timeslot, in timeslot order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatrixRow {
    pub teacher: Teacher,
    pub cells: Vec<Vec<MergedAssignment>>,
}

/// Teacher-by-timeslot grid for one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeacherScheduleMatrix {
    pub date: NaiveDate,
    pub rows: Vec<MatrixRow>,
    /// Assignments that could not be placed in any cell.
    pub unassigned: Vec<MergedAssignment>,
}

/// A value in the widget's row-major data set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum GridCell {
    Teacher { label: String, value: String },
    Assignments(Vec<MergedAssignment>),
}

pub type GridRow = Vec<GridCell>;

impl TeacherScheduleMatrix {
    /// Projects the matrix into widget rows: teacher name first, then the cells.
    pub fn grid_rows(&self) -> Vec<GridRow> {
        self.rows
            .iter()
            .map(|row| {
                let mut cells = Vec::with_capacity(row.cells.len() + 1);
                cells.push(GridCell::Teacher {
                    label: "Teacher".to_string(),
                    value: row.teacher.name.clone(),
                });
                cells.extend(row.cells.iter().cloned().map(GridCell::Assignments));
                cells
            })
            .collect()
    }

    pub fn assignment_count(&self) -> usize {
        self.rows
            .iter()
            .flat_map(|row| row.cells.iter())
            .map(Vec::len)
            .sum()
    }
}
