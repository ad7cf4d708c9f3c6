pub mod types;
pub mod slot_utils;
pub mod merge;
pub mod grouping;
pub mod matrix;

pub use types::{
    AssignmentKey, AssignmentKind, CellRenderer, Column, ColumnSchema, GridCell, GridRow,
    MatrixRow, MergedAssignment, TeacherScheduleMatrix,
};
pub use slot_utils::timeslot_label;
pub use merge::{assignment_key, merge_assignments};
pub use grouping::{group_by_teacher, TeacherGroups};
pub use matrix::{build_columns, build_matrix};

use chrono::NaiveDate;

use crate::records::{Assignment, Teacher, Timeslot};

/// Runs the whole shaping pipeline: merge, group by teacher, project onto the roster.
pub fn assemble_matrix(
    date: NaiveDate,
    teachers: &[Teacher],
    timeslots: &[Timeslot],
    individual: Vec<Assignment>,
    group: Vec<Assignment>,
) -> TeacherScheduleMatrix {
    let merged = merge_assignments(individual, group);
    let groups = group_by_teacher(merged);
    build_matrix(date, teachers, timeslots, groups)
}
