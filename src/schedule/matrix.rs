use chrono::NaiveDate;

use crate::records::{Teacher, Timeslot};

use super::grouping::TeacherGroups;
use super::slot_utils::timeslot_label;
use super::types::{CellRenderer, Column, ColumnSchema, MatrixRow, TeacherScheduleMatrix};

/// Builds the column schema: the teacher column, then one column per timeslot.
pub fn build_columns(timeslots: &[Timeslot]) -> ColumnSchema {
    let mut columns = Vec::with_capacity(timeslots.len() + 1);
    columns.push(Column {
        label: "Teacher".to_string(),
        renderer: CellRenderer::TeacherName,
    });
    columns.extend(timeslots.iter().map(|t| Column {
        label: timeslot_label(t),
        renderer: CellRenderer::Assignments(t.id.clone()),
    }));
    ColumnSchema { columns }
}

/// Projects grouped assignments onto the roster.
///
/// Every roster teacher gets exactly one row, in roster order, with one cell
/// per timeslot. Whatever cannot be placed (no teacher, a teacher missing
/// from the roster, or a timeslot that is not cached) ends up in
/// `unassigned`, after the assignments that had no teacher at all.
pub fn build_matrix(
    date: NaiveDate,
    teachers: &[Teacher],
    timeslots: &[Timeslot],
    groups: TeacherGroups,
) -> TeacherScheduleMatrix {
    let TeacherGroups {
        mut by_teacher,
        mut unassigned,
    } = groups;

    let rows = teachers
        .iter()
        .map(|teacher| {
            let mut slots = by_teacher.remove(&teacher.id).unwrap_or_default();
            let cells = timeslots.iter().map(|t| slots.take_slot(&t.id)).collect();
            unassigned.extend(slots.into_leftovers());
            MatrixRow {
                teacher: teacher.clone(),
                cells,
            }
        })
        .collect();

    unassigned.extend(by_teacher.into_values().flat_map(|slots| slots.into_leftovers()));

    TeacherScheduleMatrix {
        date,
        rows,
        unassigned,
    }
}
