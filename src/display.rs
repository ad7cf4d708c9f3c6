//! Pure presentation of the schedule matrix: cell badges, search text, and
//! text/CSV renderings.

use std::path::Path;

use chrono::NaiveDate;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use csv::WriterBuilder;
use serde::Serialize;

use crate::error::Result;
use crate::records::NamedRef;
use crate::schedule::{AssignmentKind, ColumnSchema, GridCell, GridRow, MergedAssignment, TeacherScheduleMatrix};

/// Shown instead of a blank cell when a teacher has nothing in a timeslot.
pub const EMPTY_CELL: &str = "—";

/// Shown when an expanded reference did not resolve.
pub const UNKNOWN_NAME: &str = "unknown";

pub const GROUP_CLASS: &str = "Group Class";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeKind {
    Subject,
    GroupMarker,
    Student,
    Room,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub kind: BadgeKind,
    pub text: String,
}

/// Badges for one assignment, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryView {
    pub badges: Vec<Badge>,
}

/// Displayable content of a timeslot cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "entries", rename_all = "snake_case")]
pub enum CellView {
    Empty,
    Entries(Vec<EntryView>),
}

fn name_or_unknown(reference: Option<&NamedRef>) -> String {
    match reference {
        Some(r) if !r.name.trim().is_empty() => r.name.clone(),
        _ => UNKNOWN_NAME.to_string(),
    }
}

fn badge(kind: BadgeKind, text: impl Into<String>) -> Badge {
    Badge {
        kind,
        text: text.into(),
    }
}

fn format_entry(assignment: &MergedAssignment) -> EntryView {
    let mut badges = vec![badge(BadgeKind::Subject, name_or_unknown(assignment.subject.as_ref()))];
    match &assignment.kind {
        AssignmentKind::Group { students, .. } => {
            badges.push(badge(BadgeKind::GroupMarker, GROUP_CLASS));
            badges.extend(
                students
                    .iter()
                    .map(|s| badge(BadgeKind::Student, name_or_unknown(Some(s)))),
            );
        }
        AssignmentKind::Individual { student } => {
            badges.push(badge(BadgeKind::Student, name_or_unknown(student.as_ref())));
        }
    }
    badges.push(badge(BadgeKind::Room, name_or_unknown(assignment.room.as_ref())));
    EntryView { badges }
}

/// Formats a timeslot cell.
pub fn format_cell(assignments: &[MergedAssignment]) -> CellView {
    if assignments.is_empty() {
        CellView::Empty
    } else {
        CellView::Entries(assignments.iter().map(format_entry).collect())
    }
}

/// Multi-line text of a cell: one badge per line, blank line between entries.
pub fn render_cell_text(view: &CellView) -> String {
    match view {
        CellView::Empty => EMPTY_CELL.to_string(),
        CellView::Entries(entries) => entries
            .iter()
            .map(|entry| {
                entry
                    .badges
                    .iter()
                    .map(|b| b.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .collect::<Vec<_>>()
            .join("\n\n"),
    }
}

/// Single-line text of a cell, for CSV and log output.
pub fn render_cell_inline(view: &CellView) -> String {
    match view {
        CellView::Empty => EMPTY_CELL.to_string(),
        CellView::Entries(entries) => entries
            .iter()
            .map(|entry| {
                entry
                    .badges
                    .iter()
                    .map(|b| b.text.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .collect::<Vec<_>>()
            .join(" | "),
    }
}

/// Text a search query is matched against.
pub fn cell_search_text(cell: &GridCell) -> String {
    match cell {
        GridCell::Teacher { value, .. } => value.clone(),
        GridCell::Assignments(assignments) => match format_cell(assignments) {
            CellView::Empty => String::new(),
            view => render_cell_inline(&view),
        },
    }
}

/// Displayable text of any grid cell.
pub fn render_grid_cell(cell: &GridCell) -> String {
    match cell {
        GridCell::Teacher { value, .. } => value.clone(),
        GridCell::Assignments(assignments) => render_cell_text(&format_cell(assignments)),
    }
}

/// Whether a row has a cell whose search text contains `query`, ignoring case.
pub fn row_matches(row: &GridRow, query: &str, selector: fn(&GridCell) -> String) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    row.iter()
        .any(|cell| selector(cell).to_lowercase().contains(&needle))
}

/// Builds a printable table of the board.
pub fn render_table(columns: &ColumnSchema, rows: &[GridRow]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(columns.labels());
    for row in rows {
        table.add_row(row.iter().map(render_grid_cell).collect::<Vec<_>>());
    }
    table
}

fn describe_unassigned(assignment: &MergedAssignment) -> String {
    let slot = assignment
        .timeslot
        .as_ref()
        .map(crate::schedule::timeslot_label)
        .unwrap_or_else(|| UNKNOWN_NAME.to_string());
    let teacher = assignment
        .teacher
        .as_ref()
        .map(|t| t.name.clone())
        .unwrap_or_else(|| "no teacher".to_string());
    format!(
        "{} ({}, {})",
        render_cell_inline(&format_cell(std::slice::from_ref(assignment))),
        teacher,
        slot
    )
}

/// Text rendering of a board: heading, table, and any lessons that could not be placed.
pub fn format_board(
    columns: &ColumnSchema,
    date: NaiveDate,
    rows: &[GridRow],
    unassigned: &[MergedAssignment],
) -> String {
    let placed: usize = rows
        .iter()
        .flat_map(|row| row.iter())
        .map(|cell| match cell {
            GridCell::Assignments(a) => a.len(),
            GridCell::Teacher { .. } => 0,
        })
        .sum();

    let mut out = format!(
        "=== Teacher Schedule for {} ({}) ===\n",
        date.format("%Y-%m-%d"),
        date.format("%A")
    );
    out.push_str(&format!("Teachers: {}, lessons placed: {}\n", rows.len(), placed));
    out.push_str(&render_table(columns, rows).to_string());
    out.push('\n');

    if !unassigned.is_empty() {
        out.push_str(&format!("⚠️  Unplaced lessons ({}):\n", unassigned.len()));
        for assignment in unassigned {
            out.push_str(&format!("  - {}\n", describe_unassigned(assignment)));
        }
    }
    out
}

/// Full text report of a day's matrix.
pub fn format_day_report(columns: &ColumnSchema, matrix: &TeacherScheduleMatrix) -> String {
    format_board(columns, matrix.date, &matrix.grid_rows(), &matrix.unassigned)
}

/// Writes the board as CSV: one header row of column labels, one row per teacher.
pub fn write_matrix_csv(
    path: &Path,
    columns: &ColumnSchema,
    matrix: &TeacherScheduleMatrix,
) -> Result<()> {
    let mut wtr = WriterBuilder::new().has_headers(false).from_path(path)?;
    wtr.write_record(columns.labels())?;
    for row in &matrix.rows {
        let mut record = vec![row.teacher.name.clone()];
        record.extend(row.cells.iter().map(|cell| render_cell_inline(&format_cell(cell))));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}
