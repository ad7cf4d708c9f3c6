//! The rendering widget seam.
//!
//! A [`WidgetHost`] constructs and mounts a widget from a full
//! [`GridConfig`]; afterwards the session only pushes new data into the live
//! widget. Widgets receive already-shaped rows and never see backend records.

use std::io::{self, Write};

use chrono::NaiveDate;

use crate::display::{cell_search_text, format_board};
use crate::schedule::{ColumnSchema, GridCell, GridRow, MergedAssignment, TeacherScheduleMatrix};

/// Search support over the displayable text of each cell.
#[derive(Debug, Clone, Copy)]
pub struct SearchConfig {
    pub enabled: bool,
    pub selector: fn(&GridCell) -> String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            selector: cell_search_text,
        }
    }
}

/// Row data pushed into a widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridData {
    pub date: NaiveDate,
    pub rows: Vec<GridRow>,
    pub unassigned: Vec<MergedAssignment>,
}

impl From<&TeacherScheduleMatrix> for GridData {
    fn from(matrix: &TeacherScheduleMatrix) -> Self {
        Self {
            date: matrix.date,
            rows: matrix.grid_rows(),
            unassigned: matrix.unassigned.clone(),
        }
    }
}

/// Everything needed to construct a widget.
#[derive(Debug, Clone)]
pub struct GridConfig {
    pub columns: ColumnSchema,
    pub data: GridData,
    pub search: SearchConfig,
}

/// A live rendering of the board.
pub trait ScheduleWidget: Send {
    /// Replaces the row data; the column schema is unchanged.
    fn update_config(&mut self, data: GridData);

    /// Repaints with the current data.
    fn force_render(&mut self);

    /// Releases the widget. No further calls follow.
    fn destroy(&mut self);

    /// Shows a non-blocking message next to the board.
    fn notice(&mut self, message: &str) {
        tracing::info!("{message}");
    }
}

/// Constructs and mounts widgets.
pub trait WidgetHost: Send + Sync {
    fn mount(&self, config: GridConfig) -> Box<dyn ScheduleWidget>;
}

/// Prints the board as a table every time it renders.
pub struct TerminalHost {
    make_writer: fn() -> Box<dyn Write + Send>,
}

impl TerminalHost {
    pub fn stdout() -> Self {
        Self {
            make_writer: stdout_writer,
        }
    }
}

fn stdout_writer() -> Box<dyn Write + Send> {
    Box::new(io::stdout())
}

impl WidgetHost for TerminalHost {
    fn mount(&self, config: GridConfig) -> Box<dyn ScheduleWidget> {
        let mut widget = TerminalWidget {
            columns: config.columns,
            data: config.data,
            out: (self.make_writer)(),
        };
        widget.force_render();
        Box::new(widget)
    }
}

pub struct TerminalWidget {
    columns: ColumnSchema,
    data: GridData,
    out: Box<dyn Write + Send>,
}

impl TerminalWidget {
    pub fn new(columns: ColumnSchema, data: GridData, out: Box<dyn Write + Send>) -> Self {
        Self { columns, data, out }
    }
}

impl ScheduleWidget for TerminalWidget {
    fn update_config(&mut self, data: GridData) {
        self.data = data;
    }

    fn force_render(&mut self) {
        let text = format_board(
            &self.columns,
            self.data.date,
            &self.data.rows,
            &self.data.unassigned,
        );
        if let Err(e) = writeln!(self.out, "{text}").and_then(|()| self.out.flush()) {
            tracing::warn!("could not print schedule: {e}");
        }
    }

    fn destroy(&mut self) {
        if let Err(e) = self.out.flush() {
            tracing::warn!("could not flush schedule output: {e}");
        }
    }

    fn notice(&mut self, message: &str) {
        if let Err(e) = writeln!(self.out, "! {message}").and_then(|()| self.out.flush()) {
            tracing::warn!("could not print notice: {e}");
        }
    }
}
