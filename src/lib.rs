//! Teacher schedule board: loads a day's individual and group lessons from a
//! collection backend and shows them as a teacher by timeslot matrix.

pub mod backend;
pub mod cli;
pub mod config;
pub mod debounce;
pub mod display;
pub mod error;
pub mod logging;
pub mod records;
pub mod schedule;
pub mod session;
pub mod web;
pub mod widget;

pub use error::{Result, ScheduleError};
pub use session::{LoadOutcome, RenderOutcome, ScheduleSession, SessionOptions};
