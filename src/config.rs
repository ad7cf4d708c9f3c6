use std::path::PathBuf;
use std::time::Duration;

use chrono::{Local, NaiveDate};

use crate::debounce::DEFAULT_WINDOW;
use crate::error::{Result, ScheduleError};
use crate::session::{SessionOptions, DEFAULT_PAGE_SIZE};

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8090";
pub const DEFAULT_PORT: u16 = 8080;

/// Where the board reads its records from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendSource {
    Remote(String),
    /// Offline mode over a JSON fixture file.
    Fixture(PathBuf),
}

/// Runtime settings resolved from the command line and environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend: BackendSource,
    pub debounce: Duration,
    pub page_size: u32,
    pub port: u16,
    pub start_date: Option<NaiveDate>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendSource::Remote(DEFAULT_BACKEND_URL.to_string()),
            debounce: DEFAULT_WINDOW,
            page_size: DEFAULT_PAGE_SIZE,
            port: DEFAULT_PORT,
            start_date: None,
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(ScheduleError::Config("page size must be at least 1".to_string()));
        }
        if let BackendSource::Remote(url) = &self.backend {
            if url.trim().is_empty() {
                return Err(ScheduleError::Config("backend URL is empty".to_string()));
            }
        }
        Ok(())
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            debounce: self.debounce,
            page_size: self.page_size,
            start_date: self.start_date.unwrap_or_else(|| Local::now().date_naive()),
        }
    }
}
