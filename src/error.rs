//! Error types for the schedule board.

use thiserror::Error;

/// Errors that can occur while loading or presenting the schedule board.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScheduleError {
    /// The collection service could not be reached or answered with an error.
    #[error("fetch from '{collection}' failed: {message}")]
    Fetch {
        /// Collection the request was addressed to.
        collection: String,
        /// Transport or server message.
        message: String,
    },

    /// A response body did not have the expected shape.
    #[error("could not decode response: {0}")]
    Decode(String),

    /// Registering or removing a realtime subscription failed.
    #[error("subscription error: {0}")]
    Subscription(String),

    /// Invalid runtime configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error while reading fixtures or writing exports.
    #[error("I/O error: {0}")]
    Io(String),

    /// CSV export failed.
    #[error("CSV error: {0}")]
    Csv(String),
}

impl ScheduleError {
    pub fn fetch(collection: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            collection: collection.into(),
            message: message.into(),
        }
    }

    /// Returns whether a later reload may succeed where this one failed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Subscription(_))
    }

    /// Short message suitable for a non-blocking notice next to the board.
    #[must_use]
    pub fn user_message(&self) -> &str {
        match self {
            Self::Fetch { .. } => "Could not refresh the schedule. Showing the last loaded data.",
            Self::Decode(_) => "The server sent data the schedule could not read.",
            Self::Subscription(_) => "Live updates are unavailable right now.",
            Self::Config(_) => "The schedule board is misconfigured.",
            Self::Io(_) | Self::Csv(_) => "Could not write the schedule export.",
        }
    }
}

impl From<reqwest::Error> for ScheduleError {
    fn from(err: reqwest::Error) -> Self {
        let collection = err
            .url()
            .map(|url| url.path().to_string())
            .unwrap_or_default();
        Self::fetch(collection, err.to_string())
    }
}

impl From<serde_json::Error> for ScheduleError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<std::io::Error> for ScheduleError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<csv::Error> for ScheduleError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScheduleError>;
