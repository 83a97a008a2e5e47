//! BrainQuiz API client
//!
//! Client library for the BrainQuiz quiz/learning-management backend.
//!
//! # Features
//!
//! - **Bounded dispatch**: at most N requests (default 3) in flight, FIFO
//!   admission, delayed re-drain after each settlement
//! - **TTL read cache**: successful GET envelopes are reused for 5 minutes;
//!   writes invalidate the reads of the resource they touch
//! - **Typed API**: categories, grade levels, education tracks, classes,
//!   quizzes, questions, results, audit logs
//! - **Audit export**: CSV export of audit-log pages

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod export;
pub mod fetch;
pub mod models;
pub mod transport;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    let installed = match format {
        Some("json") => subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        Some("text") | None => subscriber
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
        Some(other) => {
            return Err(Error::Config(format!(
                "Unknown log format '{other}' (expected text or json)"
            )));
        }
    };
    installed.map_err(|e| Error::Internal(format!("Failed to install tracing subscriber: {e}")))
}
