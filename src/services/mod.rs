//! Collaborators the workflows call through narrow interfaces.
//!
//! Each collaborator receives its configuration through its constructor. Calls
//! that leave the process, the database included, are bounded with
//! [`with_deadline`].

pub mod clock;
pub mod file_store;
pub mod notifier;

pub use clock::{Clock, FixedClock, SystemClock};
pub use file_store::{FileStore, LocalFileStore, UploadFile};
pub use notifier::{LogNotifier, Notifier};

use crate::errors::{Error, Result};
use std::{future::Future, time::Duration};

/// Runs `fut` with a ceiling of `limit`. Expiry is reported as
/// [`Error::Timeout`], never as a domain outcome.
pub async fn with_deadline<T, F>(operation: &str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, fut).await.map_err(|_| {
        tracing::warn!(operation, seconds = limit.as_secs(), "call timed out");
        Error::Timeout {
            operation: operation.to_string(),
            seconds: limit.as_secs(),
        }
    })?
}
