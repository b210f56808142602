use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, timeout_at};

use crate::error::{Result, UpdateError};

/// Point in time after which pipeline I/O for one add-on is abandoned.
#[derive(Clone, Copy, Debug)]
pub struct Deadline(Instant);

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self(Instant::now() + budget)
    }
}

/// Await `fut`, failing with `TimedOut` once the deadline passes.
pub async fn within<T, F>(deadline: Deadline, operation: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout_at(deadline.0, fut).await {
        Ok(result) => result,
        Err(_) => Err(UpdateError::TimedOut {
            operation: operation.to_owned(),
        }),
    }
}

/// Render a human-friendly byte count.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;

    let value = bytes as f64;
    if value < KIB {
        format!("{bytes} B")
    } else if value < MIB {
        format!("{:.1} KB", value / KIB)
    } else {
        format!("{:.1} MB", value / MIB)
    }
}
