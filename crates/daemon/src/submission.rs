//! Newline-delimited JSON submissions read from stdin

use anyhow::{Context, Result};
use deferq_core::domain::OfflineRequest;
use deferq_core::OfflineQueue;
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

/// One input line: `{"request": {...}, "correlation_id": "..."}`
#[derive(Debug, Deserialize)]
pub struct Submission {
    pub request: OfflineRequest,
    #[serde(default)]
    pub correlation_id: Option<String>,
}

pub fn parse_line(line: &str) -> Result<Submission> {
    serde_json::from_str(line).context("Submission is not valid JSON")
}

/// Enqueue every line until EOF; bad lines are logged and skipped
///
/// Returns the number of operations enqueued.
pub async fn pump<R>(reader: R, queue: &OfflineQueue) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut accepted = 0;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let submission = match parse_line(line) {
            Ok(submission) => submission,
            Err(e) => {
                warn!(error = %e, "Skipping malformed submission");
                continue;
            }
        };

        match queue
            .enqueue_request(submission.request, submission.correlation_id)
            .await
        {
            Ok(op_id) => {
                accepted += 1;
                info!(op_id = %op_id, queue_size = queue.size().await, "Submission queued");
            }
            Err(e) => warn!(error = %e, "Rejected submission"),
        }
    }
    Ok(accepted)
}
