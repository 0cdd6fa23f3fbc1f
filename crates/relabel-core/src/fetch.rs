//! Snapshot fetching from an issue source
//!
//! Lists closed issues, then loads each timeline with a bounded number of
//! requests in flight.

use crate::issue::{Issue, RawEvent};
use crate::{Error, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info};

/// Default number of timeline requests in flight
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Read side of the issue tracker
#[async_trait]
pub trait IssueSource: Send + Sync {
    /// Every closed issue, across all pages
    async fn closed_issues(&self) -> Result<Vec<Issue>>;

    /// Full timeline of one issue, oldest first
    async fn timeline(&self, issue: u64) -> Result<Vec<RawEvent>>;
}

fn into_fetch(err: Error) -> Error {
    match err {
        Error::Fetch(_) => err,
        other => Error::Fetch(other.to_string()),
    }
}

/// Build a full snapshot. Any failure aborts the whole fetch, since a
/// partial history would produce a misleading plan.
pub async fn fetch_snapshot<S>(source: &S, concurrency: usize) -> Result<Vec<Issue>>
where
    S: IssueSource + ?Sized,
{
    let issues = source.closed_issues().await.map_err(into_fetch)?;
    info!(count = issues.len(), "loaded closed issues");

    let issues: Vec<Issue> = stream::iter(issues)
        .map(|mut issue| async move {
            debug!(issue = issue.number, "loading timeline");
            issue.timeline = source.timeline(issue.number).await?;
            Ok::<_, Error>(issue)
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await
        .map_err(into_fetch)?;

    info!(count = issues.len(), "loaded timelines");
    Ok(issues)
}
