//! Run gateway mutations so they finish even if the caller goes away.

use std::future::Future;

use super::error::Error;

/// Spawn `task` and await it.
///
/// Dropping the returned future detaches from the task but does not cancel
/// it, so a started mutation always reaches the authoritative store.
pub(crate) async fn run_to_completion<F>(task: F) -> Result<F::Output, Error>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(task)
        .await
        .map_err(|error| Error::internal(format!("gateway task did not complete: {error}")))
}
