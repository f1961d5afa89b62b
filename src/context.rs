//! Per-request context carried through the handling task.
//!
//! The request-id middleware binds the correlation id as a task-local so the
//! logger and error envelope can read it without threading it through every
//! call. The binding lives exactly as long as the handling task's response
//! future.

use std::future::Future;

tokio::task_local! {
    static REQUEST_ID: String;
}

/// Run `fut` with the given request id bound to the current task.
pub async fn with_request_id<F>(request_id: String, fut: F) -> F::Output
where
    F: Future,
{
    REQUEST_ID.scope(request_id, fut).await
}

/// The request id bound to the current task, if any.
///
/// Returns `None` outside a request scope (startup, background services).
pub fn current_request_id() -> Option<String> {
    REQUEST_ID.try_with(|id| id.clone()).ok()
}
