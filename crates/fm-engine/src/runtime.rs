//! Blocking bridge into the async engine.

use crate::error::{EngineError, EngineResult};
use std::future::Future;

const WORKER_NAME: &str = "fastmigrate-worker";

fn block_on_current_thread<F, Fut>(task: F) -> EngineResult<Fut::Output>
where
    F: FnOnce() -> Fut,
    Fut: Future,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| EngineError::Runtime(format!("failed to start runtime: {e}")))?;
    Ok(runtime.block_on(task()))
}

/// Run the future produced by `task` to completion from synchronous code.
///
/// Outside a Tokio runtime this drives a fresh current-thread runtime on the
/// calling thread. Inside one, nesting `block_on` would panic, so the future
/// runs on a dedicated worker thread with its own runtime and the caller
/// joins it. Either way the whole future runs on one thread and one runtime.
pub(crate) fn block_on_isolated<F, Fut>(task: F) -> EngineResult<Fut::Output>
where
    F: FnOnce() -> Fut + Send,
    Fut: Future,
    Fut::Output: Send,
{
    if tokio::runtime::Handle::try_current().is_err() {
        return block_on_current_thread(task);
    }

    std::thread::scope(|scope| {
        let worker = std::thread::Builder::new()
            .name(WORKER_NAME.to_string())
            .spawn_scoped(scope, move || block_on_current_thread(task))
            .map_err(|e| EngineError::Runtime(format!("failed to spawn worker: {e}")))?;
        worker
            .join()
            .map_err(|_| EngineError::Runtime("migration worker panicked".to_string()))?
    })
}
