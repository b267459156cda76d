//! Limiting the number of concurrent CPU-bound external tools.

use std::sync::LazyLock;

use tokio::sync::Semaphore;

use crate::prelude::*;

/// Semaphore used to limit the number of concurrent `pdftocairo`,
/// `tesseract` and `easyocr` processes.
static CPU_SEMAPHORE: LazyLock<Semaphore> =
    LazyLock::new(|| Semaphore::new(num_cpus::get()));

/// Call an async function while holding a permit from the CPU semaphore.
///
/// Use this around external processes that will each try to use a full CPU
/// core. In-process work should go through
/// [`spawn_blocking_propagating_panics`](crate::async_utils::spawn_blocking_propagating_panics)
/// instead.
#[instrument(level = "trace", skip_all)]
pub async fn with_cpu_semaphore<Func, Fut, R>(f: Func) -> R
where
    Func: FnOnce() -> Fut,
    Fut: Future<Output = R>,
{
    // The semaphore is never closed, so this only fails if that changes.
    let permit = CPU_SEMAPHORE.acquire().await;
    if let Err(err) = &permit {
        warn!("Running without a CPU permit: {}", err);
    }
    let result = f().await;
    drop(permit);
    result
}
