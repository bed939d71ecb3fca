//! Runtime utilities that abstract over the underlying async executor.

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Runs the provided future to completion on a throwaway current-thread runtime.
///
/// Returns an error if the runtime cannot be built; callers on the logging
/// path report the failure instead of panicking.
pub fn block_on<F>(future: F) -> std::io::Result<F::Output>
where
    F: std::future::Future,
{
    let runtime = Builder::new_current_thread().enable_all().build()?;
    Ok(runtime.block_on(future))
}

/// Returns `true` when called from inside a Tokio runtime context.
pub fn in_runtime() -> bool {
    Handle::try_current().is_ok()
}
