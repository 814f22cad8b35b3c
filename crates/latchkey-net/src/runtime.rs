//! Background runtime for requests started outside an async context.
//!
//! Requests started from inside a Tokio runtime run on that runtime. Callers
//! without one get a lazily created multi-threaded runtime shared by the
//! whole process.
//!
//! ```no_run
//! use latchkey_net::HttpClient;
//!
//! let handle = HttpClient::builder()
//!     .url("https://api.example.com/status")
//!     .on_completion(|result| println!("{result:?}"))
//!     .build()
//!     .get();
//!
//! // Optionally wait for the result.
//! let result = latchkey_net::runtime::block_on(handle);
//! ```

use std::future::Future;
use std::sync::OnceLock;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;

static GLOBAL_RUNTIME: OnceLock<Runtime> = OnceLock::new();

fn global() -> &'static Runtime {
    GLOBAL_RUNTIME.get_or_init(|| {
        Builder::new_multi_thread()
            .thread_name("latchkey-net")
            .enable_io()
            .enable_time()
            .build()
            .expect("Failed to create global network runtime")
    })
}

/// The handle tasks are spawned on.
pub fn handle() -> Handle {
    Handle::try_current().unwrap_or_else(|_| global().handle().clone())
}

/// Spawn a future on the current runtime, or the global one if there is none.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    handle().spawn(future)
}

/// Block the current thread on a future using the global runtime.
///
/// # Panics
///
/// Panics when called from within an async context.
pub fn block_on<F: Future>(future: F) -> F::Output {
    global().block_on(future)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_without_runtime() {
        let handle = spawn(async { 21 * 2 });
        assert_eq!(block_on(handle).unwrap(), 42);
    }

    #[tokio::test]
    async fn test_spawn_inside_runtime() {
        let current = Handle::current().id();
        let handle = spawn(async { Handle::current().id() });
        assert_eq!(handle.await.unwrap(), current);
    }
}
