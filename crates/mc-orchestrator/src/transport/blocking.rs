//! Blocking entry into async transport code
//!
//! The blocking transport calls drive the same futures as the async ones.
//! Inside a multi-threaded runtime the worker is handed over with
//! `block_in_place`; outside any runtime a throwaway current-thread runtime
//! runs the future.

use std::future::Future;

use tokio::runtime::{Builder, Handle, RuntimeFlavor};

use mc_core::TransportError;

/// Run `future` to completion from synchronous code.
///
/// Fails only when called from a current-thread runtime, where blocking the
/// thread would deadlock the runtime itself.
pub fn block_on<F: Future>(future: F) -> Result<F::Output, TransportError> {
    match Handle::try_current() {
        Ok(handle) => match handle.runtime_flavor() {
            RuntimeFlavor::CurrentThread => Err(TransportError::Runtime(
                "blocking call made from a current-thread runtime; use the async API".into(),
            )),
            _ => Ok(tokio::task::block_in_place(|| handle.block_on(future))),
        },
        Err(_) => {
            let runtime = Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| TransportError::Runtime(format!("Failed to start runtime: {}", e)))?;
            Ok(runtime.block_on(future))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_on_without_runtime() {
        let value = block_on(async { 21 * 2 }).unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_block_on_inside_multi_thread_runtime() {
        let value = block_on(async {
            tokio::task::yield_now().await;
            "done"
        })
        .unwrap();
        assert_eq!(value, "done");
    }

    #[tokio::test]
    async fn test_block_on_inside_current_thread_runtime_fails() {
        let result = block_on(async { 1 });
        assert!(matches!(result, Err(TransportError::Runtime(_))));
    }
}
