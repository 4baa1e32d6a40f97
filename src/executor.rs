//! Scheduler seam for background work such as push-mode scan loops.

use std::future::Future;

/// Runs detached futures.
pub trait Executor: Send + Sync + 'static {
    /// Starts `future` in the background.
    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// [`Executor`] backed by a tokio runtime.
#[cfg(any(feature = "tokio", test))]
pub mod tokio {
    use std::future::Future;

    use tokio::runtime::Handle;

    use super::Executor;

    /// Spawns onto a tokio runtime through its [`Handle`].
    #[derive(Debug, Clone)]
    pub struct TokioExecutor {
        handle: Handle,
    }

    impl TokioExecutor {
        /// Spawns onto the runtime behind `handle`.
        pub fn new(handle: Handle) -> Self {
            Self { handle }
        }
    }

    impl Default for TokioExecutor {
        /// Binds to the runtime of the calling context.
        ///
        /// Panics when called outside of a tokio runtime.
        fn default() -> Self {
            Self {
                handle: Handle::current(),
            }
        }
    }

    impl Executor for TokioExecutor {
        fn spawn<F>(&self, future: F)
        where
            F: Future<Output = ()> + Send + 'static,
        {
            self.handle.spawn(future);
        }
    }
}
