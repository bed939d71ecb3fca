//! Synchronization primitives.
//!
//! Re-exports Tokio's async-aware primitives and the `tokio-util`
//! cancellation token. Every type is `Send + Sync` and can be shared across
//! tasks.
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::{watch, Mutex};
//!
//! async fn example() {
//!     let mutex = Mutex::new(42);
//!     *mutex.lock().await += 1;
//!
//!     let (tx, rx) = watch::channel(0u32);
//!     tx.send_replace(7);
//!     assert_eq!(*rx.borrow(), 7);
//! }
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify, RwLock, RwLockReadGuard,
    RwLockWriteGuard,
};

pub use tokio_util::sync::CancellationToken;
