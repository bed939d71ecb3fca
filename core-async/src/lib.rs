//! Runtime facade for the healing player core.
//!
//! The playback crates depend on this crate instead of naming Tokio directly,
//! which keeps the executor choice in one place:
//!
//! - `task`: task spawning and join handles
//! - `time`: sleep, intervals, timeouts
//! - `sync`: channels, locks and cancellation tokens
//! - `timer`: cancellable repeating timers with an explicit handle
//! - `runtime`: runtime handles and `block_on`
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//! use core_async::time::{sleep, Duration};
//!
//! async fn example() {
//!     let handle = task::spawn(async {
//!         sleep(Duration::from_millis(10)).await;
//!         42
//!     });
//!     assert_eq!(handle.await.unwrap(), 42);
//! }
//! ```

pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;
pub mod timer;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};
pub use timer::RepeatingTimer;
