//! Source watching for hotpage live reload.
//!
//! Turns raw filesystem notifications into a filtered, coalesced stream of
//! "reload is due" signals.
//!
//! # Architecture
//!
//! ```text
//! WatchTarget[] ──validate_targets──► ValidatedTarget[]
//!                                          │
//!                                          ▼
//!                        PathWatcher (one notify watcher per target)
//!                                          │ FilterPolicy
//!                                          ▼
//!                                     ChangeEvent
//!                                          │
//!                                          ▼
//!                        ChangeCoalescer ──► CoalescedSignal
//! ```
//!
//! Validation is synchronous and fatal ([`ConfigurationError`]); arming is
//! per target and recoverable ([`WatchArmingError`]).
//!
//! # Example
//!
//! ```ignore
//! use hotpage_watch::{ChangeCoalescer, WatchTarget, arm_all, validate_targets};
//!
//! let targets = validate_targets(&[
//!     WatchTarget::file("public/style.css"),
//!     WatchTarget::directory("views", [".html"]),
//! ])?;
//! let coalescer = std::sync::Arc::new(ChangeCoalescer::default());
//! let sink = std::sync::Arc::clone(&coalescer);
//! let (watchers, failures) = arm_all(targets, move |change| sink.record(change));
//! ```

mod coalescer;
mod error;
mod event;
mod filter;
mod target;
mod watcher;

pub use coalescer::{ChangeCoalescer, CoalescedSignal, DEFAULT_DEBOUNCE};
pub use error::{ConfigurationError, WatchArmingError};
pub use event::{ChangeEvent, ChangeKind};
pub use filter::{FilterPolicy, is_ignored};
pub use target::{TargetKind, ValidatedTarget, WatchTarget, validate_targets};
pub use watcher::{PathWatcher, arm_all};
