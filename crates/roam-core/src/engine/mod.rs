//! The 90/180 compliance engine.
//!
//! Pure date-interval arithmetic over calendar dates: normalizing trip
//! lists, measuring presence in the trailing 180-day window, simulating
//! planned stays and applying presence edits. Nothing here performs I/O or
//! keeps state between calls.

mod breakdown;
mod error;
mod normalize;
mod plan;
mod presence;
mod simulate;
mod span;
mod usage;

pub use breakdown::{BreakdownResult, MonthUsage, breakdown};
pub use error::EngineError;
pub use normalize::{NormalizedSpans, normalize};
pub use plan::{WindowSummary, extend_exit, summary};
pub use presence::{PresenceSet, add_range, remove_range, toggle_presence};
pub use simulate::{CheckStayResult, MaxStayResult, check_stay, max_safe_stay};
pub use span::{AsSpan, Span, window_ending};
pub use usage::used_days;

/// Presence days allowed inside any trailing window.
pub const MAX_PRESENCE_DAYS: u32 = 90;

/// Length of the trailing window, both ends included.
pub const WINDOW_DAYS: u32 = 180;
