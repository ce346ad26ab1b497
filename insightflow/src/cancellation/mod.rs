//! Cooperative cancellation for pipeline runs.
//!
//! A single [`CancellationToken`] is shared by every worker of a run. When it
//! fires, in-flight fetches are abandoned and their URLs are reported as
//! cancelled.

mod token;

pub use token::CancellationToken;
