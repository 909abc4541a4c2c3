//! Recursive hierarchy segmentation engine.
//!
//! Discovers an unknown-depth document hierarchy by repeatedly delegating
//! "find children of this element type in this line range" to an external
//! oracle, while guaranteeing non-overlapping coverage, termination,
//! stable citations and deterministic re-assembly order under parallel
//! execution.
//!
//! - [`ParallelDispatcher`] - ordered concurrent fan-out with per-task
//!   retry, backoff and cancellation
//! - [`RecursiveSegmenter`] - wave-based top-down tree construction with
//!   invariant enforcement

pub mod dispatcher;
pub mod segmenter;

pub use dispatcher::*;
pub use segmenter::*;
