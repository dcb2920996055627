//! Job graph model.
//!
//! The engine consumes an already-built, immutable graph:
//! - [`Job`]: top-level container with listeners
//! - [`JobElement`]: step, flow, split, or decision
//! - [`TransitionRule`]: exit-status pattern and disposition

pub mod element;
pub mod job;
pub mod rule;

pub use element::{ArtifactRef, Decision, Flow, JobElement, Split, Step};
pub use job::Job;
pub use rule::TransitionRule;
