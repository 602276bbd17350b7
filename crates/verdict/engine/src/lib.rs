//! Verdict evaluation orchestrator
//!
//! Two tiers:
//!
//! - [`ArtifactEvaluator`] runs one artifact: fetch the document, resolve
//!   ownership metadata, run the policy engine once, then fan out one branch
//!   per rule-package result through the counter-based completion-detection
//!   protocol, sinking any infractions found.
//! - [`Coordinator`] runs one request: one evaluator task per artifact under
//!   a bounded wait, no retries, no cross-artifact aborts, and an aggregate
//!   report that always carries per-artifact detail.
//!
//! The protocol's shared state lives behind the injected store traits, so
//! every piece is testable with in-memory fakes.

#![deny(unsafe_code)]

pub mod artifact;
pub mod coordinator;
pub mod error;
pub mod metadata;

pub use artifact::ArtifactEvaluator;
pub use coordinator::Coordinator;
pub use error::{EngineError, EngineResult};
pub use metadata::{MetadataResolver, PassthroughResolver, StaticResolver};
