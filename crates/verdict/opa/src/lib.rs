//! Verdict policy engine adapter
//!
//! The broker treats rule evaluation as an opaque capability: hand a
//! document and a rule bundle to an engine, get back one
//! `{allow, infractions}` outcome per rule package. This crate owns that
//! seam: the [`PolicyEvaluator`] trait, a subprocess-backed implementation
//! for an OPA-style engine binary, and a canned implementation for tests.
//!
//! The adapter is a pure translation layer; it owns no persistent state and
//! is never retried by the orchestrator.

pub mod error;
pub mod evaluator;
pub mod result;

pub use error::PolicyError;
pub use evaluator::{PolicyEvaluator, StaticEvaluator, SubprocessEvaluator};
pub use result::{gather_results, PackageResult, PolicyResultSet, RuleBundleRef};
