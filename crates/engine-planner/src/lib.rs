//! # Engine Planner
//!
//! Runs the deployment algorithm: given an old snapshot and a stream of
//! resource registrations from the current user program run, decides a
//! `Create`/`Update`/`Replace`/`Delete`/`Same` step for each resource,
//! cascades replaces across dependents, deletes anything no longer
//! registered, and assembles (and integrity-checks) the resulting
//! snapshot.

mod error;
mod planner;
mod registration;
mod step;

pub use error::{PlannerError, PlannerResult};
pub use planner::{PlanOutcome, Planner};
pub use registration::Registration;
pub use step::{Step, StepKind};

#[cfg(test)]
mod tests;
