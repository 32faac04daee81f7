//! # Engine Graph
//!
//! Builds and queries the dependency relation over a resource snapshot: who
//! must be stepped before whom, with component expansion folded in so a
//! dependency on a component resource implies a dependency on everything
//! under it.

mod error;
mod graph;

pub use error::{GraphError, GraphResult};
pub use graph::DependencyGraph;
