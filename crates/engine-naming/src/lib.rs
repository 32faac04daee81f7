//! # Engine Naming
//!
//! Resolves, for each resource URN, an autonaming strategy from a
//! three-level configuration tree (`providers[P].resources[T]` →
//! `providers[P]` → global default), and proposes physical names from
//! deterministic, seeded pattern substitution.

mod error;
mod pattern;
mod resolver;
mod strategy;

pub use error::{NamingError, NamingResult};
pub use resolver::{NamingConfig, ProviderNaming, RawNamingConfig, RawProviderNaming, ResolvedNaming};
pub use strategy::{NamingStrategy, RawDirective};
