//! # Engine Registry
//!
//! The concurrent provider plugin lifecycle registry: a mapping from
//! `(provider URN, provider ID)` to a live [`Provider`](engine_core::Provider)
//! instance, plus the `absent → loaded-unconfigured → configured` state
//! machine and the `__internal` property bookkeeping convention that keeps
//! engine-managed plugin metadata out of user-facing config.

mod error;
mod internal;
mod registry;

pub use error::{RegistryError, RegistryResult};
pub use internal::InternalConfig;
pub use registry::{resolve_default_provider, ProviderRegistry};

#[cfg(test)]
mod tests;
