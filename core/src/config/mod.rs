//! Configuration registry and capability predicates.
//!
//! The registry is loaded exactly once from environment input at process
//! start and is read-only afterwards; everything else in the workspace
//! consults it through the predicate methods before acting.

mod model;
mod registry;

pub use model::{AppMeta, Feature, FeatureFlag, Provider, ProviderConfig, RuntimeMode};
pub use registry::{ConfigRegistry, ValidationReport};
