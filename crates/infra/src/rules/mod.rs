//! Loading, caching and applying validation rules.

pub mod applier;
pub mod provider;

pub use applier::{CartPackage, PackageEvaluation, PackagesByAddress, RuleApplier};
pub use provider::RuleProvider;
