//! Carrier validation rules (pure domain logic).
//!
//! A validation rule filters and reorders the carriers offered for one package.
//! This crate contains the rule model, its normalization into an
//! evaluation-ready form, and the ordered evaluation itself. There is no IO here:
//! loading and caching rules lives in `forgeship-infra`.

pub mod candidates;
pub mod context;
pub mod evaluate;
pub mod normalize;
pub mod rule;

pub use candidates::CandidateList;
pub use context::{MatchContext, PackageLine};
pub use evaluate::{RuleEvaluation, apply_actions, evaluate, rule_matches};
pub use normalize::{NormalizedRule, RuleActions, RuleConditions, normalize, sort_by_priority};
pub use rule::{RuleScope, ValidationRule};
