//! Command risk classification and confirmation gating.
//!
//! Loads an ordered pattern-rule document, classifies raw shell
//! commands into risk tiers, and mediates user approval for commands
//! that need it. The rule set is immutable after load; classification
//! is pure and deterministic.

pub mod classify;
pub mod confirm;
pub mod error;
pub mod rules;
pub mod tier;

pub use classify::classify;
pub use confirm::{ConfirmationGate, ConfirmationRequest, Decision, PendingConfirmation};
pub use error::PolicyError;
pub use rules::{PatternRule, PolicySettings, RuleSet};
pub use tier::RiskTier;
