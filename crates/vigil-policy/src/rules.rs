use std::path::Path;

use regex::Regex;
use serde::Deserialize;

use crate::error::PolicyError;
use crate::tier::RiskTier;

/// Built-in rule document, compiled through the same fallible path as
/// operator-supplied documents.
const DEFAULT_DOCUMENT: &str = include_str!("../rules/default.json");

/// A compiled classification rule. Order within a tier group is the
/// order of the source document and is preserved after load.
#[derive(Debug, Clone)]
pub struct PatternRule {
    pub tier: RiskTier,
    pub pattern: Regex,
    pub description: String,
}

impl PatternRule {
    #[must_use]
    pub fn matches(&self, command: &str) -> bool {
        self.pattern.is_match(command)
    }
}

/// Runtime policy knobs carried by the rule document.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicySettings {
    pub confirmation_timeout_seconds: u64,
    pub default_interactive_mode: bool,
}

/// A rule entry is either a bare regex or a regex with a human-readable
/// description used in rejection messages.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RuleEntry {
    Plain(String),
    Detailed { pattern: String, description: String },
}

impl RuleEntry {
    fn into_parts(self) -> (String, Option<String>) {
        match self {
            Self::Plain(pattern) => (pattern, None),
            Self::Detailed {
                pattern,
                description,
            } => (pattern, Some(description)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TierGroups {
    absolute_blocked: Vec<RuleEntry>,
    redirection_blocked: Vec<RuleEntry>,
    command_chaining_blocked: Vec<RuleEntry>,
    requires_confirmation: Vec<RuleEntry>,
}

#[derive(Debug, Deserialize)]
struct RuleDocument {
    patterns: TierGroups,
    #[serde(default)]
    safe_pipe_exceptions: Vec<RuleEntry>,
    settings: PolicySettings,
}

/// The complete, immutable pattern rule set. Construct once at startup
/// and share behind an `Arc`; there is no mutation API.
#[derive(Debug)]
pub struct RuleSet {
    absolute_blocked: Vec<PatternRule>,
    redirection_blocked: Vec<PatternRule>,
    command_chaining_blocked: Vec<PatternRule>,
    requires_confirmation: Vec<PatternRule>,
    safe_pipe_exceptions: Vec<PatternRule>,
    settings: PolicySettings,
}

impl RuleSet {
    /// Parses and compiles a JSON rule document.
    ///
    /// # Errors
    ///
    /// Returns `PolicyError` when the JSON is malformed, a tier group
    /// is missing, or any regex fails to compile. Callers are expected
    /// to treat this as fatal at startup.
    pub fn load(document: &str) -> Result<Self, PolicyError> {
        let doc: RuleDocument = serde_json::from_str(document)?;

        Ok(Self {
            absolute_blocked: compile(
                "absolute_blocked",
                RiskTier::AbsoluteBlocked,
                doc.patterns.absolute_blocked,
            )?,
            redirection_blocked: compile(
                "redirection_blocked",
                RiskTier::RedirectionBlocked,
                doc.patterns.redirection_blocked,
            )?,
            command_chaining_blocked: compile(
                "command_chaining_blocked",
                RiskTier::ChainingBlocked,
                doc.patterns.command_chaining_blocked,
            )?,
            requires_confirmation: compile(
                "requires_confirmation",
                RiskTier::RequiresConfirmation,
                doc.patterns.requires_confirmation,
            )?,
            safe_pipe_exceptions: compile(
                "safe_pipe_exceptions",
                RiskTier::SafePipeException,
                doc.safe_pipe_exceptions,
            )?,
            settings: doc.settings,
        })
    }

    /// Reads and compiles a rule document from disk.
    ///
    /// # Errors
    ///
    /// Returns `PolicyError::Io` when the file cannot be read, or any
    /// [`RuleSet::load`] error.
    pub fn load_file(path: &Path) -> Result<Self, PolicyError> {
        let content = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::load(&content)
    }

    /// Compiles the embedded default document.
    ///
    /// # Errors
    ///
    /// Returns `PolicyError` if the embedded document is invalid; the
    /// test suite pins it as loadable.
    pub fn builtin() -> Result<Self, PolicyError> {
        Self::load(DEFAULT_DOCUMENT)
    }

    /// Ordered rules for one tier. `Safe` has no rules by definition.
    #[must_use]
    pub fn rules_for(&self, tier: RiskTier) -> &[PatternRule] {
        match tier {
            RiskTier::AbsoluteBlocked => &self.absolute_blocked,
            RiskTier::RedirectionBlocked => &self.redirection_blocked,
            RiskTier::ChainingBlocked => &self.command_chaining_blocked,
            RiskTier::RequiresConfirmation => &self.requires_confirmation,
            RiskTier::SafePipeException => &self.safe_pipe_exceptions,
            RiskTier::Safe => &[],
        }
    }

    /// First rule in a tier group matching `command`, if any.
    #[must_use]
    pub fn first_match(&self, tier: RiskTier, command: &str) -> Option<&PatternRule> {
        self.rules_for(tier).iter().find(|r| r.matches(command))
    }

    #[must_use]
    pub fn settings(&self) -> &PolicySettings {
        &self.settings
    }
}

fn compile(
    group: &'static str,
    tier: RiskTier,
    entries: Vec<RuleEntry>,
) -> Result<Vec<PatternRule>, PolicyError> {
    entries
        .into_iter()
        .map(|entry| {
            let (pattern, description) = entry.into_parts();
            let regex = Regex::new(&pattern).map_err(|source| PolicyError::InvalidPattern {
                group,
                pattern: pattern.clone(),
                source,
            })?;
            Ok(PatternRule {
                tier,
                description: description.unwrap_or_else(|| pattern.clone()),
                pattern: regex,
            })
        })
        .collect()
}
