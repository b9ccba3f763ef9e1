use serde::{Deserialize, Serialize};

/// Risk tier assigned to a shell command by the classifier.
///
/// The set is closed: adding a tier is a breaking change for every
/// consumer that matches on dispatch outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    /// Never executable, not confirmable.
    AbsoluteBlocked,
    /// Output redirection into a protected location. Never executable.
    RedirectionBlocked,
    /// Dangerous command chaining. Never executable.
    ChainingBlocked,
    /// Executable only after an explicit approval.
    RequiresConfirmation,
    /// Pipeline matched a known-safe exception; runs without a prompt.
    SafePipeException,
    /// No rule matched.
    Safe,
}

impl RiskTier {
    /// Blocked tiers in classifier evaluation order.
    pub const BLOCKED: [Self; 3] = [
        Self::AbsoluteBlocked,
        Self::RedirectionBlocked,
        Self::ChainingBlocked,
    ];

    /// True for tiers that deny execution outright, with no
    /// confirmation path.
    #[must_use]
    pub fn is_blocked(self) -> bool {
        matches!(
            self,
            Self::AbsoluteBlocked | Self::RedirectionBlocked | Self::ChainingBlocked
        )
    }

    /// True when the command may run without user approval.
    #[must_use]
    pub fn allows_unattended(self) -> bool {
        matches!(self, Self::Safe | Self::SafePipeException)
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AbsoluteBlocked => "absolute_blocked",
            Self::RedirectionBlocked => "redirection_blocked",
            Self::ChainingBlocked => "command_chaining_blocked",
            Self::RequiresConfirmation => "requires_confirmation",
            Self::SafePipeException => "safe_pipe_exception",
            Self::Safe => "safe",
        };
        f.write_str(s)
    }
}
