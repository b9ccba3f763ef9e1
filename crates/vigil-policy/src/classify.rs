use crate::rules::RuleSet;
use crate::tier::RiskTier;

/// Classifies a raw shell command string against the rule set.
///
/// Pure and deterministic: same command and rule set, same tier. The
/// command is matched as-is (case-sensitive, untokenized) by regex
/// search over the whole string. Tier precedence is fixed:
/// blocked tiers first, then safe-pipe exceptions, then confirmation.
/// An empty or all-whitespace command is `Safe`.
#[must_use]
pub fn classify(command: &str, rules: &RuleSet) -> RiskTier {
    if command.trim().is_empty() {
        return RiskTier::Safe;
    }

    for tier in RiskTier::BLOCKED {
        if rules.first_match(tier, command).is_some() {
            return tier;
        }
    }

    // Pipelines matching a known-safe shape skip the confirmation
    // group even when a confirmation pattern would also match.
    if has_pipe(command)
        && rules
            .first_match(RiskTier::SafePipeException, command)
            .is_some()
    {
        return RiskTier::SafePipeException;
    }

    if rules
        .first_match(RiskTier::RequiresConfirmation, command)
        .is_some()
    {
        return RiskTier::RequiresConfirmation;
    }

    RiskTier::Safe
}

/// True when the command contains a pipe operator. The `||` logical-or
/// shares the character but chains commands instead of piping data, so
/// it never enables the safe-pipe exception on its own.
fn has_pipe(command: &str) -> bool {
    let bytes = command.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'|' {
            if i + 1 < bytes.len() && bytes[i + 1] == b'|' {
                i += 2;
                continue;
            }
            return true;
        }
        i += 1;
    }
    false
}
