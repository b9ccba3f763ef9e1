use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::rules::PolicySettings;
use crate::tier::RiskTier;

/// Outcome of a confirmation request. `TimedOut` is reported
/// distinctly but callers must treat it as a denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approved,
    Denied,
    TimedOut,
}

/// Snapshot of what is being confirmed, shown by the prompter.
#[derive(Debug)]
pub struct ConfirmationRequest {
    pub command: String,
    pub tier: RiskTier,
    pub created_at: Instant,
    pub timeout: Duration,
}

/// A confirmation awaiting an answer. Dropping it without answering
/// counts as a denial on the gate side.
#[derive(Debug)]
pub struct PendingConfirmation {
    pub request: ConfirmationRequest,
    responder: oneshot::Sender<bool>,
}

impl PendingConfirmation {
    pub fn approve(self) {
        let _ = self.responder.send(true);
    }

    pub fn deny(self) {
        let _ = self.responder.send(false);
    }

    /// Answers with an explicit boolean, for prompters built on
    /// yes/no widgets.
    pub fn answer(self, approved: bool) {
        let _ = self.responder.send(approved);
    }
}

/// Gate between the dispatch engine and whoever can answer prompts.
///
/// Interactive mode hands each request to the prompter task through a
/// bounded channel and suspends until an answer, the timeout, or
/// cancellation, whichever comes first. Non-interactive mode denies
/// immediately without contacting the prompter.
#[derive(Debug, Clone)]
pub struct ConfirmationGate {
    prompt_tx: mpsc::Sender<PendingConfirmation>,
    interactive: bool,
    timeout: Duration,
}

impl ConfirmationGate {
    /// Creates a gate plus the receiver the prompter task consumes.
    #[must_use]
    pub fn new(settings: &PolicySettings) -> (Self, mpsc::Receiver<PendingConfirmation>) {
        let (prompt_tx, prompt_rx) = mpsc::channel(16);
        let gate = Self {
            prompt_tx,
            interactive: settings.default_interactive_mode,
            timeout: Duration::from_secs(settings.confirmation_timeout_seconds),
        };
        (gate, prompt_rx)
    }

    /// Overrides the document's interactive-mode default, e.g. from a
    /// CLI flag or a headless deployment.
    #[must_use]
    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    #[must_use]
    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// Asks for approval to run `command`.
    ///
    /// Resolution, in race order: prompter answer, `cancel` fired
    /// (`Denied`), timeout elapsed (`TimedOut`). A closed prompt
    /// channel or a dropped responder is `Denied`.
    pub async fn request_confirmation(
        &self,
        command: &str,
        tier: RiskTier,
        cancel: &CancellationToken,
    ) -> Decision {
        if !self.interactive {
            tracing::info!(command, %tier, "non-interactive mode, auto-denying");
            return Decision::Denied;
        }

        let (responder, answer_rx) = oneshot::channel();
        let pending = PendingConfirmation {
            request: ConfirmationRequest {
                command: command.to_string(),
                tier,
                created_at: Instant::now(),
                timeout: self.timeout,
            },
            responder,
        };

        if self.prompt_tx.send(pending).await.is_err() {
            tracing::warn!(command, "prompter unavailable, denying");
            return Decision::Denied;
        }

        tokio::select! {
            answer = answer_rx => match answer {
                Ok(true) => Decision::Approved,
                Ok(false) | Err(_) => Decision::Denied,
            },
            () = cancel.cancelled() => {
                tracing::info!(command, "confirmation cancelled, denying");
                Decision::Denied
            }
            () = tokio::time::sleep(self.timeout) => {
                tracing::info!(command, timeout_secs = self.timeout.as_secs(), "confirmation timed out");
                Decision::TimedOut
            }
        }
    }
}
