use dialoguer::Confirm;
use tracing::warn;

use crate::store::log_store::Confirmation;

/// Asks on the terminal. Anything but an explicit yes, including a missing terminal, is a no.
pub struct TerminalConfirmation;

impl Confirmation for TerminalConfirmation {
    fn confirm(&mut self, prompt: &str) -> bool {
        Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .unwrap_or_else(|e| {
                warn!("Couldn't ask for confirmation {e:?}");
                false
            })
    }
}

/// Used with `--yes`.
pub struct AssumeYes;

impl Confirmation for AssumeYes {
    fn confirm(&mut self, _prompt: &str) -> bool {
        true
    }
}
