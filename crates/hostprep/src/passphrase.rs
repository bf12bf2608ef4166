//! Vault passphrase collection

use hostprep_core::{Notice, Passphrase, Prompter, Reply, Result};
use secrecy::{ExposeSecret, SecretString};

const UNREADABLE: &str = "The passphrase is not readable text.";

/// Obtain the vault passphrase once, before the wizard starts
///
/// Uses `configured` when present, otherwise asks twice until both entries
/// match and are non-empty. Returns `None` if the operator cancels.
pub fn collect(
    configured: Option<&SecretString>,
    prompter: &mut dyn Prompter,
) -> Result<Option<Passphrase>> {
    if let Some(secret) = configured {
        tracing::debug!("Using vault passphrase from HOSTPREP_VAULT_PASSPHRASE");
        return Passphrase::new(secret.expose_secret()).map(Some);
    }

    prompter.notify(Notice::Info(
        "Choose a vault passphrase. The deployment engine asks for it to read the sealed documents."
            .to_string(),
    ));

    loop {
        let primary = match prompter.ask_secret("Vault passphrase")? {
            Reply::Answer(answer) => SecretString::from(answer),
            Reply::Unreadable => {
                prompter.notify(Notice::Rejected(UNREADABLE.to_string()));
                continue;
            }
            Reply::Cancel => return Ok(None),
        };
        let confirmation = match prompter.ask_secret("Repeat vault passphrase")? {
            Reply::Answer(answer) => SecretString::from(answer),
            Reply::Unreadable => {
                prompter.notify(Notice::Rejected(UNREADABLE.to_string()));
                continue;
            }
            Reply::Cancel => return Ok(None),
        };

        let (primary, confirmation) = (primary.expose_secret(), confirmation.expose_secret());
        if primary.is_empty() {
            prompter.notify(Notice::Rejected("The passphrase cannot be empty.".to_string()));
            continue;
        }
        if primary != confirmation {
            prompter.notify(Notice::Rejected("The passphrases do not match.".to_string()));
            continue;
        }

        return Passphrase::new(primary).map(Some);
    }
}
