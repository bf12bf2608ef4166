// # hostprep-core
//
// Core library for the hostprep bootstrap wizard.
//
// ## Architecture Overview
//
// The wizard turns a handful of operator answers into two documents consumed
// by an external deployment engine:
// - **Validators**: pure accept/reject predicates for every input class
// - **DnsResolutionChecker**: confirms a domain resolves to this host's public IPv4
// - **DocumentWriter**: ordered `key: "value"` appends with permission discipline
// - **Vault**: Ansible Vault 1.1 (PBKDF2 + AES-256-CTR + HMAC) for the secret document
// - **SecretStore**: the single commit point (append, then seal or re-seal)
// - **Wizard**: explicit stage machine driving prompt → validate → persist
//
// Collaborators that touch the outside world (public IP echo, recursive
// resolver, terminal, deployment engine) are traits in [`traits`] and are
// implemented by the satellite crates or the binary.
//
// ## Design Principles
//
// 1. **Library-First**: everything except terminal I/O and env parsing lives here
// 2. **Explicit state**: the session is threaded through stages, never global
// 3. **Sealed at rest**: plaintext secrets never hit disk after the first seal

pub mod config;
pub mod document;
pub mod dns_check;
pub mod error;
pub mod handoff;
pub mod preflight;
pub mod secrets;
pub mod session;
pub mod traits;
pub mod validate;
pub mod vault;
pub mod wizard;

pub use config::WizardConfig;
pub use dns_check::{CheckOutcome, DnsResolutionChecker, RetryPolicy};
pub use document::{DocumentWriter, Entry, Value};
pub use error::{Error, Result};
pub use handoff::CommandHandoff;
pub use preflight::{OsRelease, PackageInstaller};
pub use secrets::SecretStore;
pub use session::{ExposeSecret, SecretString, Session, SmtpSettings};
pub use traits::{
    DomainResolver, Handoff, HandoffReport, Notice, Prompter, PublicIpSource, Reply,
};
pub use validate::{DnsChoice, Rejection, Verdict};
pub use vault::{Passphrase, Vault};
pub use wizard::{HandoffStatus, Stage, Wizard, WizardOutcome, WizardSummary};
