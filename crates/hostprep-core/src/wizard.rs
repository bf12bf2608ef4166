//! Wizard controller
//!
//! The wizard is an explicit stage machine. Each stage prompts, validates
//! and possibly persists, then returns a [`Transition`]:
//!
//! ```text
//! CollectUsername ─▶ CollectPassword ─▶ PersistIdentity ─▶ OptionalFeatureToggle
//!        ⟲                 ⟲                                      ⟲
//!   ─▶ CollectDomain ─▶ SelectDnsProvider ─▶ PersistNetwork ─▶ OptionalEmailSetup
//!           ⟲                  ⟲                                 │        ⟲
//!                                             ┌── no ────────────┤
//!                                             │                  ▼ yes
//!                                             │           CollectSmtpFields ⟲
//!                                             ▼                  │
//!                                          Finalize ◀────────────┘
//!                                             │
//!                                             ▼
//!                                           Done
//! ```
//!
//! `⟲` is `Transition::Retry`: the rejection is shown and the same stage runs
//! again. Inside `CollectSmtpFields` each field has its own loop, so only
//! the rejected field is asked again. `Transition::Abort` (end of input or the abort keyword) leaves from
//! any prompting stage. There is no way back to an earlier stage.
//!
//! ## Lifecycle
//!
//! 1. Create with [`Wizard::new()`], optionally attach a [`Handoff`]
//! 2. Run with [`Wizard::run()`]; both documents are reset first
//! 3. Inspect the [`WizardOutcome`]

use std::fmt;
use std::net::IpAddr;
use tracing::{debug, info, warn};

use crate::config::WizardConfig;
use crate::dns_check::{DnsResolutionChecker, normalize_domain};
use crate::document::{self, DocumentWriter, Entry};
use crate::error::{Error, Result};
use crate::secrets::SecretStore;
use crate::session::{ExposeSecret, SecretString, Session, SmtpSettings};
use crate::traits::{Handoff, HandoffReport, Notice, Prompter, Reply};
use crate::validate::{self, DnsChoice, Rejection, Verdict};
use crate::vault::{self, Vault};

/// Plain document keys
pub mod keys {
    /// Login name
    pub const USERNAME: &str = "username";
    /// Verified domain
    pub const ROOT_HOST: &str = "root_host";
    /// Upstream nameserver
    pub const DNS_NAMESERVERS: &str = "dns_nameservers";
    /// SMTP server
    pub const EMAIL_SMTP_HOST: &str = "email_smtp_host";
    /// SMTP port
    pub const EMAIL_SMTP_PORT: &str = "email_smtp_port";
    /// Notification recipient (secret document when it falls back to the login)
    pub const EMAIL: &str = "email";

    /// Secret: login password
    pub const USER_PASSWORD: &str = "user_password";
    /// Secret: SMTP login
    pub const EMAIL_LOGIN: &str = "email_login";
    /// Secret: SMTP password
    pub const EMAIL_PASSWORD: &str = "email_password";
}

/// Wizard stages, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Ask for the login name
    CollectUsername,
    /// Ask for the password twice
    CollectPassword,
    /// Write username (plain) and password (secret, sealed)
    PersistIdentity,
    /// Yes/no feature toggle, written as a boolean
    OptionalFeatureToggle,
    /// Ask for a domain until it resolves to this host
    CollectDomain,
    /// Pick an upstream DNS provider (or a custom address)
    SelectDnsProvider,
    /// Write domain and nameserver
    PersistNetwork,
    /// Ask whether to configure outbound email
    OptionalEmailSetup,
    /// Ask for SMTP settings and commit them
    CollectSmtpFields,
    /// Seal the plain document and offer the hand-off
    Finalize,
    /// Terminal
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Shown when an answer is not valid UTF-8
const UNREADABLE_ANSWER: &str = "That answer is not readable text. Please type it again.";

/// Answer to one question, or the transition to take instead
type Prompted = std::result::Result<String, Transition>;

/// Result of running one stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Transition {
    /// Move to the given stage
    Advance(Stage),
    /// Stay, after showing why
    Retry(Rejection),
    /// Operator cancelled
    Abort,
}

/// What became of the deployment engine hand-off
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandoffStatus {
    /// No engine configured, or the operator declined
    Skipped,
    /// The engine ran (check the exit code)
    Ran(HandoffReport),
    /// The engine could not be started
    Failed(String),
}

/// Summary of a completed run (no secrets)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardSummary {
    /// Login name
    pub username: String,
    /// Verified domain
    pub domain: String,
    /// Chosen upstream nameserver
    pub nameserver: IpAddr,
    /// Whether the feature toggle was enabled
    pub feature_enabled: bool,
    /// Whether SMTP settings were committed
    pub email_configured: bool,
    /// Whether the plain document was sealed
    pub settings_sealed: bool,
    /// Rejected answers across all stages
    pub retries: usize,
    /// Deployment engine hand-off
    pub handoff: HandoffStatus,
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardOutcome {
    /// All stages finished
    Completed(WizardSummary),
    /// The operator cancelled in `stage`
    Aborted {
        /// Stage that was interrupted
        stage: Stage,
    },
}

/// Interactive configuration wizard
pub struct Wizard {
    config: WizardConfig,
    prompter: Box<dyn Prompter>,
    checker: DnsResolutionChecker,
    settings: DocumentWriter,
    secrets: SecretStore,
    handoff: Option<Box<dyn Handoff>>,
    handoff_status: HandoffStatus,
    settings_sealed: bool,
    retries: usize,
}

impl Wizard {
    /// Create a wizard
    ///
    /// # Parameters
    ///
    /// - `config`: validated before anything else happens
    /// - `prompter`: operator interaction
    /// - `checker`: verifies the domain against live DNS
    /// - `vault`: seals the secret document (and the plain one at the end)
    pub fn new(
        config: WizardConfig,
        prompter: Box<dyn Prompter>,
        checker: DnsResolutionChecker,
        vault: Vault,
    ) -> Result<Self> {
        config.validate()?;

        let settings = DocumentWriter::new(&config.settings_path);
        let secrets = SecretStore::new(&config.secrets_path, vault);

        Ok(Self {
            config,
            prompter,
            checker,
            settings,
            secrets,
            handoff: None,
            handoff_status: HandoffStatus::Skipped,
            settings_sealed: false,
            retries: 0,
        })
    }

    /// Offer to launch `handoff` when the wizard finishes
    pub fn with_handoff(mut self, handoff: Box<dyn Handoff>) -> Self {
        self.handoff = Some(handoff);
        self
    }

    /// Run every stage to completion or until the operator aborts
    pub async fn run(mut self) -> Result<WizardOutcome> {
        self.settings.reset().await?;
        self.secrets.reset().await?;

        let mut session = Session::new();
        let mut stage = Stage::CollectUsername;

        info!("Wizard started");

        while stage != Stage::Done {
            match self.step(stage, &mut session).await? {
                Transition::Advance(next) => {
                    debug!(from = %stage, to = %next, "Stage transition");
                    stage = next;
                }
                Transition::Retry(rejection) => {
                    debug!(stage = %stage, retries = self.retries + 1, "Answer rejected");
                    self.reject(&rejection);
                }
                Transition::Abort => {
                    warn!(stage = %stage, "Wizard aborted by operator");
                    return Ok(WizardOutcome::Aborted { stage });
                }
            }
        }

        let nameserver = session
            .nameserver
            .ok_or_else(|| Error::Other("wizard finished without a nameserver".to_string()))?;

        info!(username = %session.username, domain = %session.domain, "Wizard completed");

        Ok(WizardOutcome::Completed(WizardSummary {
            username: session.username,
            domain: session.domain,
            nameserver,
            feature_enabled: session.feature_enabled,
            email_configured: session.smtp.is_some(),
            settings_sealed: self.settings_sealed,
            retries: self.retries,
            handoff: self.handoff_status,
        }))
    }

    async fn step(&mut self, stage: Stage, session: &mut Session) -> Result<Transition> {
        match stage {
            Stage::CollectUsername => self.collect_username(session),
            Stage::CollectPassword => self.collect_password(session),
            Stage::PersistIdentity => self.persist_identity(session).await,
            Stage::OptionalFeatureToggle => self.feature_toggle(session).await,
            Stage::CollectDomain => self.collect_domain(session).await,
            Stage::SelectDnsProvider => self.select_dns_provider(session),
            Stage::PersistNetwork => self.persist_network(session).await,
            Stage::OptionalEmailSetup => self.email_setup(),
            Stage::CollectSmtpFields => self.collect_smtp_fields(session).await,
            Stage::Finalize => self.finalize().await,
            Stage::Done => Ok(Transition::Advance(Stage::Done)),
        }
    }

    fn reject(&mut self, rejection: &Rejection) {
        self.retries += 1;
        self.prompter
            .notify(Notice::Rejected(rejection.reason().to_string()));
    }

    fn ask(&mut self, question: &str) -> Result<Prompted> {
        let reply = self.prompter.ask(question)?;
        Ok(Self::prompted(reply))
    }

    fn ask_secret(&mut self, question: &str) -> Result<Prompted> {
        let reply = self.prompter.ask_secret(question)?;
        Ok(Self::prompted(reply))
    }

    fn prompted(reply: Reply) -> Prompted {
        match reply {
            Reply::Answer(answer) => Ok(answer),
            Reply::Cancel => Err(Transition::Abort),
            Reply::Unreadable => Err(Transition::Retry(Rejection::new(UNREADABLE_ANSWER))),
        }
    }

    /// Ask one field until `accept` takes it; `None` when the operator cancels
    fn ask_field<T>(
        &mut self,
        question: &str,
        hidden: bool,
        accept: impl Fn(&str) -> Verdict<T>,
    ) -> Result<Option<T>> {
        loop {
            let prompted = if hidden {
                self.ask_secret(question)?
            } else {
                self.ask(question)?
            };
            let rejection = match prompted {
                Ok(answer) => match accept(&answer) {
                    Ok(value) => return Ok(Some(value)),
                    Err(rejection) => rejection,
                },
                Err(Transition::Retry(rejection)) => rejection,
                Err(_) => return Ok(None),
            };
            debug!(field = question, retries = self.retries + 1, "Field rejected");
            self.reject(&rejection);
        }
    }

    fn collect_username(&mut self, session: &mut Session) -> Result<Transition> {
        let answer = match self.ask("Username (lowercase letters and digits, 1-15 characters)")? {
            Ok(answer) => answer,
            Err(transition) => return Ok(transition),
        };

        if let Err(rejection) = validate::validate_username(&answer) {
            return Ok(Transition::Retry(rejection));
        }

        session.username = answer;
        Ok(Transition::Advance(Stage::CollectPassword))
    }

    fn collect_password(&mut self, session: &mut Session) -> Result<Transition> {
        let primary = match self.ask_secret(&format!(
            "Password for {} ({}-{} characters)",
            session.username,
            validate::PASSWORD_MIN_LEN,
            validate::PASSWORD_MAX_LEN
        ))? {
            Ok(answer) => SecretString::from(answer),
            Err(transition) => return Ok(transition),
        };
        let confirmation = match self.ask_secret("Repeat password")? {
            Ok(answer) => SecretString::from(answer),
            Err(transition) => return Ok(transition),
        };

        if let Err(rejection) =
            validate::validate_password(primary.expose_secret(), confirmation.expose_secret())
        {
            return Ok(Transition::Retry(rejection));
        }

        session.password = primary;
        Ok(Transition::Advance(Stage::PersistIdentity))
    }

    async fn persist_identity(&mut self, session: &mut Session) -> Result<Transition> {
        self.settings
            .append(&[Entry::text(keys::USERNAME, session.username.as_str())])
            .await?;
        self.secrets
            .commit(&[Entry::text(
                keys::USER_PASSWORD,
                session.password.expose_secret(),
            )])
            .await?;

        info!(username = %session.username, "Identity committed");
        self.prompter.notify(Notice::Success(format!(
            "Saved user {} (password sealed in {})",
            session.username,
            self.secrets.path().display()
        )));
        Ok(Transition::Advance(Stage::OptionalFeatureToggle))
    }

    async fn feature_toggle(&mut self, session: &mut Session) -> Result<Transition> {
        let question = format!("{} [y/N]", self.config.feature.question);
        let answer = match self.ask(&question)? {
            Ok(answer) => answer,
            Err(transition) => return Ok(transition),
        };

        let enabled = match validate::parse_yes_no(&answer, false) {
            Ok(enabled) => enabled,
            Err(rejection) => return Ok(Transition::Retry(rejection)),
        };

        self.settings
            .append(&[Entry::flag(self.config.feature.key.as_str(), enabled)])
            .await?;
        session.feature_enabled = enabled;
        Ok(Transition::Advance(Stage::CollectDomain))
    }

    async fn collect_domain(&mut self, session: &mut Session) -> Result<Transition> {
        let answer = match self.ask("Domain name pointing at this server (e.g. vpn.example.com)")? {
            Ok(answer) => answer,
            Err(transition) => return Ok(transition),
        };

        self.prompter
            .notify(Notice::Info(format!("Checking that {} resolves to this host...", answer.trim())));

        let outcome = self.checker.check(&answer).await;
        debug!(?outcome, "DNS check finished");

        let domain = normalize_domain(&answer).unwrap_or_default();
        if let Err(rejection) = outcome.verdict(&domain) {
            return Ok(Transition::Retry(rejection));
        }

        self.prompter
            .notify(Notice::Success(format!("{} points at this host", domain)));
        session.domain = domain;
        Ok(Transition::Advance(Stage::SelectDnsProvider))
    }

    fn select_dns_provider(&mut self, session: &mut Session) -> Result<Transition> {
        self.prompter.notify(Notice::Info(format!(
            "Upstream DNS provider:\n{}",
            DnsChoice::menu()
        )));
        let answer = match self.ask("DNS provider [1-4]")? {
            Ok(answer) => answer,
            Err(transition) => return Ok(transition),
        };

        let choice = match validate::parse_dns_choice(&answer) {
            Ok(choice) => choice,
            Err(rejection) => return Ok(Transition::Retry(rejection)),
        };

        let nameserver = match choice.nameserver() {
            Some(ip) => ip,
            None => {
                let custom = match self.ask("Nameserver IP address")? {
                    Ok(answer) => answer,
                    Err(transition) => return Ok(transition),
                };
                match validate::validate_custom_nameserver(&custom) {
                    Ok(ip) => ip,
                    Err(rejection) => return Ok(Transition::Retry(rejection)),
                }
            }
        };

        debug!(choice = choice.label(), nameserver = %nameserver, "DNS provider selected");
        session.nameserver = Some(nameserver);
        Ok(Transition::Advance(Stage::PersistNetwork))
    }

    async fn persist_network(&mut self, session: &mut Session) -> Result<Transition> {
        let nameserver = session
            .nameserver
            .ok_or_else(|| Error::Other("nameserver not selected".to_string()))?;

        self.settings
            .append(&[
                Entry::text(keys::ROOT_HOST, session.domain.as_str()),
                Entry::text(keys::DNS_NAMESERVERS, nameserver.to_string()),
            ])
            .await?;

        info!(domain = %session.domain, nameserver = %nameserver, "Network settings committed");
        Ok(Transition::Advance(Stage::OptionalEmailSetup))
    }

    fn email_setup(&mut self) -> Result<Transition> {
        let answer = match self.ask("Set up email notifications through an SMTP server? [y/N]")? {
            Ok(answer) => answer,
            Err(transition) => return Ok(transition),
        };

        match validate::parse_yes_no(&answer, false) {
            Ok(true) => Ok(Transition::Advance(Stage::CollectSmtpFields)),
            Ok(false) => Ok(Transition::Advance(Stage::Finalize)),
            Err(rejection) => Ok(Transition::Retry(rejection)),
        }
    }

    async fn collect_smtp_fields(&mut self, session: &mut Session) -> Result<Transition> {
        let Some(host) = self.ask_field("SMTP server (e.g. smtp.gmail.com)", false, |answer| {
            validate::validate_required("SMTP server", answer)
        })?
        else {
            return Ok(Transition::Abort);
        };

        let port_question = format!("SMTP port [{}]", validate::DEFAULT_SMTP_PORT);
        let Some(port) = self.ask_field(&port_question, false, |answer| {
            Ok(validate::smtp_port_or_default(answer))
        })?
        else {
            return Ok(Transition::Abort);
        };

        let Some(login) = self.ask_field("SMTP login (usually your email address)", false, |answer| {
            validate::validate_required("SMTP login", answer).map(SecretString::from)
        })?
        else {
            return Ok(Transition::Abort);
        };

        let Some(password) = self.ask_field("SMTP password", true, |answer| {
            validate::validate_required("SMTP password", answer)?;
            Ok(SecretString::from(answer.to_string()))
        })?
        else {
            return Ok(Transition::Abort);
        };

        let Some(recipient) = self.ask_field(
            "Send notifications to (blank: the SMTP login)",
            false,
            |answer| Ok(validate::optional_recipient(answer)),
        )?
        else {
            return Ok(Transition::Abort);
        };

        let mut plain = vec![
            Entry::text(keys::EMAIL_SMTP_HOST, host.as_str()),
            Entry::text(keys::EMAIL_SMTP_PORT, port.as_str()),
        ];
        let mut secret = vec![
            Entry::text(keys::EMAIL_LOGIN, login.expose_secret()),
            Entry::text(keys::EMAIL_PASSWORD, password.expose_secret()),
        ];
        // The login is secret; a fallback recipient stays sealed with it
        match recipient {
            Some(ref address) => plain.push(Entry::text(keys::EMAIL, address.as_str())),
            None => secret.push(Entry::text(keys::EMAIL, login.expose_secret())),
        }

        self.settings.append(&plain).await?;
        self.secrets.commit(&secret).await?;

        info!(smtp_host = %host, smtp_port = %port, "Email settings committed");
        session.smtp = Some(SmtpSettings {
            host,
            port,
            login,
            password,
            recipient,
        });
        Ok(Transition::Advance(Stage::Finalize))
    }

    async fn finalize(&mut self) -> Result<Transition> {
        if self.config.seal_settings && !self.settings_sealed {
            let path = self.settings.path().to_path_buf();
            document::restrict_permissions(&path).await?;
            if !vault::is_sealed(&path).await? {
                self.secrets.vault().seal(&path).await?;
            }
            self.settings_sealed = true;
            self.prompter.notify(Notice::Success(format!(
                "Sealed {} and {}",
                path.display(),
                self.secrets.path().display()
            )));
        }

        let Some(handoff) = self.handoff.as_ref() else {
            return Ok(Transition::Advance(Stage::Done));
        };

        let question = format!("Run `{}` now? [y/N]", handoff.describe());
        let answer = match Self::prompted(self.prompter.ask(&question)?) {
            Ok(answer) => answer,
            Err(transition) => return Ok(transition),
        };
        let launch = match validate::parse_yes_no(&answer, false) {
            Ok(launch) => launch,
            Err(rejection) => return Ok(Transition::Retry(rejection)),
        };

        if !launch {
            self.prompter.notify(Notice::Info(format!(
                "Run `{}` when you are ready.",
                handoff.describe()
            )));
            return Ok(Transition::Advance(Stage::Done));
        }

        self.handoff_status = match handoff
            .launch(self.settings.path(), self.secrets.path())
            .await
        {
            Ok(report) => {
                if !report.succeeded() {
                    self.prompter.notify(Notice::Warning(format!(
                        "`{}` exited with {:?}",
                        report.command, report.exit_code
                    )));
                }
                HandoffStatus::Ran(report)
            }
            Err(e) => {
                warn!("Deployment hand-off failed: {}", e);
                self.prompter.notify(Notice::Warning(e.to_string()));
                HandoffStatus::Failed(e.to_string())
            }
        };

        Ok(Transition::Advance(Stage::Done))
    }
}
