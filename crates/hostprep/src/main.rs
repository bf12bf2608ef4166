// # hostprep - host bootstrap wizard
//
// This binary is a THIN integration layer:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Running the environment preflight
// 4. Wiring the terminal, IP echo, resolver and deployment engine into the
//    wizard from hostprep-core
//
// All validation, persistence, sealing and DNS logic lives in hostprep-core.
//
// ## Configuration
//
// ### Documents
// - `HOSTPREP_SETTINGS_PATH`: plain configuration document (default `custom.yml`)
// - `HOSTPREP_SECRETS_PATH`: secret document (default `secret.yml`)
// - `HOSTPREP_SEAL_SETTINGS`: seal the plain document at the end (default true)
// - `HOSTPREP_VAULT_PASSPHRASE`: vault passphrase (prompted when unset)
//
// ### Network
// - `HOSTPREP_IP_ECHO_URL`: public IP echo service (default https://api.ipify.org)
// - `HOSTPREP_RESOLVER`: recursive resolver address (default 1.1.1.1)
// - `HOSTPREP_NETWORK_TIMEOUT_SECS`: per-call timeout, 1-120 (default 10)
// - `HOSTPREP_NETWORK_ATTEMPTS`: attempts per call, 1-10 (default 3)
//
// ### Wizard
// - `HOSTPREP_FEATURE_KEY`: document key for the optional feature toggle
// - `HOSTPREP_DEPLOY_COMMAND`: deployment engine command line
//
// ### Preflight
// - `HOSTPREP_PACKAGES`: comma-separated base packages
// - `HOSTPREP_SKIP_PREFLIGHT`: skip platform, root and package checks
// - `HOSTPREP_SKIP_PACKAGES`: skip package installation only
//
// ### Logging
// - `HOSTPREP_LOG_LEVEL`: trace, debug, info, warn (default), error
//
// ## Example
//
// ```bash
// sudo HOSTPREP_RESOLVER=9.9.9.9 hostprep
// ```

mod config;
mod passphrase;
mod terminal;

use anyhow::Result;
use colored::Colorize;
use config::Config;
use hostprep_core::preflight::{self, OS_RELEASE_PATH, OsRelease, PackageInstaller};
use hostprep_core::{
    CommandHandoff, DnsResolutionChecker, HandoffStatus, RetryPolicy, Vault, Wizard,
    WizardOutcome, WizardSummary,
};
use hostprep_ip_http::HttpIpSource;
use hostprep_resolver_hickory::HickoryResolver;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;
use terminal::TerminalPrompter;
use tracing::{error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
///
/// - 0: Wizard completed
/// - 1: Configuration or precondition failure
/// - 2: Runtime error (unexpected)
/// - 130: Aborted by the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HostprepExitCode {
    /// Both documents written (and the hand-off, if run, succeeded)
    Completed = 0,
    /// Configuration error, unsupported host or failed package install
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
    /// Operator cancelled (end of input or the abort keyword)
    Aborted = 130,
}

impl From<HostprepExitCode> for ExitCode {
    fn from(code: HostprepExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return HostprepExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return HostprepExitCode::ConfigError.into();
    }

    // Initialize tracing (stderr, so prompts on stdout stay readable)
    let log_level = match config.log_level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration validation error: {}", e);
            return HostprepExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return HostprepExitCode::ConfigError.into();
    }

    info!("Starting hostprep");

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return HostprepExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        match run(config).await {
            Ok(code) => code,
            Err(e) => {
                error!("hostprep failed: {:#}", e);
                eprintln!("{} {:#}", "error:".bright_red().bold(), e);
                exit_code_for(&e)
            }
        }
    });

    code.into()
}

/// Preconditions and package failures are configuration problems, not crashes
fn exit_code_for(error: &anyhow::Error) -> HostprepExitCode {
    match error.downcast_ref::<hostprep_core::Error>() {
        Some(hostprep_core::Error::Precondition(_))
        | Some(hostprep_core::Error::PackageInstall(_))
        | Some(hostprep_core::Error::Config(_)) => HostprepExitCode::ConfigError,
        _ => HostprepExitCode::RuntimeError,
    }
}

/// Run preflight, collect the passphrase and drive the wizard
async fn run(config: Config) -> Result<HostprepExitCode> {
    let wizard_config = config.wizard_config()?;

    if config.skip_preflight {
        warn!("Skipping preflight checks (HOSTPREP_SKIP_PREFLIGHT)");
    } else {
        OsRelease::load(Path::new(OS_RELEASE_PATH))
            .await?
            .ensure_supported()?;
        preflight::require_root()?;

        if config.skip_packages {
            warn!("Skipping package installation (HOSTPREP_SKIP_PACKAGES)");
        } else {
            PackageInstaller::new(wizard_config.packages.clone())
                .install()
                .await?;
        }
    }

    let mut prompter = TerminalPrompter::new();
    prompter.banner(&config.document_dir().display().to_string());

    let Some(passphrase) = passphrase::collect(config.vault_passphrase.as_ref(), &mut prompter)?
    else {
        warn!("Aborted before the wizard started");
        return Ok(HostprepExitCode::Aborted);
    };

    let network = &wizard_config.network;
    let timeout = Duration::from_secs(network.timeout_secs);
    let checker = DnsResolutionChecker::new(
        Box::new(HttpIpSource::with_timeout(network.ip_echo_url.clone(), timeout)),
        Box::new(HickoryResolver::new(network.resolver, timeout)),
        RetryPolicy::from(network),
    );

    let handoff = CommandHandoff::new(wizard_config.handoff.clone());
    let wizard = Wizard::new(
        wizard_config,
        Box::new(prompter),
        checker,
        Vault::new(passphrase),
    )?
    .with_handoff(Box::new(handoff));

    match wizard.run().await? {
        WizardOutcome::Completed(summary) => {
            print_summary(&summary);
            Ok(match summary.handoff {
                HandoffStatus::Ran(ref report) if !report.succeeded() => {
                    HostprepExitCode::RuntimeError
                }
                HandoffStatus::Failed(_) => HostprepExitCode::RuntimeError,
                _ => HostprepExitCode::Completed,
            })
        }
        WizardOutcome::Aborted { stage } => {
            println!();
            println!(
                "{} Aborted during {}. Documents written so far are discarded on the next run.",
                "!".bright_yellow().bold(),
                stage
            );
            Ok(HostprepExitCode::Aborted)
        }
    }
}

fn print_summary(summary: &WizardSummary) {
    println!();
    println!("{}", "Configuration complete".bright_green().bold());
    println!("  {} {}", "User:".bright_white().bold(), summary.username);
    println!("  {} {}", "Domain:".bright_white().bold(), summary.domain);
    println!("  {} {}", "DNS:".bright_white().bold(), summary.nameserver);
    println!(
        "  {} {}",
        "Email:".bright_white().bold(),
        if summary.email_configured {
            "configured"
        } else {
            "skipped"
        }
    );
    println!(
        "  {} {}",
        "Settings:".bright_white().bold(),
        if summary.settings_sealed {
            "sealed"
        } else {
            "plaintext"
        }
    );
}
