//! Test doubles and common utilities for wizard contract tests
//!
//! Every collaborator that touches the outside world (terminal, IP echo,
//! resolver, deployment engine) is replaced by a scripted or recording
//! double so the wizard can be driven end to end inside a temp directory.

#![allow(dead_code)]

use async_trait::async_trait;
use hostprep_core::error::{Error, Result};
use hostprep_core::traits::{
    DomainResolver, Handoff, HandoffReport, Notice, Prompter, PublicIpSource, Reply,
};
use hostprep_core::{DnsResolutionChecker, Passphrase, RetryPolicy, Vault, WizardConfig};
use std::collections::{HashMap, VecDeque};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Public address used by most scenarios
pub const PUBLIC_IP: Ipv4Addr = Ipv4Addr::new(203, 0, 113, 10);

/// Passphrase used to seal documents in tests
pub const PASSPHRASE: &str = "correct horse battery staple";

/// Everything a scripted prompter saw
#[derive(Debug, Default)]
pub struct Transcript {
    /// Questions asked, in order (secret questions included)
    pub questions: Vec<String>,
    /// Notices shown, in order
    pub notices: Vec<Notice>,
}

impl Transcript {
    /// Rejection messages, in order
    pub fn rejections(&self) -> Vec<String> {
        self.notices
            .iter()
            .filter_map(|n| match n {
                Notice::Rejected(reason) => Some(reason.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Prompter that replays a fixed list of input lines
///
/// Lines go through [`Reply::from_bytes`] like terminal input, so `":abort"`
/// cancels and invalid UTF-8 is unreadable. Once the script runs out every
/// prompt sees end-of-input.
pub struct ScriptedPrompter {
    lines: VecDeque<Vec<u8>>,
    transcript: Arc<Mutex<Transcript>>,
}

impl ScriptedPrompter {
    /// Create a prompter and a handle to its transcript
    pub fn new<I, S>(lines: I) -> (Self, Arc<Mutex<Transcript>>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_raw(lines.into_iter().map(|line| line.into().into_bytes()))
    }

    /// Like [`ScriptedPrompter::new`], with raw bytes per line
    pub fn from_raw<I>(lines: I) -> (Self, Arc<Mutex<Transcript>>)
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        let transcript = Arc::new(Mutex::new(Transcript::default()));
        let prompter = Self {
            lines: lines.into_iter().collect(),
            transcript: Arc::clone(&transcript),
        };
        (prompter, transcript)
    }

    fn next(&mut self, question: &str) -> Reply {
        self.transcript
            .lock()
            .unwrap()
            .questions
            .push(question.to_string());
        match self.lines.pop_front() {
            Some(line) => Reply::from_bytes(&line),
            None => Reply::Cancel,
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, question: &str) -> Result<Reply> {
        Ok(self.next(question))
    }

    fn ask_secret(&mut self, question: &str) -> Result<Reply> {
        Ok(self.next(question))
    }

    fn notify(&mut self, notice: Notice) {
        self.transcript.lock().unwrap().notices.push(notice);
    }
}

/// IP echo double returning a fixed address (or failing)
pub struct FixedIpSource {
    result: std::result::Result<Ipv4Addr, String>,
    calls: Arc<AtomicUsize>,
}

impl FixedIpSource {
    /// Always report `ip`
    pub fn new(ip: Ipv4Addr) -> Self {
        Self {
            result: Ok(ip),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Always fail with a network error
    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared call counter
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl PublicIpSource for FixedIpSource {
    async fn public_ipv4(&self) -> Result<Ipv4Addr> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result
            .clone()
            .map_err(|message| Error::network("fixed-ip", message))
    }

    fn source_name(&self) -> &str {
        "fixed-ip"
    }
}

/// Resolver double backed by a static zone
pub struct StaticResolver {
    zone: HashMap<String, Vec<Ipv4Addr>>,
    calls: Arc<AtomicUsize>,
}

impl StaticResolver {
    /// Empty zone: every lookup is NXDOMAIN
    pub fn new() -> Self {
        Self {
            zone: HashMap::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Add A records for `domain`
    pub fn with_record(mut self, domain: &str, addrs: &[Ipv4Addr]) -> Self {
        self.zone.insert(domain.to_string(), addrs.to_vec());
        self
    }

    /// Shared call counter
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl DomainResolver for StaticResolver {
    async fn resolve_ipv4(&self, domain: &str) -> Result<Vec<Ipv4Addr>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.zone.get(domain) {
            Some(addrs) if !addrs.is_empty() => Ok(addrs.clone()),
            _ => Err(Error::not_found(format!("no A record for {}", domain))),
        }
    }

    fn resolver_name(&self) -> String {
        "static".to_string()
    }
}

/// One recorded hand-off launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launch {
    /// Plain document path passed in
    pub settings: PathBuf,
    /// Secret document path passed in
    pub secrets: PathBuf,
}

/// Hand-off double that records launches and returns a fixed exit code
pub struct RecordingHandoff {
    exit_code: i32,
    launches: Arc<Mutex<Vec<Launch>>>,
}

impl RecordingHandoff {
    /// Create a hand-off and a handle to its launches
    pub fn new(exit_code: i32) -> (Self, Arc<Mutex<Vec<Launch>>>) {
        let launches = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                exit_code,
                launches: Arc::clone(&launches),
            },
            launches,
        )
    }
}

#[async_trait]
impl Handoff for RecordingHandoff {
    async fn launch(&self, settings: &Path, secrets: &Path) -> Result<HandoffReport> {
        self.launches.lock().unwrap().push(Launch {
            settings: settings.to_path_buf(),
            secrets: secrets.to_path_buf(),
        });
        Ok(HandoffReport {
            command: self.describe(),
            exit_code: Some(self.exit_code),
        })
    }

    fn describe(&self) -> String {
        "deploy-engine run.yml".to_string()
    }
}

/// Vault sealing with [`PASSPHRASE`]
pub fn test_vault() -> Vault {
    Vault::new(Passphrase::new(PASSPHRASE).unwrap())
}

/// Default configuration with both documents inside `dir`
pub fn test_config(dir: &Path) -> WizardConfig {
    WizardConfig::new().with_document_dir(dir)
}

/// Fast retry policy for tests
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        timeout: Duration::from_secs(1),
        max_attempts: 2,
        retry_delay: Duration::from_millis(1),
    }
}

/// Checker wired to the given doubles
pub fn checker(ip_source: FixedIpSource, resolver: StaticResolver) -> DnsResolutionChecker {
    DnsResolutionChecker::new(Box::new(ip_source), Box::new(resolver), fast_policy())
}

/// Checker where `domain` resolves to [`PUBLIC_IP`]
pub fn matching_checker(domain: &str) -> DnsResolutionChecker {
    checker(
        FixedIpSource::new(PUBLIC_IP),
        StaticResolver::new().with_record(domain, &[PUBLIC_IP]),
    )
}

/// Script for the happy path up to (and including) declining email
pub fn happy_path_script(domain: &str) -> Vec<String> {
    ["alice", "hunter22", "hunter22", "n", domain, "1", "n"]
        .into_iter()
        .map(String::from)
        .collect()
}
