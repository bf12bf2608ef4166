//! Contract Test: DNS Resolution Check
//!
//! Constraints verified:
//! - Acceptance is monotonic: a domain is accepted iff one of its A records
//!   equals the public address; every other outcome is rejected
//! - Both services are queried fresh on every check (no caching)
//! - Echo-service failure and missing records give different messages
//! - An unavailable service keeps the wizard in the domain stage
//!
//! If this test fails, the wizard may accept a domain that does not point here.

mod common;

use common::*;
use hostprep_core::document::{self, Entry};
use hostprep_core::{CheckOutcome, Stage, Wizard, WizardOutcome};
use std::net::Ipv4Addr;
use std::sync::atomic::Ordering;
use tempfile::tempdir;

const DOMAIN: &str = "vpn.example.com";

#[tokio::test]
async fn acceptance_holds_iff_a_record_equals_public_ip() {
    let other = Ipv4Addr::new(198, 51, 100, 7);
    let cases: Vec<(Option<Vec<Ipv4Addr>>, bool)> = vec![
        (Some(vec![PUBLIC_IP]), true),
        (Some(vec![other, PUBLIC_IP]), true),
        (Some(vec![other]), false),
        (Some(vec![Ipv4Addr::new(203, 0, 113, 11)]), false),
        (None, false),
    ];

    for (records, accepted) in cases {
        let resolver = match &records {
            Some(addrs) => StaticResolver::new().with_record(DOMAIN, addrs),
            None => StaticResolver::new(),
        };
        let checker = checker(FixedIpSource::new(PUBLIC_IP), resolver);
        let outcome = checker.check(DOMAIN).await;

        assert_eq!(outcome.is_match(), accepted, "records {records:?}");
        assert_eq!(outcome.verdict(DOMAIN).is_ok(), accepted, "records {records:?}");
    }
}

#[tokio::test]
async fn input_is_normalized_before_lookup() {
    let checker = matching_checker(DOMAIN);
    assert_eq!(
        checker.check("  VPN.Example.COM. ").await,
        CheckOutcome::Match(PUBLIC_IP)
    );
}

#[tokio::test]
async fn every_check_queries_both_services() {
    let ip_source = FixedIpSource::new(PUBLIC_IP);
    let resolver = StaticResolver::new().with_record(DOMAIN, &[PUBLIC_IP]);
    let (ip_calls, dns_calls) = (ip_source.calls(), resolver.calls());
    let checker = checker(ip_source, resolver);

    for _ in 0..3 {
        assert!(checker.check(DOMAIN).await.is_match());
    }
    assert_eq!(ip_calls.load(Ordering::SeqCst), 3);
    assert_eq!(dns_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn failure_kinds_have_distinct_messages() {
    let unavailable = checker(
        FixedIpSource::failing("connection refused"),
        StaticResolver::new().with_record(DOMAIN, &[PUBLIC_IP]),
    )
    .check(DOMAIN)
    .await;
    let not_found = checker(FixedIpSource::new(PUBLIC_IP), StaticResolver::new())
        .check(DOMAIN)
        .await;
    let mismatch = checker(
        FixedIpSource::new(PUBLIC_IP),
        StaticResolver::new().with_record(DOMAIN, &[Ipv4Addr::new(198, 51, 100, 7)]),
    )
    .check(DOMAIN)
    .await;

    assert!(matches!(unavailable, CheckOutcome::Unavailable { .. }));
    assert_eq!(not_found, CheckOutcome::NotFound);
    assert!(matches!(mismatch, CheckOutcome::Mismatch { .. }));

    let messages: Vec<String> = [unavailable, not_found, mismatch]
        .iter()
        .map(|o| o.verdict(DOMAIN).unwrap_err().reason().to_string())
        .collect();
    assert!(messages[0].contains("unavailable"));
    assert!(messages[1].contains("does not resolve"));
    assert!(messages[2].contains("198.51.100.7"));
    assert_ne!(messages[0], messages[1]);
    assert_ne!(messages[1], messages[2]);
}

#[tokio::test]
async fn transient_failures_are_retried_a_bounded_number_of_times() {
    let ip_source = FixedIpSource::failing("timeout talking to echo");
    let ip_calls = ip_source.calls();
    let checker = checker(ip_source, StaticResolver::new());

    let outcome = checker.check(DOMAIN).await;

    assert!(matches!(outcome, CheckOutcome::Unavailable { .. }));
    assert_eq!(ip_calls.load(Ordering::SeqCst), fast_policy().max_attempts);
}

#[tokio::test]
async fn unavailable_echo_service_keeps_wizard_on_domain_stage() {
    let dir = tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.seal_settings = false;

    let mut script = happy_path_script(DOMAIN);
    script.truncate(5);
    script.push(":abort".to_string());
    let (prompter, transcript) = ScriptedPrompter::new(script);

    let outcome = Wizard::new(
        config.clone(),
        Box::new(prompter),
        checker(
            FixedIpSource::failing("connection refused"),
            StaticResolver::new().with_record(DOMAIN, &[PUBLIC_IP]),
        ),
        test_vault(),
    )
    .unwrap()
    .run()
    .await
    .unwrap();

    assert_eq!(
        outcome,
        WizardOutcome::Aborted {
            stage: Stage::CollectDomain
        }
    );
    let rejections = transcript.lock().unwrap().rejections();
    assert_eq!(rejections.len(), 1);
    assert!(rejections[0].contains("unavailable"));

    let plain = document::read_entries(&std::fs::read_to_string(&config.settings_path).unwrap())
        .unwrap();
    assert!(!plain.iter().any(|e| e.key == "root_host"));
    assert_eq!(plain[0], Entry::text("username", "alice"));
}
