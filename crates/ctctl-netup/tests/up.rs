//! Integration tests for the "up" handler.
mod common;

use common::{HOOK, Op, RecordingAdvertiser, RecordingHost, device_config, ip, run};
use ctctl_common::{CtctlError, ErrorCategory};
use ctctl_netup::config::ConfigResolver;
use ctctl_netup::Orchestrator;
use ctctl_network::IpFamily;
use proptest::prelude::*;

const SINGLE: &str = "lxc.net.0.ipv4.address = 203.0.113.5/24\n\
                      lxc.net.0.ipv4.gateway = 203.0.113.1\n";

#[test_log::test]
fn routes_single_address() {
    let host = RecordingHost::new().with_upstream("203.0.113.5", "eth0");
    let advertiser = RecordingAdvertiser::new();

    let report = run(&host, &advertiser, "up", &device_config(SINGLE)).unwrap();

    assert_eq!(
        host.ops(),
        [
            Op::ProxyNdp("all".into()),
            Op::ReplaceProxy(ip("203.0.113.1"), "vethABC123".into()),
            Op::ReplaceRoute(ip("203.0.113.5"), "vethABC123".into()),
            Op::ReplaceProxy(ip("203.0.113.5"), "eth0".into()),
        ]
    );
    assert_eq!(advertiser.sent(), [("eth0".to_string(), ip("203.0.113.5"))]);
    assert_eq!(report.bindings.len(), 1);
    assert_eq!(report.bindings[0].upstream, "eth0");
    assert!(report.skipped.is_empty());
    assert_eq!(report.gateways.len(), 1);
}

#[test]
fn missing_gateway_changes_nothing() {
    let host = RecordingHost::new().with_upstream("203.0.113.5", "eth0");
    let advertiser = RecordingAdvertiser::new();
    let config = device_config("lxc.net.0.ipv4.address = 203.0.113.5/24\n");

    let err = run(&host, &advertiser, "up", &config).unwrap_err();

    assert!(matches!(err, CtctlError::NoGateways { .. }));
    assert_eq!(err.category(), ErrorCategory::Configuration);
    assert!(host.ops().is_empty());
    assert!(advertiser.sent().is_empty());
}

#[test]
fn only_malformed_addresses_changes_nothing() {
    let host = RecordingHost::new().with_upstream("203.0.113.5", "eth0");
    let advertiser = RecordingAdvertiser::new();
    let config = device_config(
        "lxc.net.0.ipv4.address = 203.0.113.5\n\
         lxc.net.0.ipv4.gateway = 203.0.113.1\n",
    );

    let err = run(&host, &advertiser, "up", &config).unwrap_err();

    assert!(matches!(err, CtctlError::NoAddresses { .. }));
    assert!(host.ops().is_empty());
}

#[test]
fn malformed_entry_does_not_block_the_rest() {
    let host = RecordingHost::new().with_upstream("203.0.113.6", "eth0");
    let advertiser = RecordingAdvertiser::new();
    let config = device_config(
        "lxc.net.0.ipv4.address = 203.0.113.5\n\
         lxc.net.0.ipv4.address = 203.0.113.6/24\n\
         lxc.net.0.ipv4.gateway = 203.0.113.1\n",
    );

    let report = run(&host, &advertiser, "up", &config).unwrap();

    assert_eq!(report.bindings.len(), 1);
    assert_eq!(report.bindings[0].address.address, ip("203.0.113.6"));
}

#[test_log::test]
fn unroutable_address_is_skipped() {
    let host = RecordingHost::new().with_upstream("203.0.113.5", "eth0");
    let advertiser = RecordingAdvertiser::new();
    let config = device_config(
        "lxc.net.0.ipv4.address = 203.0.113.5/24\n\
         lxc.net.0.ipv6.address = 2001:db8::5/64\n\
         lxc.net.0.ipv4.gateway = 203.0.113.1\n\
         lxc.net.0.ipv6.gateway = fe80::1\n",
    );

    let report = run(&host, &advertiser, "up", &config).unwrap();

    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].address, ip("2001:db8::5"));
    assert!(!host.routes().contains_key(&ip("2001:db8::5")));
    assert_eq!(advertiser.sent(), [("eth0".to_string(), ip("203.0.113.5"))]);

    // Both gateways are still answered for on the veth.
    assert!(host.proxies().contains(&(ip("fe80::1"), "vethABC123".to_string())));
    assert!(host.proxies().contains(&(ip("203.0.113.1"), "vethABC123".to_string())));
}

#[test]
fn nothing_routable_fails_before_mutation() {
    let host = RecordingHost::new();
    let advertiser = RecordingAdvertiser::new();

    let err = run(&host, &advertiser, "up", &device_config(SINGLE)).unwrap_err();

    assert!(matches!(err, CtctlError::NoRoutableAddresses { .. }));
    assert_eq!(err.category(), ErrorCategory::Resolution);
    assert!(host.ops().is_empty());
}

#[test]
fn addresses_on_distinct_upstreams() {
    let host = RecordingHost::new()
        .with_upstream("203.0.113.5", "eth0")
        .with_upstream("2001:db8::5", "eth1");
    let advertiser = RecordingAdvertiser::new();
    let config = device_config(
        "lxc.net.0.ipv4.address = 203.0.113.5/24\n\
         lxc.net.0.ipv6.address = 2001:db8::5/64\n\
         lxc.net.0.ipv6.gateway = fe80::1\n",
    );

    run(&host, &advertiser, "up", &config).unwrap();

    assert_eq!(
        host.proxies(),
        [
            (ip("203.0.113.5"), "eth0".to_string()),
            (ip("2001:db8::5"), "eth1".to_string()),
            (ip("fe80::1"), "vethABC123".to_string()),
        ]
    );
    assert_eq!(host.routes().len(), 2);
    // IPv4 is handled first.
    assert_eq!(
        advertiser.sent(),
        [
            ("eth0".to_string(), ip("203.0.113.5")),
            ("eth1".to_string(), ip("2001:db8::5")),
        ]
    );
}

#[test]
fn repeated_up_converges() {
    let host = RecordingHost::new().with_upstream("203.0.113.5", "eth0");
    let advertiser = RecordingAdvertiser::new();
    let config = device_config(SINGLE);

    run(&host, &advertiser, "up", &config).unwrap();
    let (routes, proxies, first_ops) = (host.routes(), host.proxies(), host.ops());
    host.clear_ops();

    // The host route now points at the veth; the upstream comes from the
    // existing proxy entry.
    let report = run(&host, &advertiser, "up", &config).unwrap();

    assert_eq!(report.bindings[0].upstream, "eth0");
    assert_eq!(host.ops(), first_ops);
    assert_eq!(host.routes(), routes);
    assert_eq!(host.proxies(), proxies);
}

#[test]
fn kernel_failure_aborts_before_advertising() {
    let host = RecordingHost::new().with_upstream("203.0.113.5", "eth0");
    host.fail_on(Op::ReplaceProxy(ip("203.0.113.5"), "eth0".into()));
    let advertiser = RecordingAdvertiser::new();

    let err = run(&host, &advertiser, "up", &device_config(SINGLE)).unwrap_err();

    assert_eq!(err.category(), ErrorCategory::KernelOperation);
    assert!(advertiser.sent().is_empty());
    // No rollback of what was already applied.
    assert_eq!(host.routes().get(&ip("203.0.113.5")).map(String::as_str), Some("vethABC123"));
}

#[test]
fn proxy_ndp_failure_is_fatal() {
    let host = RecordingHost::new().with_upstream("203.0.113.5", "eth0");
    host.fail_on(Op::ProxyNdp("all".into()));
    let advertiser = RecordingAdvertiser::new();

    let err = run(&host, &advertiser, "up", &device_config(SINGLE)).unwrap_err();

    assert!(matches!(err, CtctlError::KernelOperation { .. }));
    assert_eq!(host.ops(), [Op::ProxyNdp("all".into())]);
}

#[test]
fn advertisement_failure_is_fatal() {
    let host = RecordingHost::new().with_upstream("203.0.113.5", "eth0");
    let advertiser = RecordingAdvertiser::failing();

    let err = run(&host, &advertiser, "up", &device_config(SINGLE)).unwrap_err();

    assert!(matches!(err, CtctlError::Transmission { ref device, .. } if device == "eth0"));
    assert_eq!(err.category(), ErrorCategory::Transmission);
}

#[test]
fn nonlocal_bind_for_routed_families_only() {
    let host = RecordingHost::new().with_upstream("203.0.113.5", "eth0");
    let advertiser = RecordingAdvertiser::new();
    let ctx = common::context("up");

    Orchestrator::new(&host, &advertiser, ConfigResolver::new(HOOK))
        .with_nonlocal_bind(true)
        .run(&ctx, &device_config(SINGLE))
        .unwrap();

    let ops = host.ops();
    assert_eq!(ops[0], Op::ProxyNdp("all".into()));
    assert_eq!(ops[1], Op::NonlocalBind(IpFamily::V4));
    assert!(!ops.contains(&Op::NonlocalBind(IpFamily::V6)));
}

#[test]
fn other_hook_is_not_matched() {
    let host = RecordingHost::new().with_upstream("203.0.113.5", "eth0");
    let advertiser = RecordingAdvertiser::new();
    let ctx = common::context("up");

    let err = Orchestrator::new(&host, &advertiser, ConfigResolver::new("/usr/local/bin/other"))
        .run(&ctx, &device_config(SINGLE))
        .unwrap_err();

    assert!(matches!(err, CtctlError::NoMatchingDevice { .. }));
    assert!(host.ops().is_empty());
}

proptest! {
    #[test]
    fn every_routable_address_is_routed(hosts in prop::collection::btree_set(1u8..=254, 1..8)) {
        let mut host = RecordingHost::new();
        let mut lines = String::from("lxc.net.0.ipv4.gateway = 198.51.100.254\n");
        for h in &hosts {
            host = host.with_upstream(&format!("198.51.100.{h}"), "eth0");
            lines.push_str(&format!("lxc.net.0.ipv4.address = 198.51.100.{h}/24\n"));
        }
        let advertiser = RecordingAdvertiser::new();

        let report = run(&host, &advertiser, "up", &device_config(&lines)).unwrap();

        prop_assert_eq!(report.bindings.len(), hosts.len());
        prop_assert_eq!(host.routes().len(), hosts.len());
        prop_assert_eq!(advertiser.sent().len(), hosts.len());
    }
}
