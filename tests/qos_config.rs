use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use testbed_controller::common::error::ControllerError;
use testbed_controller::qos::builder::QosConfigBuilder;
use testbed_controller::qos::codec;
use testbed_controller::qos::model::{FiveTuple, PacketHeader, Protocol, TrafficClass};
use testbed_controller::qos::policy::{FallbackPolicy, PolicyTable, TrafficPolicy};
use uuid::Uuid;

fn ip(a: u8, b: u8, c: u8, d: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(a, b, c, d))
}

fn tcp(src: IpAddr, dst: IpAddr, src_port: u16, dst_port: u16) -> PacketHeader {
    PacketHeader {
        src_addr: src,
        dst_addr: dst,
        protocol: Protocol::Tcp,
        src_port: Some(src_port),
        dst_port: Some(dst_port),
    }
}

fn small_table() -> PolicyTable {
    PolicyTable {
        band_count: 2,
        queue_limit: 10,
        policies: vec![TrafficPolicy {
            name: "ssh".to_string(),
            matcher: FiveTuple {
                protocol: Some(Protocol::Tcp),
                dst_port: Some(22),
                ..FiveTuple::default()
            },
            traffic_class: TrafficClass::Video,
            band: 0,
            priority: 1,
        }],
        fallback: FallbackPolicy {
            name: "rest".to_string(),
            traffic_class: TrafficClass::BestEffort,
            band: 1,
        },
    }
}

#[test]
fn builtin_config_satisfies_structural_invariants() {
    let mut builder = QosConfigBuilder::new(PolicyTable::builtin().unwrap()).unwrap();
    let config = builder.config();
    config.validate().unwrap();

    let scheduler = &config.scheduler;
    assert_eq!(scheduler.band_count, 6);
    let bands: HashSet<u8> = scheduler.queues.iter().map(|q| q.band).collect();
    assert_eq!(bands, (0..6).collect::<HashSet<u8>>());
    assert!(scheduler.queues.iter().all(|q| q.limit == 100));

    for filter in &scheduler.filters {
        assert!(config.queue(filter.target_queue).is_some(), "{} dangles", filter.name);
    }

    let catch_alls: Vec<_> = scheduler.filters.iter().filter(|f| f.matcher.is_wildcard()).collect();
    assert_eq!(catch_alls.len(), 1);
    assert_eq!(catch_alls[0].name, "Default_filter");
    assert_eq!(catch_alls[0].priority, 2);
    assert_eq!(config.evaluation_order().last().unwrap().name, "Default_filter");
}

#[test]
fn builder_constructs_once_and_caches() {
    let mut builder = QosConfigBuilder::new(small_table()).unwrap();
    assert!(!builder.is_built());
    let first = builder.config();
    assert!(builder.is_built());
    let second = builder.config();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn classify_follows_evaluation_order() {
    let mut builder = QosConfigBuilder::new(PolicyTable::builtin().unwrap()).unwrap();
    let config = builder.config();

    let mesh = PacketHeader {
        src_addr: ip(10, 1, 1, 1),
        dst_addr: ip(10, 1, 1, 2),
        protocol: Protocol::Udp,
        src_port: Some(698),
        dst_port: Some(698),
    };
    let filter = config.classify(&mesh).unwrap();
    assert_eq!(filter.name, "Mesh_Control_Traffic");
    assert_eq!(filter.traffic_class, TrafficClass::Voice);
    assert_eq!(config.queue_for(&mesh).unwrap().band, 0);

    // Matches both SUT_Control_Traffic and Background_Monitoring_Traffic;
    // equal priority, so declaration order wins.
    let sut = tcp(ip(192, 168, 1, 1), ip(192, 168, 2, 1), 3333, 4444);
    assert_eq!(config.classify(&sut).unwrap().name, "SUT_Control_Traffic");

    let monitoring = tcp(ip(192, 168, 9, 9), ip(192, 168, 2, 1), 40000, 2222);
    assert_eq!(config.classify(&monitoring).unwrap().name, "SUT_Experiment_Monitoring_Traffic");
    assert_eq!(config.queue_for(&monitoring).unwrap().band, 4);

    let other = tcp(ip(8, 8, 8, 8), ip(1, 1, 1, 1), 443, 443);
    assert_eq!(config.classify(&other).unwrap().name, "Default_filter");
    assert_eq!(config.queue_for(&other).unwrap().band, 5);
}

#[test]
fn port_rules_never_match_portless_packets() {
    let rule = FiveTuple {
        dst_port: Some(698),
        ..FiveTuple::default()
    };
    let icmp = PacketHeader {
        src_addr: ip(10, 0, 0, 1),
        dst_addr: ip(10, 0, 0, 2),
        protocol: Protocol::Icmp,
        src_port: None,
        dst_port: None,
    };
    assert!(!rule.matches(&icmp));
    assert!(FiveTuple::wildcard().matches(&icmp));
}

#[test]
fn fallback_priority_follows_highest_policy_priority() {
    let mut table = small_table();
    table.policies[0].priority = 7;
    let mut builder = QosConfigBuilder::new(table).unwrap();
    let config = builder.config();
    assert_eq!(config.catch_all().unwrap().priority, 8);
    config.validate().unwrap();
}

#[test]
fn policy_validation_rejects_bad_tables() {
    let mut wildcard = small_table();
    wildcard.policies[0].matcher = FiveTuple::wildcard();
    assert!(matches!(wildcard.validate(), Err(ControllerError::InvalidPolicy(_))));

    let mut out_of_range = small_table();
    out_of_range.policies[0].band = 2;
    assert!(matches!(out_of_range.validate(), Err(ControllerError::InvalidPolicy(_))));

    let mut no_bands = small_table();
    no_bands.band_count = 0;
    assert!(matches!(no_bands.validate(), Err(ControllerError::InvalidPolicy(_))));

    let mut fallback = small_table();
    fallback.fallback.band = 9;
    assert!(matches!(fallback.validate(), Err(ControllerError::InvalidPolicy(_))));

    assert!(matches!(
        PolicyTable::from_json("{\"band_count\": 1}"),
        Err(ControllerError::InvalidPolicy(_))
    ));
}

#[test]
fn policy_table_loads_from_file() {
    let path = std::env::temp_dir().join(format!("policy-{}.json", Uuid::new_v4()));
    std::fs::write(&path, serde_json::to_string_pretty(&small_table()).unwrap()).unwrap();

    let table = PolicyTable::load(path.to_str().unwrap()).unwrap();
    assert_eq!(table, small_table());
    std::fs::remove_file(&path).unwrap();

    assert!(matches!(
        PolicyTable::load("/nonexistent/policy.json"),
        Err(ControllerError::Io(_))
    ));
}

#[test]
fn builder_refuses_tables_that_fail_validation() {
    let mut table = PolicyTable::builtin().unwrap();
    table.fallback.band = 9;
    assert!(matches!(QosConfigBuilder::new(table), Err(ControllerError::InvalidPolicy(_))));

    let mut table = small_table();
    table.policies[0].priority = u32::MAX;
    assert!(matches!(QosConfigBuilder::new(table), Err(ControllerError::InvalidPolicy(_))));
}

#[test]
fn names_must_fit_the_wire_format() {
    let mut longest = small_table();
    longest.fallback.name = "f".repeat(u16::MAX as usize);
    let mut builder = QosConfigBuilder::new(longest).unwrap();
    let config = builder.config();
    assert_eq!(codec::decode(&codec::encode(&config)).unwrap(), *config);

    let mut fallback = small_table();
    fallback.fallback.name = "f".repeat(70_000);
    assert!(matches!(fallback.validate(), Err(ControllerError::InvalidPolicy(_))));

    let mut policy = small_table();
    policy.policies[0].name = "p".repeat(u16::MAX as usize + 1);
    assert!(matches!(policy.validate(), Err(ControllerError::InvalidPolicy(_))));

    let mut builder = QosConfigBuilder::new(small_table()).unwrap();
    let mut config = builder.config().as_ref().clone();
    config.scheduler.filters[0].name = "x".repeat(u16::MAX as usize + 1);
    assert!(matches!(config.validate(), Err(ControllerError::MalformedConfig(_))));
}

#[test]
fn policy_count_must_fit_the_wire_format() {
    let mut table = small_table();
    let template = table.policies[0].clone();
    table.policies = (0..u16::MAX)
        .map(|i| TrafficPolicy {
            name: format!("policy_{}", i),
            ..template.clone()
        })
        .collect();
    assert!(matches!(table.validate(), Err(ControllerError::InvalidPolicy(_))));

    table.policies.pop();
    table.validate().unwrap();
}
