use std::io::Write;

use testbed_controller::common::config::{ControllerConfig, MetricsSinkType, load_controller_config};
use testbed_controller::server::loader::load_policy_table;
use uuid::Uuid;

#[test]
fn missing_file_yields_defaults() {
    let path = std::env::temp_dir().join(format!("absent-{}", Uuid::new_v4()));
    let config = load_controller_config(path.to_str().unwrap()).unwrap();
    assert_eq!(config.channel, 11);
    assert_eq!(config.echo_interval_ms, 3_000);
    assert_eq!(config.echo_timeout_ms, 10_000);
    assert_eq!(config.exit_grace_multiplier, 3);
    assert_eq!(config.monitor_parameters, vec!["droppedPackets".to_string()]);
    assert_eq!(config.metrics_sink_type, MetricsSinkType::Log);
}

#[test]
fn file_values_override_defaults() {
    let path = std::env::temp_dir().join(format!("controller-{}.toml", Uuid::new_v4()));
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        r#"
uplink_endpoint = "127.0.0.1:7000"
channel = 6
echo_interval_ms = 500
monitor_parameters = ["droppedPackets", "txRate"]
metrics_sink_type = "file"
metrics_file_path = "out/monitor.jsonl"
"#
    )
    .unwrap();
    drop(file);

    let config = load_controller_config(path.to_str().unwrap()).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(config.uplink_endpoint, "127.0.0.1:7000");
    assert_eq!(config.downlink_endpoint, "0.0.0.0:8990");
    assert_eq!(config.channel, 6);
    assert_eq!(config.echo_interval().as_millis(), 500);
    assert_eq!(config.monitor_parameters.len(), 2);
    assert_eq!(config.metrics_sink_type, MetricsSinkType::File);
    assert_eq!(config.metrics_file_path.as_deref(), Some("out/monitor.jsonl"));
}

#[test]
fn validate_rejects_unusable_settings() {
    assert!(ControllerConfig::default().validate().is_ok());

    let bad = [
        ControllerConfig {
            exit_grace_multiplier: 0,
            ..ControllerConfig::default()
        },
        ControllerConfig {
            echo_interval_ms: 0,
            ..ControllerConfig::default()
        },
        ControllerConfig {
            uplink_endpoint: " ".to_string(),
            ..ControllerConfig::default()
        },
        ControllerConfig {
            metrics_sink_type: MetricsSinkType::File,
            ..ControllerConfig::default()
        },
    ];
    for config in bad {
        assert!(config.validate().is_err(), "{:?}", config);
    }
}

#[test]
fn policy_path_falls_back_to_builtin() {
    let table = load_policy_table(&ControllerConfig::default()).unwrap();
    assert_eq!(table.band_count, 6);

    let config = ControllerConfig {
        policy_path: Some("does/not/exist.json".to_string()),
        ..ControllerConfig::default()
    };
    assert!(load_policy_table(&config).is_err());
}
