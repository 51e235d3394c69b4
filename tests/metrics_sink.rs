use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use chrono::Utc;
use testbed_controller::common::config::{ControllerConfig, MetricsSinkType};
use testbed_controller::server::loader::load_metrics_sink;
use testbed_controller::sink::file_sink::{FileMetricsSink, MetricsRecord};
use testbed_controller::sink::metrics_sink_impl::MetricsSinkImpl;
use testbed_controller::traits::metrics_sink::{MetricsSink, MonitorReport};
use uuid::Uuid;

fn report(topic: &str, payload: &'static [u8]) -> MonitorReport {
    MonitorReport {
        source_topic: topic.to_string(),
        received_at: Utc::now(),
        payload: Bytes::from_static(payload),
    }
}

#[tokio::test]
async fn file_sink_appends_json_lines() {
    let dir = std::env::temp_dir().join(format!("metrics-{}", Uuid::new_v4()));
    let path = dir.join("nested").join("monitor.jsonl");
    let sink = FileMetricsSink::new(&path);

    sink.record(&report("RESPONSE", b"\x00\x01binary")).await.unwrap();
    sink.record(&report("n2", br#"{"droppedPackets":4}"#)).await.unwrap();

    let contents = std::fs::read_to_string(sink.path()).unwrap();
    let records: Vec<MetricsRecord> = contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].source_topic, "RESPONSE");
    assert_eq!(
        general_purpose::STANDARD.decode(&records[0].payload_base64).unwrap(),
        b"\x00\x01binary"
    );
    assert_eq!(records[1].source_topic, "n2");
    assert!(chrono::DateTime::parse_from_rfc3339(&records[1].received_at).is_ok());

    std::fs::remove_dir_all(dir).unwrap();
}

#[test]
fn loader_picks_configured_sink() {
    let config = ControllerConfig::default();
    assert!(matches!(load_metrics_sink(&config).unwrap(), MetricsSinkImpl::Log(_)));

    let config = ControllerConfig {
        metrics_sink_type: MetricsSinkType::File,
        metrics_file_path: Some("target/monitor.jsonl".to_string()),
        ..ControllerConfig::default()
    };
    match load_metrics_sink(&config).unwrap() {
        MetricsSinkImpl::File(sink) => assert!(sink.path().ends_with("monitor.jsonl")),
        _ => panic!("expected file sink"),
    }

    let config = ControllerConfig {
        metrics_sink_type: MetricsSinkType::File,
        ..ControllerConfig::default()
    };
    assert!(load_metrics_sink(&config).is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_reports_land_on_whole_lines() {
    let dir = std::env::temp_dir().join(format!("metrics-{}", Uuid::new_v4()));
    let sink = FileMetricsSink::new(dir.join("monitor.jsonl"));

    let reports: Vec<MonitorReport> = (0..16).map(|_| report("RESPONSE", b"x y z")).collect();
    let results = futures::future::join_all(reports.iter().map(|r| sink.record(r))).await;
    assert!(results.iter().all(|r| r.is_ok()));

    let contents = std::fs::read_to_string(sink.path()).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 16);
    for line in lines {
        let record: MetricsRecord = serde_json::from_str(line).unwrap();
        assert_eq!(general_purpose::STANDARD.decode(record.payload_base64).unwrap(), b"x y z");
    }

    std::fs::remove_dir_all(dir).unwrap();
}
