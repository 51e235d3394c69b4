use std::fs::{OpenOptions, create_dir_all};
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::{Engine as _, engine::general_purpose};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::traits::metrics_sink::{MetricsSink, MonitorReport};

/// One line of the metrics file.
#[derive(Debug, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub source_topic: String,
    pub received_at: String,
    pub payload_base64: String,
}

impl From<&MonitorReport> for MetricsRecord {
    fn from(report: &MonitorReport) -> Self {
        Self {
            source_topic: report.source_topic.clone(),
            received_at: report.received_at.to_rfc3339(),
            payload_base64: general_purpose::STANDARD.encode(&report.payload),
        }
    }
}

/// Appends monitoring responses to a JSON-lines file.
#[derive(Debug)]
pub struct FileMetricsSink {
    path: PathBuf,
}

impl FileMetricsSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_owned(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MetricsSink for FileMetricsSink {
    async fn record(&self, report: &MonitorReport) -> anyhow::Result<()> {
        let mut line = serde_json::to_vec(&MetricsRecord::from(report))?;
        line.push(b'\n');

        // File locking blocks; keep it off the controller task.
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || append_line(&path, &line)).await??;
        log::debug!("Appended monitor report from {} to {:?}", report.source_topic, self.path);
        Ok(())
    }
}

fn append_line(path: &Path, line: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            create_dir_all(parent)?;
        }
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.lock_exclusive()?;
    file.write_all(line)?;
    file.flush()?;
    FileExt::unlock(&file)?;
    Ok(())
}
