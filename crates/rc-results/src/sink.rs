//! Destinations for published trajectories.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::ResultsResult;
use crate::types::TrajectorySnapshot;

/// Receives a snapshot after every solve or tick.
pub trait PlotSink: Send {
    fn publish(&mut self, snapshot: &TrajectorySnapshot) -> ResultsResult<()>;
}

/// Publish and log failures; a sink never interrupts the control loop.
pub fn publish_or_log(sink: &mut dyn PlotSink, snapshot: &TrajectorySnapshot) {
    if let Err(e) = sink.publish(snapshot) {
        tracing::warn!(error = %e, time_s = snapshot.time_s, "plot sink rejected snapshot");
    }
}

/// Keeps every snapshot in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub snapshots: Vec<TrajectorySnapshot>,
}

impl PlotSink for MemorySink {
    fn publish(&mut self, snapshot: &TrajectorySnapshot) -> ResultsResult<()> {
        self.snapshots.push(snapshot.clone());
        Ok(())
    }
}

/// Appends one JSON line per snapshot.
pub struct JsonlSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonlSink {
    pub fn create(path: &Path) -> ResultsResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PlotSink for JsonlSink {
    fn publish(&mut self, snapshot: &TrajectorySnapshot) -> ResultsResult<()> {
        let line = serde_json::to_string(snapshot)?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ResultsError;

    struct Broken;

    impl PlotSink for Broken {
        fn publish(&mut self, _: &TrajectorySnapshot) -> ResultsResult<()> {
            Err(ResultsError::InvalidPath {
                message: "closed".to_string(),
            })
        }
    }

    fn snapshot() -> TrajectorySnapshot {
        TrajectorySnapshot {
            time_s: 0.0,
            tick: None,
            status: "converged".to_string(),
            objective: 1.0,
            node_times: vec![0.0, 1.0],
            series: Vec::new(),
            params: Vec::new(),
        }
    }

    #[test]
    fn memory_sink_collects() {
        let mut sink = MemorySink::default();
        publish_or_log(&mut sink, &snapshot());
        publish_or_log(&mut sink, &snapshot());
        assert_eq!(sink.snapshots.len(), 2);
    }

    #[test]
    fn sink_errors_are_swallowed() {
        publish_or_log(&mut Broken, &snapshot());
    }
}
