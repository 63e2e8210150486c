//! Directory-per-run storage: `<root>/<run_id>/manifest.json` plus one
//! JSON line per snapshot.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::types::{RunManifest, TrajectorySnapshot};
use crate::{ResultsError, ResultsResult};

const MANIFEST: &str = "manifest.json";
const SNAPSHOTS: &str = "snapshots.jsonl";

fn to_jsonl<T: Serialize>(items: &[T]) -> ResultsResult<String> {
    let mut out = String::new();
    for item in items {
        out.push_str(&serde_json::to_string(item)?);
        out.push('\n');
    }
    Ok(out)
}

fn from_jsonl<T: DeserializeOwned>(content: &str) -> ResultsResult<Vec<T>> {
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| -> ResultsResult<T> { Ok(serde_json::from_str(l)?) })
        .collect()
}

#[derive(Clone, Debug)]
pub struct RunStore {
    root_dir: PathBuf,
}

impl RunStore {
    /// Open a store rooted at `root_dir`, creating the directory if needed.
    pub fn new(root_dir: PathBuf) -> ResultsResult<Self> {
        fs::create_dir_all(&root_dir)?;
        if !root_dir.is_dir() {
            return Err(ResultsError::InvalidPath {
                message: format!("{} is not a directory", root_dir.display()),
            });
        }
        Ok(Self { root_dir })
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    fn run_file(&self, run_id: &str, name: &str) -> PathBuf {
        self.root_dir.join(run_id).join(name)
    }

    fn existing_file(&self, run_id: &str, name: &str) -> ResultsResult<PathBuf> {
        let path = self.run_file(run_id, name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(ResultsError::RunNotFound {
                run_id: run_id.to_string(),
            })
        }
    }

    pub fn has_run(&self, run_id: &str) -> bool {
        self.run_file(run_id, MANIFEST).is_file()
    }

    /// Write a run. The manifest goes last, so a run only becomes visible
    /// once its snapshots are on disk. Saving an existing id overwrites it.
    pub fn save_run(
        &self,
        manifest: &RunManifest,
        snapshots: &[TrajectorySnapshot],
    ) -> ResultsResult<()> {
        fs::create_dir_all(self.root_dir.join(&manifest.run_id))?;
        fs::write(self.run_file(&manifest.run_id, SNAPSHOTS), to_jsonl(snapshots)?)?;
        fs::write(
            self.run_file(&manifest.run_id, MANIFEST),
            serde_json::to_string_pretty(manifest)?,
        )?;
        tracing::debug!(run_id = %manifest.run_id, snapshots = snapshots.len(), "run saved");
        Ok(())
    }

    pub fn load_manifest(&self, run_id: &str) -> ResultsResult<RunManifest> {
        let content = fs::read_to_string(self.existing_file(run_id, MANIFEST)?)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn load_snapshots(&self, run_id: &str) -> ResultsResult<Vec<TrajectorySnapshot>> {
        from_jsonl(&fs::read_to_string(self.existing_file(run_id, SNAPSHOTS)?)?)
    }

    /// Runs of one scenario, most recent first. Directories without a
    /// readable manifest are skipped.
    pub fn list_runs(&self, scenario: &str) -> ResultsResult<Vec<RunManifest>> {
        let mut runs = Vec::new();
        for entry in fs::read_dir(&self.root_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let run_id = entry.file_name().to_string_lossy().into_owned();
            if let Ok(manifest) = self.load_manifest(&run_id)
                && manifest.scenario == scenario
            {
                runs.push(manifest);
            }
        }
        runs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(runs)
    }

    /// Remove a run; unknown ids are ignored.
    pub fn delete_run(&self, run_id: &str) -> ResultsResult<()> {
        let dir = self.root_dir.join(run_id);
        if dir.is_dir() {
            fs::remove_dir_all(dir)?;
        }
        Ok(())
    }
}
