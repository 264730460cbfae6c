//! Per-device output files under `output/<group>/`

use crate::Result;
use chrono::NaiveDate;
use log::info;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Writes device artifacts and remembers what this run produced
#[derive(Debug)]
pub struct ArtifactStore {
    root: PathBuf,
    written: Vec<PathBuf>,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            written: Vec::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn group_dir(&self, group: &str) -> PathBuf {
        self.root.join(file_name_safe(group))
    }

    /// Create `output/<group>` if needed
    pub fn prepare_group(&self, group: &str) -> Result<PathBuf> {
        let dir = self.group_dir(group);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Write `<group>/<name>.xml`. The first write in a run replaces any
    /// file left by an earlier run; later writes to the same path append.
    pub fn write_device(&mut self, group: &str, name: &str, content: &str) -> Result<PathBuf> {
        let dir = self.prepare_group(group)?;
        let path = dir.join(format!("{}.xml", file_name_safe(name)));

        let mut file = if self.written.contains(&path) {
            OpenOptions::new().append(true).open(&path)?
        } else {
            File::create(&path)?
        };
        file.write_all(content.as_bytes())?;
        file.flush()?;

        if !self.written.contains(&path) {
            self.written.push(path.clone());
        }
        Ok(path)
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Concatenate this run's artifacts into `install_base_<YYYYMMDD>.txt`.
    /// Nothing is written when the run produced no artifacts.
    pub fn write_aggregate(&self, date: NaiveDate) -> Result<Option<PathBuf>> {
        if self.written.is_empty() {
            return Ok(None);
        }

        fs::create_dir_all(&self.root)?;
        let path = self
            .root
            .join(format!("install_base_{}.txt", date.format("%Y%m%d")));
        let mut aggregate = File::create(&path)?;

        for artifact in &self.written {
            let content = fs::read(artifact)?;
            aggregate.write_all(&content)?;
            if !content.ends_with(b"\n") {
                aggregate.write_all(b"\n")?;
            }
        }
        aggregate.flush()?;

        info!(
            "Wrote {} device artifacts to {}",
            self.written.len(),
            path.display()
        );
        Ok(Some(path))
    }
}

/// Keep names inside their directory
fn file_name_safe(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}
