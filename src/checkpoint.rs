//! Durable per-pipeline record of completed input files
//!
//! The store is a JSON array of canonical input paths kept in
//! `<dir>/<pipeline>.checkpoint.json`. Every mutation rewrites the file through
//! a temp file in the same directory, fsyncs it and renames it into place, so
//! a crash leaves either the old or the new set on disk.

use std::collections::HashSet;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::CheckpointError;

#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    completed: HashSet<String>,
}

impl CheckpointStore {
    /// Load (or start) the checkpoint for `pipeline` under `dir`
    pub fn open(dir: &Path, pipeline: &str) -> Result<Self, CheckpointError> {
        let path = dir.join(format!("{}.checkpoint.json", pipeline));
        let completed = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| CheckpointError::Read {
                path: path.clone(),
                message: e.to_string(),
            })?;
            if content.trim().is_empty() {
                HashSet::new()
            } else {
                let ids: Vec<String> =
                    serde_json::from_str(&content).map_err(|e| CheckpointError::Read {
                        path: path.clone(),
                        message: e.to_string(),
                    })?;
                ids.into_iter().collect()
            }
        } else {
            HashSet::new()
        };
        debug!(checkpoint = %path.display(), completed = completed.len(), "Loaded checkpoint");
        Ok(Self { path, completed })
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_complete(&self, input: &Path) -> bool {
        self.completed.contains(&file_id(input))
    }

    /// Record `input` as complete. The record is on disk when this returns.
    pub fn mark_complete(&mut self, input: &Path) -> Result<(), CheckpointError> {
        if self.completed.insert(file_id(input)) {
            self.persist()?;
        }
        Ok(())
    }

    /// Forget every completion record
    pub fn reset(&mut self) -> Result<(), CheckpointError> {
        self.completed.clear();
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| CheckpointError::Write {
                path: self.path.clone(),
                message: e.to_string(),
            })?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }

    /// Completed identifiers, sorted
    pub fn completed(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.completed.iter().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    fn persist(&self) -> Result<(), CheckpointError> {
        let write_err = |message: String| CheckpointError::Write {
            path: self.path.clone(),
            message,
        };

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(|e| write_err(e.to_string()))?;

        let temp = NamedTempFile::new_in(dir).map_err(|e| write_err(e.to_string()))?;
        let mut writer = BufWriter::new(temp);
        serde_json::to_writer_pretty(&mut writer, &self.completed())
            .map_err(|e| write_err(e.to_string()))?;
        writer.write_all(b"\n").map_err(|e| write_err(e.to_string()))?;
        let temp = writer
            .into_inner()
            .map_err(|e| write_err(e.error().to_string()))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| write_err(e.to_string()))?;
        temp.persist(&self.path)
            .map_err(|e| write_err(e.error.to_string()))?;
        Ok(())
    }
}

/// Canonical absolute path used as the identity of an input file
pub fn file_id(path: &Path) -> String {
    let resolved = fs::canonicalize(path).unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        }
    });
    resolved.to_string_lossy().into_owned()
}
